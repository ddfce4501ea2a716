use crate::{FilterId, SourceId, StepKind};

/// Step source text that is not a valid script body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step source does not compile: {message}")]
pub struct CompileError {
    pub message: String,
}

/// A compiled step raised an error while the pipeline was running.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} step at position {position} failed: {message}")]
pub struct StepRuntimeError {
    pub position: usize,
    pub kind: StepKind,
    pub message: String,
}

/// User-visible failures. None of them are fatal; each is recorded as a
/// notice on the state and the pipeline stays usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to load source {source_id}: {message}")]
    Fetch { source_id: SourceId, message: String },
    #[error("step {filter_id}: {error}")]
    Compile {
        filter_id: FilterId,
        #[source]
        error: CompileError,
    },
    #[error(transparent)]
    StepRuntime(#[from] StepRuntimeError),
    #[error("group index {index} is out of range ({len} groups)")]
    Index { index: usize, len: usize },
}
