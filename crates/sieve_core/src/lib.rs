//! Sieve core: pure pipeline state machine, step scripts and the executor.
mod effect;
mod error;
mod executor;
mod msg;
mod record;
mod script;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, COMPILE_DEBOUNCE};
pub use error::{CompileError, PipelineError, StepRuntimeError};
pub use executor::{run, RunOutcome};
pub use msg::Msg;
pub use record::{PersistedFilter, PersistedSource, PersistedState, STATE_KEY};
pub use script::{encode, ScriptEngine, Transform, DEFAULT_BODY};
pub use state::{
    AppState, ContentItem, EditorState, Filter, FilterGroup, FilterId, PipelineState, Source,
    SourceId, StepKind, UnknownStepKind,
};
pub use update::update;
pub use view_model::{AppViewModel, SourceRowView, StepRowView};
