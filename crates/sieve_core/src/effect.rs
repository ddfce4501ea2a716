use std::time::Duration;

use serde_json::Value;

use crate::{FilterId, PersistedState, SourceId};

/// Quiet period between the last edit of a step's source text and its
/// recompilation.
pub const COMPILE_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Load the JSON document behind `url`; answer with `ContentLoaded` or
    /// `SourceFetchFailed`.
    FetchSource { source_id: SourceId, url: String },
    /// Answer with `CompileDebounceElapsed` once `delay` has passed.
    ScheduleCompile {
        filter_id: FilterId,
        revision: u64,
        delay: Duration,
    },
    /// Hand a freshly computed result to the result viewer.
    ShowResult(Value),
    /// Write the record under [`crate::STATE_KEY`].
    Persist(PersistedState),
}
