use serde_json::Value;

use crate::{FilterId, PersistedState, SourceId, StepKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User submitted a new source url.
    SourceSubmitted(String),
    /// User changed the url of an existing source.
    SourceUrlEdited { source_id: SourceId, url: String },
    /// User removed a source.
    SourceRemoved(SourceId),
    /// Source loader resolved a document.
    ContentLoaded { source_id: SourceId, data: Value },
    /// Source loader failed.
    SourceFetchFailed { source_id: SourceId, message: String },
    GroupAdded,
    GroupRemoved(usize),
    GroupSelected(usize),
    /// Append a default step to the active group.
    FilterAdded,
    FilterRemoved(FilterId),
    FilterKindChanged { filter_id: FilterId, kind: StepKind },
    FilterMoved { filter_id: FilterId, position: usize },
    /// Script editor reported new source text for a step (not yet debounced).
    FilterSourceEdited { filter_id: FilterId, text: String },
    /// Debounce timer for an edit fired.
    CompileDebounceElapsed { filter_id: FilterId, revision: u64 },
    /// Persisted record read at startup.
    StateRestored(PersistedState),
    /// User acknowledged the shown notices.
    NoticesDismissed,
}
