use serde_json::Value;

use crate::{FilterId, SourceId, StepKind};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub sources: Vec<SourceRowView>,
    pub group_count: usize,
    pub active_group: usize,
    /// Steps of the active group, in execution order.
    pub steps: Vec<StepRowView>,
    pub result: Option<Value>,
    pub notices: Vec<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRowView {
    pub source_id: SourceId,
    pub url: String,
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRowView {
    pub filter_id: FilterId,
    pub kind: StepKind,
    pub body: String,
    pub draft: Option<String>,
    /// Why the installed body does not compile; such a step is skipped.
    pub compile_error: Option<String>,
}
