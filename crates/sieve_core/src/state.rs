use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use sieve_logging::{sieve_debug, sieve_warn};

use crate::executor::{run, RunOutcome};
use crate::record::PersistedState;
use crate::script::{ScriptEngine, Transform, DEFAULT_BODY};
use crate::view_model::{AppViewModel, SourceRowView, StepRowView};
use crate::{Effect, PipelineError};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifies a source and the content loaded for it.
    SourceId
);
opaque_id!(
    /// Identifies a step across all groups.
    FilterId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Filter,
    Map,
    FlatMap,
    Select,
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Filter,
        StepKind::Map,
        StepKind::FlatMap,
        StepKind::Select,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Filter => "filter",
            StepKind::Map => "map",
            StepKind::FlatMap => "flatmap",
            StepKind::Select => "select",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step kind `{0}`")]
pub struct UnknownStepKind(pub String);

impl FromStr for StepKind {
    type Err = UnknownStepKind;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| UnknownStepKind(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: SourceId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: SourceId,
    pub data: Value,
}

/// Script-editor state for one step. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditorState {
    /// Edited text that has not compiled yet.
    pub draft: Option<String>,
    /// Bumped on every edit; only the latest revision may compile.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub id: FilterId,
    pub kind: StepKind,
    pub transform: Transform,
    pub editor: EditorState,
}

pub type FilterGroup = Vec<Filter>;

/// Sources, loaded content and filter groups. Every operation leaves the
/// structure consistent before returning.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineState {
    sources: Vec<Source>,
    content: Vec<ContentItem>,
    groups: Vec<FilterGroup>,
    active: usize,
    last_id: u64,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        sources: Vec<Source>,
        groups: Vec<FilterGroup>,
        active: usize,
        last_id: u64,
    ) -> Self {
        Self {
            sources,
            content: Vec::new(),
            groups,
            active,
            last_id,
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn content(&self) -> &[ContentItem] {
        &self.content
    }

    pub fn groups(&self) -> &[FilterGroup] {
        &self.groups
    }

    pub fn active_group_index(&self) -> usize {
        self.active
    }

    /// Steps of the active group; empty when there are no groups.
    pub fn active_steps(&self) -> &[Filter] {
        self.groups
            .get(self.active)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The value the active group folds over: every loaded document, in
    /// the order the loads completed.
    pub fn seed(&self) -> Value {
        Value::Array(self.content.iter().map(|item| item.data.clone()).collect())
    }

    pub fn find_filter(&self, id: FilterId) -> Option<&Filter> {
        self.groups.iter().flatten().find(|filter| filter.id == id)
    }

    pub(crate) fn find_filter_mut(&mut self, id: FilterId) -> Option<&mut Filter> {
        self.groups
            .iter_mut()
            .flatten()
            .find(|filter| filter.id == id)
    }

    fn allocate_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    pub fn add_source(&mut self, url: impl Into<String>) -> SourceId {
        let id = SourceId::new(self.allocate_id());
        self.sources.push(Source {
            id,
            url: url.into(),
        });
        id
    }

    /// Replaces a source's url. The content loaded from the old url is
    /// dropped; it comes back once the new url loads.
    pub fn edit_source(&mut self, id: SourceId, url: impl Into<String>) -> bool {
        let Some(source) = self.sources.iter_mut().find(|source| source.id == id) else {
            return false;
        };
        source.url = url.into();
        self.content.retain(|item| item.id != id);
        true
    }

    /// Upserts the content for a source. Returns false, dropping the data,
    /// when the source is gone (removed while its load was in flight).
    pub fn set_content(&mut self, id: SourceId, data: Value) -> bool {
        if !self.sources.iter().any(|source| source.id == id) {
            return false;
        }
        match self.content.iter_mut().find(|item| item.id == id) {
            Some(item) => item.data = data,
            None => self.content.push(ContentItem { id, data }),
        }
        true
    }

    pub fn remove_source(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.id != id);
        self.content.retain(|item| item.id != id);
        self.sources.len() != before
    }

    /// Appends an empty group and makes it active.
    pub fn add_group(&mut self) -> usize {
        self.groups.push(FilterGroup::new());
        self.active = self.groups.len() - 1;
        self.active
    }

    pub fn remove_group(&mut self, index: usize) -> Result<(), PipelineError> {
        self.check_group_index(index)?;
        self.groups.remove(index);
        if index < self.active || self.active >= self.groups.len() {
            self.active = self.active.saturating_sub(1);
        }
        Ok(())
    }

    pub fn set_active_group(&mut self, index: usize) -> Result<(), PipelineError> {
        self.check_group_index(index)?;
        self.active = index;
        Ok(())
    }

    fn check_group_index(&self, index: usize) -> Result<(), PipelineError> {
        if index < self.groups.len() {
            Ok(())
        } else {
            Err(PipelineError::Index {
                index,
                len: self.groups.len(),
            })
        }
    }

    /// Appends a `select` step to the active group, creating the first group
    /// when there is none.
    pub fn add_filter(&mut self, transform: Transform) -> FilterId {
        if self.groups.is_empty() {
            self.add_group();
        }
        let id = FilterId::new(self.allocate_id());
        let active = self.active;
        self.groups[active].push(Filter {
            id,
            kind: StepKind::Select,
            transform,
            editor: EditorState::default(),
        });
        id
    }

    pub fn remove_filter(&mut self, id: FilterId) -> bool {
        let Some(group) = self.groups.get_mut(self.active) else {
            return false;
        };
        let before = group.len();
        group.retain(|filter| filter.id != id);
        group.len() != before
    }

    pub fn set_filter_kind(&mut self, id: FilterId, kind: StepKind) -> bool {
        match self.active_filter_mut(id) {
            Some(filter) => {
                filter.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Moves a step of the active group to `position`, clamped to the group.
    pub fn move_filter(&mut self, id: FilterId, position: usize) -> bool {
        let Some(group) = self.groups.get_mut(self.active) else {
            return false;
        };
        let Some(from) = group.iter().position(|filter| filter.id == id) else {
            return false;
        };
        let filter = group.remove(from);
        let to = position.min(group.len());
        group.insert(to, filter);
        from != to
    }

    fn active_filter_mut(&mut self, id: FilterId) -> Option<&mut Filter> {
        self.groups
            .get_mut(self.active)?
            .iter_mut()
            .find(|filter| filter.id == id)
    }
}

/// Everything the shell needs: the pipeline, the script engine shared with
/// it, the last displayed result and the notices waiting to be shown.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: PipelineState,
    scripts: Arc<ScriptEngine>,
    displayed: Option<Value>,
    notices: Vec<PipelineError>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_scripts(Arc::new(ScriptEngine::new()))
    }

    pub fn with_scripts(scripts: Arc<ScriptEngine>) -> Self {
        Self {
            pipeline: PipelineState::new(),
            scripts,
            displayed: None,
            notices: Vec::new(),
            dirty: false,
        }
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut PipelineState {
        &mut self.pipeline
    }

    pub(crate) fn replace_pipeline(&mut self, pipeline: PipelineState) {
        self.pipeline = pipeline;
        self.dirty = true;
    }

    pub fn scripts(&self) -> &ScriptEngine {
        &self.scripts
    }

    /// The value last handed to the result viewer.
    pub fn displayed(&self) -> Option<&Value> {
        self.displayed.as_ref()
    }

    pub fn notices(&self) -> &[PipelineError] {
        &self.notices
    }

    pub(crate) fn clear_notices(&mut self) {
        if !self.notices.is_empty() {
            self.notices.clear();
            self.dirty = true;
        }
    }

    pub(crate) fn report(&mut self, error: PipelineError) {
        sieve_warn!("{error}");
        self.notices.push(error);
        self.dirty = true;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub(crate) fn default_transform(&self) -> Transform {
        self.scripts.decode_isolated(DEFAULT_BODY).0
    }

    /// Re-runs the active group. A completed run becomes the displayed
    /// result; a halted or failed run leaves the previous one in place.
    pub(crate) fn recompute(&mut self) -> Option<Effect> {
        let seed = self.pipeline.seed();
        match run(&self.scripts, &seed, self.pipeline.active_steps()) {
            Ok(RunOutcome::Completed(value)) => {
                self.displayed = Some(value.clone());
                self.dirty = true;
                Some(Effect::ShowResult(value))
            }
            Ok(RunOutcome::Halted { position }) => {
                sieve_debug!("pipeline halted at select step {position}; keeping last result");
                None
            }
            Err(error) => {
                self.report(error.into());
                None
            }
        }
    }

    /// Recompute followed by persistence, the tail of every mutation.
    pub(crate) fn commit(&mut self) -> Vec<Effect> {
        self.dirty = true;
        let mut effects = Vec::with_capacity(2);
        effects.extend(self.recompute());
        effects.push(Effect::Persist(self.record()));
        effects
    }

    /// The persisted form of the current pipeline.
    pub fn record(&self) -> PersistedState {
        PersistedState::capture(&self.pipeline)
    }

    pub fn view(&self) -> AppViewModel {
        let sources = self
            .pipeline
            .sources()
            .iter()
            .map(|source| SourceRowView {
                source_id: source.id,
                url: source.url.clone(),
                loaded: self
                    .pipeline
                    .content()
                    .iter()
                    .any(|item| item.id == source.id),
            })
            .collect();
        let steps = self
            .pipeline
            .active_steps()
            .iter()
            .map(|filter| StepRowView {
                filter_id: filter.id,
                kind: filter.kind,
                body: crate::encode(&filter.transform),
                draft: filter.editor.draft.clone(),
                compile_error: filter
                    .transform
                    .compile_error()
                    .map(|error| error.message.clone()),
            })
            .collect();

        AppViewModel {
            sources,
            group_count: self.pipeline.groups().len(),
            active_group: self.pipeline.active_group_index(),
            steps,
            result: self.displayed.clone(),
            notices: self.notices.iter().map(ToString::to_string).collect(),
            dirty: self.dirty,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
