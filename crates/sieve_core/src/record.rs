//! The persisted shape of a pipeline.
//!
//! ```json
//! {
//!   "sources": [{ "id": "1", "url": "https://example.com/a.json" }],
//!   "filters": [[{ "id": "2", "kind": "map", "transformBody": "return e.x;" }]],
//!   "active": 0
//! }
//! ```
//!
//! Compiled programs and editor state never appear here; step bodies are
//! stored as text and compiled again on restore.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sieve_logging::sieve_warn;

use crate::script::{encode, ScriptEngine};
use crate::state::{EditorState, Filter, FilterGroup, PipelineState, Source};
use crate::{FilterId, PipelineError, SourceId, StepKind};

/// Storage key the record lives under.
pub const STATE_KEY: &str = "pipeline_state";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub sources: Vec<PersistedSource>,
    #[serde(default)]
    pub filters: Vec<Vec<PersistedFilter>>,
    #[serde(default)]
    pub active: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSource {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFilter {
    pub id: String,
    pub kind: String,
    pub transform_body: String,
}

impl PersistedState {
    pub fn capture(pipeline: &PipelineState) -> Self {
        Self {
            sources: pipeline
                .sources()
                .iter()
                .map(|source| PersistedSource {
                    id: source.id.to_string(),
                    url: source.url.clone(),
                })
                .collect(),
            filters: pipeline
                .groups()
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|filter| PersistedFilter {
                            id: filter.id.to_string(),
                            kind: filter.kind.as_str().to_string(),
                            transform_body: encode(&filter.transform),
                        })
                        .collect()
                })
                .collect(),
            active: pipeline.active_group_index(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Rebuilds a pipeline, compiling every step body. A body that does
    /// not compile keeps its text, is skipped at run time, and is reported
    /// in the returned errors. Steps of an unknown kind are dropped.
    pub fn restore(self, scripts: &ScriptEngine) -> (PipelineState, Vec<PipelineError>) {
        let mut ids = IdRestorer::new(self.highest_id());
        let mut errors = Vec::new();

        let sources = self
            .sources
            .into_iter()
            .map(|stored| Source {
                id: SourceId::new(ids.restore(&stored.id)),
                url: stored.url,
            })
            .collect();

        let mut groups = Vec::with_capacity(self.filters.len());
        for stored_group in self.filters {
            let mut group = FilterGroup::with_capacity(stored_group.len());
            for stored in stored_group {
                let kind = match stored.kind.parse::<StepKind>() {
                    Ok(kind) => kind,
                    Err(err) => {
                        sieve_warn!("dropping persisted step {}: {err}", stored.id);
                        continue;
                    }
                };
                let filter_id = FilterId::new(ids.restore(&stored.id));
                let (transform, error) = scripts.decode_isolated(&stored.transform_body);
                if let Some(error) = error {
                    errors.push(PipelineError::Compile { filter_id, error });
                }
                group.push(Filter {
                    id: filter_id,
                    kind,
                    transform,
                    editor: EditorState::default(),
                });
            }
            groups.push(group);
        }

        let active = if self.active < groups.len() {
            self.active
        } else {
            0
        };
        let pipeline = PipelineState::from_parts(sources, groups, active, ids.last);
        (pipeline, errors)
    }

    fn highest_id(&self) -> u64 {
        let source_ids = self.sources.iter().map(|source| source.id.as_str());
        let filter_ids = self.filters.iter().flatten().map(|filter| filter.id.as_str());
        source_ids
            .chain(filter_ids)
            .filter_map(parse_id)
            .max()
            .unwrap_or(0)
    }
}

/// Stored ids at or above this are renumbered, leaving the allocator room
/// to keep counting.
const ID_CEILING: u64 = 1 << 53;

fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok().filter(|id| *id < ID_CEILING)
}

/// Parses stored ids, handing out fresh ones above the highest stored id
/// for anything that does not parse, is out of range, or was already taken.
struct IdRestorer {
    last: u64,
    seen: HashSet<u64>,
}

impl IdRestorer {
    fn new(highest: u64) -> Self {
        Self {
            last: highest,
            seen: HashSet::new(),
        }
    }

    fn restore(&mut self, raw: &str) -> u64 {
        let id = match parse_id(raw) {
            Some(id) if !self.seen.contains(&id) => id,
            _ => {
                self.last += 1;
                sieve_warn!("renumbering persisted id {raw:?} as {}", self.last);
                self.last
            }
        };
        self.seen.insert(id);
        id
    }
}
