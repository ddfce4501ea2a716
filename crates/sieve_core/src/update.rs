use sieve_logging::{sieve_debug, sieve_info};

use crate::{AppState, Effect, FilterId, Msg, PipelineError, COMPILE_DEBOUNCE};

/// Pure update function: applies a message to state and returns any effects.
///
/// Every change to pipeline shape or content ends with a recompute followed
/// by a persist. Editing a step's text only schedules a debounced compile.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SourceSubmitted(raw) => {
            let url = raw.trim();
            if url.is_empty() {
                return (state, Vec::new());
            }
            let source_id = state.pipeline_mut().add_source(url);
            sieve_info!("added source {source_id} url={url}");
            let mut effects = vec![Effect::FetchSource {
                source_id,
                url: url.to_string(),
            }];
            effects.extend(state.commit());
            effects
        }
        Msg::SourceUrlEdited { source_id, url } => {
            let url = url.trim();
            if url.is_empty() || !state.pipeline_mut().edit_source(source_id, url) {
                return (state, Vec::new());
            }
            let mut effects = vec![Effect::FetchSource {
                source_id,
                url: url.to_string(),
            }];
            effects.extend(state.commit());
            effects
        }
        Msg::SourceRemoved(source_id) => {
            if state.pipeline_mut().remove_source(source_id) {
                state.commit()
            } else {
                Vec::new()
            }
        }
        Msg::ContentLoaded { source_id, data } => {
            if state.pipeline_mut().set_content(source_id, data) {
                state.commit()
            } else {
                sieve_debug!("discarding content for removed source {source_id}");
                Vec::new()
            }
        }
        Msg::SourceFetchFailed { source_id, message } => {
            if state
                .pipeline()
                .sources()
                .iter()
                .any(|source| source.id == source_id)
            {
                state.report(PipelineError::Fetch { source_id, message });
            } else {
                sieve_debug!("ignoring failed load for removed source {source_id}");
            }
            Vec::new()
        }
        Msg::GroupAdded => {
            state.pipeline_mut().add_group();
            state.commit()
        }
        Msg::GroupRemoved(index) => match state.pipeline_mut().remove_group(index) {
            Ok(()) => state.commit(),
            Err(err) => {
                state.report(err);
                Vec::new()
            }
        },
        Msg::GroupSelected(index) => match state.pipeline_mut().set_active_group(index) {
            Ok(()) => state.commit(),
            Err(err) => {
                state.report(err);
                Vec::new()
            }
        },
        Msg::FilterAdded => {
            let transform = state.default_transform();
            state.pipeline_mut().add_filter(transform);
            state.commit()
        }
        Msg::FilterRemoved(filter_id) => {
            if state.pipeline_mut().remove_filter(filter_id) {
                state.commit()
            } else {
                Vec::new()
            }
        }
        Msg::FilterKindChanged { filter_id, kind } => {
            if state.pipeline_mut().set_filter_kind(filter_id, kind) {
                state.commit()
            } else {
                Vec::new()
            }
        }
        Msg::FilterMoved {
            filter_id,
            position,
        } => {
            if state.pipeline_mut().move_filter(filter_id, position) {
                state.commit()
            } else {
                Vec::new()
            }
        }
        Msg::FilterSourceEdited { filter_id, text } => {
            let Some(filter) = state.pipeline_mut().find_filter_mut(filter_id) else {
                return (state, Vec::new());
            };
            filter.editor.draft = Some(text);
            filter.editor.revision += 1;
            let revision = filter.editor.revision;
            state.mark_dirty();
            vec![Effect::ScheduleCompile {
                filter_id,
                revision,
                delay: COMPILE_DEBOUNCE,
            }]
        }
        Msg::CompileDebounceElapsed {
            filter_id,
            revision,
        } => compile_draft(&mut state, filter_id, revision),
        Msg::StateRestored(record) => {
            let (pipeline, errors) = record.restore(state.scripts());
            sieve_info!(
                "restored {} sources and {} groups",
                pipeline.sources().len(),
                pipeline.groups().len()
            );
            state.replace_pipeline(pipeline);
            for error in errors {
                state.report(error);
            }
            let mut effects: Vec<Effect> = state
                .pipeline()
                .sources()
                .iter()
                .map(|source| Effect::FetchSource {
                    source_id: source.id,
                    url: source.url.clone(),
                })
                .collect();
            effects.extend(state.recompute());
            effects
        }
        Msg::NoticesDismissed => {
            state.clear_notices();
            Vec::new()
        }
    };

    (state, effects)
}

/// Compiles a step's draft if `revision` is still the latest edit. On
/// failure the draft stays and the installed transform keeps running.
fn compile_draft(state: &mut AppState, filter_id: FilterId, revision: u64) -> Vec<Effect> {
    let Some(filter) = state.pipeline().find_filter(filter_id) else {
        return Vec::new();
    };
    if filter.editor.revision != revision {
        sieve_debug!(
            "skipping stale compile of {filter_id} (revision {revision}, latest {})",
            filter.editor.revision
        );
        return Vec::new();
    }
    let Some(draft) = filter.editor.draft.clone() else {
        return Vec::new();
    };

    match state.scripts().decode(&draft) {
        Ok(transform) => {
            if let Some(filter) = state.pipeline_mut().find_filter_mut(filter_id) {
                filter.transform = transform;
                filter.editor.draft = None;
            }
            state.commit()
        }
        Err(error) => {
            state.report(PipelineError::Compile { filter_id, error });
            Vec::new()
        }
    }
}
