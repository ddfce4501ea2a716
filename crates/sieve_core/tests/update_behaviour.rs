use std::sync::Once;

use pretty_assertions::assert_eq;
use serde_json::json;
use sieve_core::{
    update, AppState, Effect, FilterId, Msg, PipelineError, SourceId, StepKind, COMPILE_DEBOUNCE,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(sieve_logging::initialize_for_tests);
}

fn submit_source(state: AppState, url: &str) -> (AppState, SourceId) {
    let (state, effects) = update(state, Msg::SourceSubmitted(url.to_string()));
    let source_id = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::FetchSource { source_id, .. } => Some(*source_id),
            _ => None,
        })
        .expect("fetch effect");
    (state, source_id)
}

fn load(state: AppState, source_id: SourceId, data: serde_json::Value) -> AppState {
    update(state, Msg::ContentLoaded { source_id, data }).0
}

fn add_step(state: AppState) -> (AppState, FilterId) {
    let (state, _) = update(state, Msg::FilterAdded);
    let filter_id = state.view().steps.last().expect("step added").filter_id;
    (state, filter_id)
}

/// Edits a step's text and lets its debounce timer fire.
fn edit_and_settle(state: AppState, filter_id: FilterId, text: &str) -> (AppState, Vec<Effect>) {
    let (state, effects) = update(
        state,
        Msg::FilterSourceEdited {
            filter_id,
            text: text.to_string(),
        },
    );
    let revision = match effects.as_slice() {
        [Effect::ScheduleCompile { revision, .. }] => *revision,
        other => panic!("expected a scheduled compile, got {other:?}"),
    };
    update(
        state,
        Msg::CompileDebounceElapsed {
            filter_id,
            revision,
        },
    )
}

fn with_map_step(body: &str) -> (AppState, FilterId) {
    let (state, source_id) = submit_source(AppState::new(), "https://example.com/a.json");
    let state = load(state, source_id, json!(1));
    let (state, filter_id) = add_step(state);
    let (state, _) = update(
        state,
        Msg::FilterKindChanged {
            filter_id,
            kind: StepKind::Map,
        },
    );
    let (state, _) = edit_and_settle(state, filter_id, body);
    (state, filter_id)
}

#[test]
fn source_submission_fetches_recomputes_and_persists() {
    init_logging();
    let (state, effects) = update(
        AppState::new(),
        Msg::SourceSubmitted("  https://example.com/a.json \n".to_string()),
    );

    assert_eq!(effects.len(), 3);
    assert_eq!(
        effects[0],
        Effect::FetchSource {
            source_id: SourceId::new(1),
            url: "https://example.com/a.json".to_string(),
        }
    );
    assert_eq!(effects[1], Effect::ShowResult(json!([])));
    assert!(matches!(&effects[2], Effect::Persist(record) if record.sources.len() == 1));

    let view = state.view();
    assert_eq!(view.sources.len(), 1);
    assert!(!view.sources[0].loaded);
    assert!(view.dirty);
}

#[test]
fn blank_source_is_ignored() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::SourceSubmitted("   ".to_string()));
    assert!(effects.is_empty());
    assert!(state.view().sources.is_empty());
}

#[test]
fn every_loaded_source_feeds_the_pipeline() {
    init_logging();
    let (state, a) = submit_source(AppState::new(), "https://a.example.com");
    let (state, b) = submit_source(state, "https://b.example.com");
    let (state, c) = submit_source(state, "https://c.example.com");

    // Loads resolve out of order; content follows resolution order.
    let state = load(state, c, json!({"x": 3}));
    let state = load(state, a, json!({"x": 1}));
    let (state, effects) = update(
        state,
        Msg::ContentLoaded {
            source_id: b,
            data: json!({"x": 2}),
        },
    );
    assert_eq!(
        effects[0],
        Effect::ShowResult(json!([{"x": 3}, {"x": 1}, {"x": 2}]))
    );

    let (state, filter_id) = add_step(state);
    let (state, _) = update(
        state,
        Msg::FilterKindChanged {
            filter_id,
            kind: StepKind::Filter,
        },
    );
    let (state, effects) = edit_and_settle(state, filter_id, "return e.x > 1;");
    assert_eq!(effects[0], Effect::ShowResult(json!([{"x": 3}, {"x": 2}])));
    assert_eq!(state.displayed(), Some(&json!([{"x": 3}, {"x": 2}])));
}

#[test]
fn late_content_for_removed_source_is_discarded() {
    init_logging();
    let (state, source_id) = submit_source(AppState::new(), "https://example.com");
    let (state, _) = update(state, Msg::SourceRemoved(source_id));
    let (state, effects) = update(
        state,
        Msg::ContentLoaded {
            source_id,
            data: json!({"late": true}),
        },
    );

    assert!(effects.is_empty());
    assert!(state.pipeline().content().is_empty());
    assert_eq!(state.displayed(), Some(&json!([])));
}

#[test]
fn fetch_failure_is_reported_and_source_kept() {
    init_logging();
    let (state, source_id) = submit_source(AppState::new(), "https://example.com");
    let (state, effects) = update(
        state,
        Msg::SourceFetchFailed {
            source_id,
            message: "http status 404".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.pipeline().sources().len(), 1);
    assert!(matches!(
        state.notices(),
        [PipelineError::Fetch { source_id: id, .. }] if *id == source_id
    ));
}

#[test]
fn editing_source_url_drops_stale_content_and_refetches() {
    init_logging();
    let (state, source_id) = submit_source(AppState::new(), "https://old.example.com");
    let state = load(state, source_id, json!([1]));
    let (state, effects) = update(
        state,
        Msg::SourceUrlEdited {
            source_id,
            url: "https://new.example.com".to_string(),
        },
    );

    assert_eq!(
        effects[0],
        Effect::FetchSource {
            source_id,
            url: "https://new.example.com".to_string(),
        }
    );
    assert!(state.pipeline().content().is_empty());
    assert_eq!(state.view().sources[0].url, "https://new.example.com");
}

#[test]
fn new_step_defaults_to_select_of_first_argument() {
    init_logging();
    let (state, _) = add_step(AppState::new());
    let view = state.view();
    assert_eq!(view.group_count, 1);
    assert_eq!(view.steps.len(), 1);
    assert_eq!(view.steps[0].kind, StepKind::Select);
    assert_eq!(view.steps[0].body, "return element;");
}

#[test]
fn group_added_becomes_active_and_starts_empty() {
    init_logging();
    let (state, _) = add_step(AppState::new());
    let (state, effects) = update(state, Msg::GroupAdded);

    let view = state.view();
    assert_eq!(view.group_count, 2);
    assert_eq!(view.active_group, 1);
    assert!(view.steps.is_empty());
    assert!(matches!(effects.last(), Some(Effect::Persist(record)) if record.active == 1));
}

#[test]
fn selecting_missing_group_records_index_error() {
    init_logging();
    let (state, source_id) = submit_source(AppState::new(), "https://example.com");
    let state = load(state, source_id, json!({"a": 1}));
    let (state, _) = update(state, Msg::GroupAdded);
    let before = state.displayed().cloned();

    let (state, effects) = update(state, Msg::GroupSelected(5));

    assert!(effects.is_empty());
    assert_eq!(state.pipeline().active_group_index(), 0);
    assert_eq!(state.displayed().cloned(), before);
    assert_eq!(
        state.notices(),
        &[PipelineError::Index { index: 5, len: 1 }]
    );
}

#[test]
fn switching_groups_keeps_their_steps() {
    init_logging();
    let (state, first) = add_step(AppState::new());
    let (state, _) = update(state, Msg::GroupAdded);
    let (state, second) = add_step(state);

    let (state, _) = update(state, Msg::GroupSelected(0));
    assert_eq!(state.view().steps[0].filter_id, first);
    let (state, _) = update(state, Msg::GroupSelected(1));
    assert_eq!(state.view().steps[0].filter_id, second);
}

#[test]
fn removing_groups_shifts_active_index() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::GroupAdded);
    let (state, _) = update(state, Msg::GroupAdded);
    let (state, _) = update(state, Msg::GroupAdded);
    assert_eq!(state.pipeline().active_group_index(), 2);

    let (state, _) = update(state, Msg::GroupRemoved(0));
    assert_eq!(state.pipeline().groups().len(), 2);
    assert_eq!(state.pipeline().active_group_index(), 1);

    let (state, _) = update(state, Msg::GroupRemoved(1));
    assert_eq!(state.pipeline().active_group_index(), 0);

    let (state, effects) = update(state, Msg::GroupRemoved(3));
    assert!(effects.is_empty());
    assert_eq!(state.notices(), &[PipelineError::Index { index: 3, len: 1 }]);

    let (state, _) = update(state, Msg::GroupRemoved(0));
    assert!(state.pipeline().groups().is_empty());
    assert_eq!(state.pipeline().active_group_index(), 0);
}

#[test]
fn step_mutations_only_touch_active_group() {
    init_logging();
    let (state, first) = add_step(AppState::new());
    let (state, _) = update(state, Msg::GroupAdded);

    let (state, effects) = update(state, Msg::FilterRemoved(first));
    assert!(effects.is_empty());
    let (state, effects) = update(
        state,
        Msg::FilterKindChanged {
            filter_id: first,
            kind: StepKind::Map,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.pipeline().groups()[0][0].kind, StepKind::Select);
}

#[test]
fn steps_can_be_reordered() {
    init_logging();
    let (state, a) = add_step(AppState::new());
    let (state, b) = add_step(state);
    let (state, c) = add_step(state);

    let (state, effects) = update(
        state,
        Msg::FilterMoved {
            filter_id: c,
            position: 0,
        },
    );
    assert!(!effects.is_empty());
    let order: Vec<_> = state.view().steps.iter().map(|s| s.filter_id).collect();
    assert_eq!(order, vec![c, a, b]);

    let (state, _) = update(
        state,
        Msg::FilterMoved {
            filter_id: c,
            position: 99,
        },
    );
    let order: Vec<_> = state.view().steps.iter().map(|s| s.filter_id).collect();
    assert_eq!(order, vec![a, b, c]);
}

#[test]
fn kind_change_recomputes_immediately() {
    init_logging();
    let (state, source_id) = submit_source(AppState::new(), "https://example.com");
    let state = load(state, source_id, json!(7));
    let (state, filter_id) = add_step(state);

    let (_state, effects) = update(
        state,
        Msg::FilterKindChanged {
            filter_id,
            kind: StepKind::Map,
        },
    );
    assert_eq!(effects[0], Effect::ShowResult(json!([7])));
    assert!(matches!(effects[1], Effect::Persist(_)));
}

#[test]
fn source_edits_are_debounced_and_stale_timers_ignored() {
    init_logging();
    let (state, filter_id) = add_step(AppState::new());

    let (state, effects) = update(
        state,
        Msg::FilterSourceEdited {
            filter_id,
            text: "return 1".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::ScheduleCompile {
            filter_id,
            revision: 1,
            delay: COMPILE_DEBOUNCE,
        }]
    );
    let (state, _) = update(
        state,
        Msg::FilterSourceEdited {
            filter_id,
            text: "return 12;".to_string(),
        },
    );

    let (state, effects) = update(
        state,
        Msg::CompileDebounceElapsed {
            filter_id,
            revision: 1,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().steps[0].body, "return element;");
    assert_eq!(state.view().steps[0].draft.as_deref(), Some("return 12;"));

    let (state, effects) = update(
        state,
        Msg::CompileDebounceElapsed {
            filter_id,
            revision: 2,
        },
    );
    assert!(matches!(effects.last(), Some(Effect::Persist(_))));
    assert_eq!(state.view().steps[0].body, "return 12;");
    assert_eq!(state.view().steps[0].draft, None);
}

#[test]
fn compile_error_keeps_last_good_transform() {
    init_logging();
    let (state, filter_id) = with_map_step("return e * 2;");
    assert_eq!(state.displayed(), Some(&json!([2])));

    let (state, effects) = edit_and_settle(state, filter_id, "return e * ;");

    assert!(effects.is_empty());
    assert!(matches!(
        state.notices(),
        [PipelineError::Compile { filter_id: id, .. }] if *id == filter_id
    ));
    let step = &state.view().steps[0];
    assert_eq!(step.body, "return e * 2;");
    assert_eq!(step.draft.as_deref(), Some("return e * ;"));
    assert_eq!(step.compile_error, None);

    let (state, _) = edit_and_settle(state, filter_id, "return e * 3;");
    assert_eq!(state.displayed(), Some(&json!([3])));
}

#[test]
fn throwing_step_keeps_previous_result() {
    init_logging();
    let (state, filter_id) = with_map_step("return e;");
    assert_eq!(state.displayed(), Some(&json!([1])));

    let (state, effects) = edit_and_settle(state, filter_id, "throw \"x\";");

    assert_eq!(state.displayed(), Some(&json!([1])));
    assert!(!effects.iter().any(|e| matches!(e, Effect::ShowResult(_))));
    assert!(effects.iter().any(|e| matches!(e, Effect::Persist(_))));
    let runtime_errors = state
        .notices()
        .iter()
        .filter(|notice| matches!(notice, PipelineError::StepRuntime(_)))
        .count();
    assert_eq!(runtime_errors, 1);
}

#[test]
fn halted_select_keeps_previous_result() {
    init_logging();
    let (state, source_id) = submit_source(AppState::new(), "https://example.com");
    let state = load(state, source_id, json!({"a": 1}));
    let (state, filter_id) = add_step(state);
    let (state, _) = edit_and_settle(state, filter_id, "return 0;");
    assert_eq!(state.displayed(), Some(&json!({"a": 1})));

    let (state, second) = add_step(state);
    let (state, effects) = edit_and_settle(state, second, "return \"a\";");
    assert_eq!(effects[0], Effect::ShowResult(json!(1)));

    let (state, third) = add_step(state);
    let (state, effects) = edit_and_settle(state, third, "return \"b\";");
    assert!(!effects.iter().any(|e| matches!(e, Effect::ShowResult(_))));
    assert_eq!(state.displayed(), Some(&json!(1)));
    assert!(state.notices().is_empty());
}

#[test]
fn dismissing_clears_notices() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::GroupSelected(1));
    assert_eq!(state.view().notices.len(), 1);
    let (mut state, _) = update(state, Msg::NoticesDismissed);
    assert!(state.view().notices.is_empty());
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}
