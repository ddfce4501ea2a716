use std::collections::HashMap;
use std::sync::mpsc;

use serde_json::Value;
use sieve_core::{Effect, Msg, SourceId};
use sieve_engine::{EngineEvent, EngineHandle, KeyValueStore, RequestId};
use sieve_logging::{sieve_debug, sieve_info, sieve_warn};

use super::app::AppEvent;
use super::persistence::save_pipeline;

/// Receives each freshly computed pipeline result.
pub(crate) trait ResultViewer {
    fn set(&mut self, value: &Value);
}

/// Prints results as pretty JSON on stdout.
pub(crate) struct StdoutViewer;

impl ResultViewer for StdoutViewer {
    fn set(&mut self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(err) => sieve_warn!("Failed to render result: {}", err),
        }
    }
}

pub(crate) struct EffectRunner {
    engine: EngineHandle,
    store: Box<dyn KeyValueStore>,
    viewer: Box<dyn ResultViewer>,
    events: mpsc::Sender<AppEvent>,
    next_request: RequestId,
    in_flight: HashMap<RequestId, SourceId>,
    latest: HashMap<SourceId, RequestId>,
}

impl EffectRunner {
    pub(crate) fn new(
        engine: EngineHandle,
        store: Box<dyn KeyValueStore>,
        viewer: Box<dyn ResultViewer>,
        events: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            engine,
            store,
            viewer,
            events,
            next_request: 0,
            in_flight: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    pub(crate) fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchSource { source_id, url } => {
                    self.next_request += 1;
                    let request_id = self.next_request;
                    sieve_info!("FetchSource source={} request={} url={}", source_id, request_id, url);
                    self.in_flight.insert(request_id, source_id);
                    self.latest.insert(source_id, request_id);
                    self.engine.enqueue(request_id, url);
                }
                Effect::ScheduleCompile {
                    filter_id,
                    revision,
                    delay,
                } => {
                    let events = self.events.clone();
                    self.engine.schedule(delay, move || {
                        let _ = events.send(AppEvent::Msg(Msg::CompileDebounceElapsed {
                            filter_id,
                            revision,
                        }));
                    });
                }
                Effect::ShowResult(value) => self.viewer.set(&value),
                Effect::Persist(record) => save_pipeline(self.store.as_mut(), &record),
            }
        }
    }

    /// Drains finished fetches. A response for a request that was since
    /// superseded by a newer fetch of the same source is dropped.
    pub(crate) fn poll_engine(&mut self) -> Vec<Msg> {
        let mut msgs = Vec::new();
        while let Some(event) = self.engine.try_recv() {
            let EngineEvent::SourceFetched { request_id, result } = event;
            let Some(source_id) = self.in_flight.remove(&request_id) else {
                continue;
            };
            if self.latest.get(&source_id) != Some(&request_id) {
                sieve_debug!("dropping superseded response {} for source {}", request_id, source_id);
                continue;
            }
            self.latest.remove(&source_id);
            msgs.push(match result {
                Ok(data) => Msg::ContentLoaded { source_id, data },
                Err(err) => Msg::SourceFetchFailed {
                    source_id,
                    message: err.to_string(),
                },
            });
        }
        msgs
    }
}
