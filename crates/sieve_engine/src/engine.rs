use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use sieve_logging::sieve_trace;

use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::{EngineEvent, RequestId};

type TimerCallback = Box<dyn FnOnce() + Send>;

enum EngineCommand {
    Fetch { request_id: RequestId, url: String },
    Timer { delay: Duration, fire: TimerCallback },
}

/// Runs fetches on a background tokio runtime. Completions arrive on the
/// event channel in the order they resolve, not the order requested.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: FetchSettings) -> io::Result<Self> {
        Self::with_fetcher(Arc::new(ReqwestFetcher::new(settings)))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("sieve-fetch")
            .build()?;

        thread::Builder::new()
            .name("sieve-engine".to_string())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    let fetcher = fetcher.clone();
                    let event_tx = event_tx.clone();
                    runtime.spawn(async move {
                        handle_command(fetcher.as_ref(), command, event_tx).await;
                    });
                }
            })?;

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn enqueue(&self, request_id: RequestId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Fetch {
            request_id,
            url: url.into(),
        });
    }

    /// Runs `fire` on the runtime once `delay` has passed. Timers share the
    /// fetch runtime instead of holding a thread each.
    pub fn schedule(&self, delay: Duration, fire: impl FnOnce() + Send + 'static) {
        let _ = self.cmd_tx.send(EngineCommand::Timer {
            delay,
            fire: Box::new(fire),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }
}

async fn handle_command(
    fetcher: &dyn Fetcher,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Fetch { request_id, url } => {
            sieve_trace!("request {request_id}: fetching {url}");
            let result = fetcher.fetch(request_id, &url).await;
            let _ = event_tx.send(EngineEvent::SourceFetched { request_id, result });
        }
        EngineCommand::Timer { delay, fire } => {
            tokio::time::sleep(delay).await;
            fire();
        }
    }
}
