use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use sieve_core::{update, AppState, AppViewModel, Msg};
use sieve_engine::{ensure_dir, EngineHandle, FileStore};
use sieve_logging::{sieve_info, sieve_warn};

use super::console::{self, Command};
use super::effects::{EffectRunner, StdoutViewer};
use super::{logging, persistence};
use crate::config::AppConfig;

const ENGINE_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub(crate) enum AppEvent {
    Msg(Msg),
    Show,
    Quit,
}

pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    logging::initialize(config.log_destination);
    sieve_info!("starting sieve with state dir {:?}", config.state_dir);

    ensure_dir(&config.state_dir)
        .with_context(|| format!("preparing state directory {:?}", config.state_dir))?;
    let store = FileStore::new(config.state_dir.clone());
    let restored = persistence::load_pipeline(&store);

    let engine = EngineHandle::new(config.fetch).context("starting fetch engine")?;
    let (event_tx, event_rx) = mpsc::channel::<AppEvent>();
    let mut runner = EffectRunner::new(
        engine,
        Box::new(store),
        Box::new(StdoutViewer),
        event_tx.clone(),
    );

    thread::Builder::new()
        .name("sieve-console".to_string())
        .spawn(move || read_console(event_tx))
        .context("starting console reader")?;

    println!("{}", console::HELP);
    let mut shell = Shell::new(AppState::new());
    if let Some(record) = restored {
        shell.dispatch(&mut runner, Msg::StateRestored(record));
    }

    loop {
        match event_rx.recv_timeout(ENGINE_POLL_INTERVAL) {
            Ok(AppEvent::Msg(msg)) => shell.dispatch(&mut runner, msg),
            Ok(AppEvent::Show) => print!("{}", console::render_view(&shell.view())),
            Ok(AppEvent::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        for msg in runner.poll_engine() {
            shell.dispatch(&mut runner, msg);
        }
    }

    sieve_info!("shutting down");
    Ok(())
}

struct Shell {
    /// Only `None` while a message is being applied.
    state: Option<AppState>,
    shown_notices: Vec<String>,
}

impl Shell {
    fn new(state: AppState) -> Self {
        Self {
            state: Some(state),
            shown_notices: Vec::new(),
        }
    }

    fn view(&self) -> AppViewModel {
        self.state.as_ref().map(AppState::view).unwrap_or_default()
    }

    fn dispatch(&mut self, runner: &mut EffectRunner, msg: Msg) {
        let Some(state) = self.state.take() else {
            return;
        };
        let (mut state, effects) = update(state, msg);
        runner.run(effects);

        if state.consume_dirty() {
            let notices = state.view().notices;
            if notices != self.shown_notices {
                print!("{}", console::render_notices(&new_notices(&self.shown_notices, &notices)));
                self.shown_notices = notices;
            }
        }
        self.state = Some(state);
    }
}

/// Notices appended since the last render; all of them when the list was
/// cleared or reordered in between.
fn new_notices(shown: &[String], current: &[String]) -> Vec<String> {
    if current.starts_with(shown) {
        current[shown.len()..].to_vec()
    } else {
        current.to_vec()
    }
}

fn read_console(events: mpsc::Sender<AppEvent>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                sieve_warn!("Failed to read console input: {}", err);
                break;
            }
        };
        let event = match console::parse_command(&line) {
            Ok(Some(Command::Send(msg))) => AppEvent::Msg(msg),
            Ok(Some(Command::Show)) => AppEvent::Show,
            Ok(Some(Command::Help)) => {
                println!("{}", console::HELP);
                continue;
            }
            Ok(Some(Command::Quit)) => AppEvent::Quit,
            Ok(None) => continue,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        let quitting = matches!(event, AppEvent::Quit);
        if events.send(event).is_err() || quitting {
            return;
        }
    }
    let _ = events.send(AppEvent::Quit);
}

#[cfg(test)]
mod tests {
    use super::new_notices;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_appended_notices_are_new() {
        assert_eq!(new_notices(&owned(&["a"]), &owned(&["a", "b"])), owned(&["b"]));
        assert_eq!(new_notices(&owned(&["a", "b"]), &owned(&["c"])), owned(&["c"]));
        assert!(new_notices(&owned(&["a"]), &[]).is_empty());
    }
}
