//! Runtime configuration read from the environment.

use std::path::PathBuf;

use sieve_engine::FetchSettings;

use crate::platform::logging::LogDestination;

const STATE_DIR_VAR: &str = "SIEVE_STATE_DIR";
const LOG_VAR: &str = "SIEVE_LOG";
const DEFAULT_STATE_DIR: &str = "./.sieve";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the persisted pipeline record.
    pub state_dir: PathBuf,
    pub log_destination: LogDestination,
    pub fetch: FetchSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unset or blank variables fall back to defaults; an unrecognised
    /// log destination is reported on stderr and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        let state_dir = value(STATE_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
        let log_destination = match value(LOG_VAR).map(|raw| raw.parse::<LogDestination>()) {
            Some(Ok(destination)) => destination,
            Some(Err(err)) => {
                // The logger is not up yet.
                eprintln!("Warning: {err}; logging to file");
                LogDestination::File
            }
            None => LogDestination::File,
        };

        Self {
            state_dir,
            log_destination,
            fetch: FetchSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.state_dir, PathBuf::from("./.sieve"));
        assert_eq!(config.log_destination, LogDestination::File);
        assert_eq!(config.fetch.redirect_limit, 5);
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[("SIEVE_STATE_DIR", "/tmp/s"), ("SIEVE_LOG", "Both")]);
        assert_eq!(config.state_dir, PathBuf::from("/tmp/s"));
        assert_eq!(config.log_destination, LogDestination::Both);
    }

    #[test]
    fn unknown_destination_falls_back_to_file() {
        let config = config_from(&[("SIEVE_LOG", "syslog"), ("SIEVE_STATE_DIR", " ")]);
        assert_eq!(config.log_destination, LogDestination::File);
        assert_eq!(config.state_dir, PathBuf::from("./.sieve"));
    }
}
