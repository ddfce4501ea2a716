use sieve_core::{PersistedState, STATE_KEY};
use sieve_engine::KeyValueStore;
use sieve_logging::{sieve_error, sieve_info, sieve_warn};

/// Reads the saved pipeline. Missing, unreadable and corrupt records all
/// start an empty pipeline.
pub(crate) fn load_pipeline(store: &dyn KeyValueStore) -> Option<PersistedState> {
    let text = match store.get(STATE_KEY) {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(err) => {
            sieve_warn!("Failed to read persisted pipeline: {}", err);
            return None;
        }
    };

    match PersistedState::from_json(&text) {
        Ok(record) => {
            sieve_info!(
                "Loaded persisted pipeline: {} sources, {} groups",
                record.sources.len(),
                record.filters.len()
            );
            Some(record)
        }
        Err(err) => {
            sieve_warn!("Failed to parse persisted pipeline: {}", err);
            None
        }
    }
}

pub(crate) fn save_pipeline(store: &mut dyn KeyValueStore, record: &PersistedState) {
    let content = match record.to_json() {
        Ok(text) => text,
        Err(err) => {
            sieve_error!("Failed to serialize pipeline: {}", err);
            return;
        }
    };
    if let Err(err) = store.set(STATE_KEY, &content) {
        sieve_error!("Failed to write persisted pipeline: {}", err);
    }
}
