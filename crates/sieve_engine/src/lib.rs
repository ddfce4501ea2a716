//! Sieve engine: source loading and persistence.
mod engine;
mod fetch;
mod persist;
mod types;

pub use engine::EngineHandle;
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use persist::{ensure_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, PersistError};
pub use types::{EngineEvent, FailureKind, FetchError, RequestId};
