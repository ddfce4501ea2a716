use std::fs;

use pretty_assertions::assert_eq;
use sieve_engine::{ensure_dir, AtomicFileWriter, FileStore, KeyValueStore, MemoryStore, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("pipeline_state.json", "{}").unwrap();
    assert_eq!(first.file_name().unwrap(), "pipeline_state.json");
    assert_eq!(fs::read_to_string(&first).unwrap(), "{}");

    let second = writer.write("pipeline_state.json", "{\"active\":1}").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "{\"active\":1}");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("pipeline_state.json", "{}");
    assert!(matches!(result, Err(PersistError::StateDir(_))));
    assert!(!file_path.with_file_name("pipeline_state.json").exists());
}

#[test]
fn file_store_reads_back_what_it_wrote() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::new(temp.path().join("nested"));

    assert_eq!(store.get("pipeline_state").unwrap(), None);
    store.set("pipeline_state", "{\"active\":0}").unwrap();
    assert_eq!(
        store.get("pipeline_state").unwrap().as_deref(),
        Some("{\"active\":0}")
    );
    assert!(temp.path().join("nested/pipeline_state.json").is_file());
}

#[test]
fn file_store_rejects_path_like_keys() {
    let temp = TempDir::new().unwrap();
    let mut store = FileStore::new(temp.path());
    assert!(matches!(
        store.set("../escape", "{}"),
        Err(PersistError::InvalidKey(_))
    ));
    assert!(matches!(store.get(""), Err(PersistError::InvalidKey(_))));
}

#[test]
fn memory_store_overwrites() {
    let mut store = MemoryStore::new();
    store.set("k", "1").unwrap();
    store.set("k", "2").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
    assert_eq!(store.get("other").unwrap(), None);
}
