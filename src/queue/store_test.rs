use super::*;

// =============================================================================
// MemoryStore
// =============================================================================

#[test]
fn memory_store_missing_key_is_none() {
    let store = MemoryStore::new();
    assert_eq!(store.get_item("nope").unwrap(), None);
}

#[test]
fn memory_store_set_get_remove() {
    let store = MemoryStore::new();
    store.set_item("k", "v1").unwrap();
    store.set_item("k", "v2").unwrap();
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v2"));

    store.remove_item("k").unwrap();
    assert_eq!(store.get_item("k").unwrap(), None);
    // Removing twice is fine.
    store.remove_item("k").unwrap();
}

#[test]
fn memory_store_quota_rejects_oversized_write() {
    let store = MemoryStore::with_quota(10);
    store.set_item("k", "12345").unwrap();

    let err = store.set_item("k", "0123456789").unwrap_err();
    assert!(matches!(err, StoreError::QuotaExceeded { needed: 11, limit: 10, .. }));
    // Previous value survives the rejected write.
    assert_eq!(store.get_item("k").unwrap().as_deref(), Some("12345"));
}

#[test]
fn memory_store_quota_counts_other_keys() {
    let store = MemoryStore::with_quota(8);
    store.set_item("a", "123").unwrap();
    assert!(store.set_item("b", "1234").is_err());
    assert!(store.set_item("b", "12").is_ok());
}

// =============================================================================
// FileStore
// =============================================================================

#[test]
fn file_name_escapes_unsafe_bytes() {
    assert_eq!(file_name_for_key("lytspot:message-queue"), "lytspot%3Amessage-queue.json");
    assert_eq!(file_name_for_key("../etc"), "%2E%2E%2Fetc.json");
    assert_ne!(file_name_for_key("a:b"), file_name_for_key("a_b"));
}

#[test]
fn file_store_missing_key_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(store.get_item("missing").unwrap(), None);
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileStore::open(dir.path()).unwrap();
        store.set_item("lytspot:message-queue", "[1,2,3]").unwrap();
    }

    let reopened = FileStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get_item("lytspot:message-queue").unwrap().as_deref(), Some("[1,2,3]"));
}

#[test]
fn file_store_remove_and_remove_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store.set_item("k", "v").unwrap();
    store.remove_item("k").unwrap();
    assert_eq!(store.get_item("k").unwrap(), None);
    store.remove_item("k").unwrap();
}

#[test]
fn file_store_creates_nested_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("a").join("b");
    let store = FileStore::open(&root).unwrap();
    assert!(store.root().is_dir());
}

#[test]
fn file_store_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store.set_item("k", "v").unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["k.json".to_string()]);
}
