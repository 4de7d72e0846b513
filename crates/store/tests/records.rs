use serde_json::json;
use tempfile::TempDir;

use quitpath_core::{RecordKey, SyncStatus};
use quitpath_store::LocalStore;

fn setup_store() -> (TempDir, LocalStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = LocalStore::open(dir.path().join("local.sqlite")).expect("open store");
    store.migrate().expect("migrate");
    (dir, store)
}

#[test]
fn put_is_immediately_readable_and_unsynced() {
    let (_dir, store) = setup_store();
    let key = RecordKey::new("user-1", "2025-06-01");
    let payload = json!({"date": "2025-06-01", "cravings": 3});

    store.put(&key, &payload).expect("put");

    assert_eq!(store.get(&key).expect("get"), Some(payload));
    let record = store
        .get_record(&key)
        .expect("get record")
        .expect("record exists");
    assert_eq!(record.envelope.status, SyncStatus::Unsynced);
    assert!(record.envelope.last_sync_attempt.is_none());
}

#[test]
fn put_overwrites_in_place_and_resets_the_envelope() {
    let (_dir, store) = setup_store();
    let key = RecordKey::new("user-1", "2025-06-01");

    store.put(&key, &json!({"cravings": 1})).expect("first put");
    store
        .mark_status(
            &key,
            &SyncStatus::Failed {
                error: "connection refused".to_string(),
            },
            Some("2025-06-01T10:00:00.000Z"),
        )
        .expect("mark failed");
    store.put(&key, &json!({"cravings": 7})).expect("second put");

    let record = store
        .get_record(&key)
        .expect("get record")
        .expect("record exists");
    assert_eq!(record.payload, json!({"cravings": 7}));
    assert_eq!(record.envelope.status, SyncStatus::Unsynced);
    assert!(record.envelope.last_sync_attempt.is_none());
    assert_eq!(store.get_all("user-1").expect("get all").len(), 1);
}

#[test]
fn pending_lists_everything_but_synced() {
    let (_dir, store) = setup_store();
    let unsynced = RecordKey::new("user-1", "2025-06-01");
    let failed = RecordKey::new("user-1", "2025-06-02");
    let synced = RecordKey::new("user-1", "2025-06-03");

    store.put(&unsynced, &json!({"cravings": 1})).expect("put");
    store.put(&failed, &json!({"cravings": 2})).expect("put");
    store
        .mark_status(
            &failed,
            &SyncStatus::Failed {
                error: "timeout".to_string(),
            },
            Some("2025-06-02T08:00:00.000Z"),
        )
        .expect("mark");
    store
        .put_synced(&synced, &json!({"cravings": 3}), "2025-06-03T09:00:00.000Z")
        .expect("put synced");

    let pending = store.pending("user-1").expect("pending");
    let keys: Vec<&str> = pending
        .iter()
        .map(|record| record.key.natural_key.as_str())
        .collect();
    assert_eq!(keys, vec!["2025-06-01", "2025-06-02"]);
    assert_eq!(
        pending[1].envelope.status,
        SyncStatus::Failed {
            error: "timeout".to_string()
        }
    );
}

#[test]
fn put_synced_stores_the_remote_timestamp() {
    let (_dir, store) = setup_store();
    let key = RecordKey::new("user-1", "2025-06-01");

    store
        .put_synced(&key, &json!({"cravings": 4}), "2025-06-01T12:00:00.000Z")
        .expect("put synced");

    let record = store
        .get_record(&key)
        .expect("get record")
        .expect("record exists");
    assert_eq!(record.envelope.status, SyncStatus::Synced);
    assert_eq!(record.updated_at, "2025-06-01T12:00:00.000Z");
}

#[test]
fn delete_clears_record_and_envelope() {
    let (_dir, store) = setup_store();
    let key = RecordKey::new("user-1", "2025-06-01");

    store.put(&key, &json!({"cravings": 1})).expect("put");
    store.delete(&key).expect("delete");

    assert!(store.get(&key).expect("get").is_none());
    assert!(store.pending("user-1").expect("pending").is_empty());
    // Deleting an absent key is a no-op.
    store.delete(&key).expect("second delete");
}

#[test]
fn settings_round_trip() {
    let (_dir, store) = setup_store();

    assert!(store.get_setting("auth_token").expect("get").is_none());
    store.set_setting("auth_token", "tok-1").expect("set");
    assert_eq!(
        store.get_setting("auth_token").expect("get"),
        Some("tok-1".to_string())
    );
    store.set_setting("auth_token", "tok-2").expect("overwrite");
    assert_eq!(
        store.get_setting("auth_token").expect("get"),
        Some("tok-2".to_string())
    );
    store.delete_setting("auth_token").expect("delete");
    assert!(store.get_setting("auth_token").expect("get").is_none());
}
