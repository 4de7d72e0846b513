mod support;

use serde_json::json;

use support::setup_db;

#[test]
fn upsert_is_idempotent_per_key() {
    let test_db = setup_db();
    let payload = json!({"date": "2025-06-01", "cravings": 3, "cigarettes_smoked": 0});

    test_db
        .db
        .upsert_record("user-1", "2025-06-01", &payload)
        .expect("first upsert");
    test_db
        .db
        .upsert_record("user-1", "2025-06-01", &payload)
        .expect("second upsert");

    assert_eq!(test_db.db.count_records("user-1").expect("count"), 1);
    let records = test_db.db.list_records("user-1").expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, payload);
}

#[test]
fn upsert_overwrites_payload_and_assigns_server_timestamp() {
    let test_db = setup_db();
    let first = test_db
        .db
        .upsert_record("user-1", "2025-06-01", &json!({"cravings": 1}))
        .expect("first upsert");
    let second = test_db
        .db
        .upsert_record("user-1", "2025-06-01", &json!({"cravings": 5}))
        .expect("second upsert");

    assert!(second.updated_at >= first.updated_at);
    let stored = test_db
        .db
        .get_record("user-1", "2025-06-01")
        .expect("get")
        .expect("record exists");
    assert_eq!(stored.payload, json!({"cravings": 5}));
    assert_eq!(stored.updated_at, second.updated_at);
}

#[test]
fn records_are_scoped_to_owner() {
    let test_db = setup_db();
    test_db
        .db
        .upsert_record("user-1", "2025-06-01", &json!({"cravings": 1}))
        .expect("upsert user-1");
    test_db
        .db
        .upsert_record("user-2", "2025-06-01", &json!({"cravings": 9}))
        .expect("upsert user-2");

    let records = test_db.db.list_records("user-1").expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].owner_id, "user-1");
    assert!(
        test_db
            .db
            .get_record("user-3", "2025-06-01")
            .expect("get missing")
            .is_none()
    );
}

#[test]
fn delete_is_idempotent() {
    let test_db = setup_db();
    test_db
        .db
        .upsert_record("user-1", "2025-06-01", &json!({"cravings": 1}))
        .expect("upsert");

    assert!(test_db.db.delete_record("user-1", "2025-06-01").expect("delete"));
    assert!(!test_db.db.delete_record("user-1", "2025-06-01").expect("second delete"));
    assert_eq!(test_db.db.count_records("user-1").expect("count"), 0);
}

#[test]
fn migrate_is_rerunnable() {
    let test_db = setup_db();
    let mut db = quitpath_db::Db::open(&test_db.path).expect("reopen");
    db.migrate().expect("second migrate");
}
