mod support;

use support::{make_event, setup_db};

#[test]
fn bulk_insert_preserves_batch_order() {
    let mut test_db = setup_db();
    let events = vec![
        make_event("signup", "s-1", "2025-06-01T10:00:00.000Z"),
        make_event("craving_logged", "s-1", "2025-06-01T10:00:01.000Z"),
        make_event("journal_saved", "s-1", "2025-06-01T10:00:02.000Z"),
    ];

    let inserted = test_db
        .db
        .insert_telemetry_events(&events)
        .expect("insert events");

    assert_eq!(inserted, 3);
    assert_eq!(test_db.db.count_telemetry_events().expect("count"), 3);
    assert_eq!(
        test_db.db.list_event_names().expect("names"),
        vec!["signup", "craving_logged", "journal_saved"]
    );
}

#[test]
fn empty_batch_is_a_no_op() {
    let mut test_db = setup_db();
    let inserted = test_db
        .db
        .insert_telemetry_events(&[])
        .expect("insert empty");
    assert_eq!(inserted, 0);
    assert_eq!(test_db.db.count_telemetry_events().expect("count"), 0);
}
