mod support;

use quitpath_core::TimeRange;

use support::{make_sample, setup_db};

#[test]
fn samples_filter_by_range() {
    let test_db = setup_db();
    let samples = [
        make_sample("/api/records_upsert", "2025-06-01T09:00:00.000Z", 12, 200, None),
        make_sample("/api/records_upsert", "2025-06-01T11:00:00.000Z", 20, 200, None),
        make_sample("/api/events_ingest", "2025-06-01T11:30:00.000Z", 35, 500, Some("db locked")),
        make_sample("/api/records_upsert", "2025-06-01T13:00:00.000Z", 18, 200, None),
    ];
    for sample in &samples {
        test_db.db.insert_metric_sample(sample).expect("insert sample");
    }

    let range = TimeRange {
        start: "2025-06-01T10:00:00.000Z".to_string(),
        end: "2025-06-01T12:00:00.000Z".to_string(),
    };
    let in_range = test_db.db.metric_samples_in_range(&range).expect("query");

    assert_eq!(in_range.len(), 2);
    assert_eq!(in_range[0].endpoint, "/api/records_upsert");
    assert_eq!(in_range[1].endpoint, "/api/events_ingest");
    assert_eq!(in_range[1].error.as_deref(), Some("db locked"));
    assert_eq!(test_db.db.count_metric_samples().expect("count"), 4);
}
