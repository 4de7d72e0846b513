#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use quitpath_core::{ApiMetricSample, TelemetryEvent};
use quitpath_db::Db;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn make_event(event_name: &str, session_id: &str, created_at: &str) -> TelemetryEvent {
    TelemetryEvent {
        user_id: Some("user-1".to_string()),
        session_id: session_id.to_string(),
        event_name: event_name.to_string(),
        properties: serde_json::Map::new(),
        created_at: created_at.to_string(),
    }
}

pub fn make_sample(
    endpoint: &str,
    ts: &str,
    latency_ms: u64,
    status: u16,
    error: Option<&str>,
) -> ApiMetricSample {
    ApiMetricSample {
        endpoint: endpoint.to_string(),
        method: "POST".to_string(),
        ts: ts.to_string(),
        latency_ms,
        status,
        error: error.map(|value| value.to_string()),
        requester_id: Some("user-1".to_string()),
    }
}
