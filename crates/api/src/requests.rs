use serde::{Deserialize, Serialize};
use serde_json::Value;

use quitpath_core::TelemetryEvent;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordUpsertRequest {
    pub owner_id: String,
    pub natural_key: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordGetRequest {
    pub owner_id: String,
    pub natural_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordListRequest {
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDeleteRequest {
    pub owner_id: String,
    pub natural_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBatchRequest {
    pub events: Vec<TelemetryEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummaryRequest {
    pub range: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}
