use serde::{Deserialize, Serialize};

use quitpath_core::{ApiMetricsSummary, RemoteRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub record: RemoteRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMaybeResponse {
    pub record: Option<RemoteRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordListResponse {
    pub records: Vec<RemoteRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertedResponse {
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummaryResponse {
    pub summaries: Vec<ApiMetricsSummary>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub fn ok() -> OkResponse {
    OkResponse { ok: true }
}

/// Error body shape produced by the server and parsed back by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
