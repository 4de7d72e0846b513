#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tempfile::TempDir;

use quitpath_api::{
    DeletedResponse, ErrorBody, EventBatchRequest, InsertedResponse, RecordDeleteRequest,
    RecordGetRequest, RecordListRequest, RecordListResponse, RecordMaybeResponse, RecordResponse,
    RecordUpsertRequest,
};
use quitpath_client::{
    ApiClient, ClientConfig, HttpRequest, HttpResponse, InMemoryTokenSource, SharedStore,
    Transport, TransportFailure,
};
use quitpath_core::{RemoteRecord, TelemetryEvent};
use quitpath_store::LocalStore;

pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("http://backend");
    config.request_timeout = Duration::from_secs(5);
    config.max_retries = 3;
    config.retry_base_delay = Duration::from_millis(5);
    config.flush_interval = Duration::from_secs(3600);
    config.flush_threshold = 100;
    config.platform = "test".to_string();
    config.app_version = "0.0.0".to_string();
    config
}

pub fn shared_store() -> (TempDir, SharedStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = LocalStore::open(dir.path().join("local.sqlite")).expect("open store");
    store.migrate().expect("migrate");
    (dir, Arc::new(Mutex::new(store)))
}

pub fn api_with(transport: Arc<dyn Transport>, config: ClientConfig) -> ApiClient {
    let tokens = Arc::new(InMemoryTokenSource::new(Some("tok".to_string())));
    ApiClient::with_transport(config, tokens, transport)
}

/// In-memory stand-in for the backend: upsert-by-composite-key records and
/// an append-only event log, plus failure scripting knobs.
#[derive(Default)]
pub struct FakeBackend {
    pub records: Mutex<HashMap<(String, String), RemoteRecord>>,
    pub events: Mutex<Vec<TelemetryEvent>>,
    pub offline: AtomicBool,
    /// Fail this many upcoming requests at the transport level.
    pub fail_requests: AtomicU32,
    /// Natural keys whose upserts are rejected with a 500.
    pub reject_keys: Mutex<HashSet<String>>,
    pub attempts: AtomicU32,
    pub upserts: AtomicU32,
    pub last_bearer: Mutex<Option<Option<String>>>,
    clock: AtomicU64,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn seed_record(&self, owner_id: &str, natural_key: &str, payload: Value) {
        let record = RemoteRecord {
            owner_id: owner_id.to_string(),
            natural_key: natural_key.to_string(),
            payload,
            updated_at: self.next_timestamp(),
        };
        self.records
            .lock()
            .expect("records lock")
            .insert((owner_id.to_string(), natural_key.to_string()), record);
    }

    pub fn record_payload(&self, owner_id: &str, natural_key: &str) -> Option<Value> {
        self.records
            .lock()
            .expect("records lock")
            .get(&(owner_id.to_string(), natural_key.to_string()))
            .map(|record| record.payload.clone())
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("events lock")
            .iter()
            .map(|event| event.event_name.clone())
            .collect()
    }

    pub fn events_snapshot(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("events lock").clone()
    }

    fn next_timestamp(&self) -> String {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst);
        format!(
            "2025-06-01T{:02}:{:02}:{:02}.000Z",
            tick / 3600,
            tick / 60 % 60,
            tick % 60
        )
    }

    fn respond(status: u16, body: &impl Serialize) -> HttpResponse {
        HttpResponse {
            status,
            body: serde_json::to_vec(body).expect("encode response"),
        }
    }

    fn error(status: u16, message: &str) -> HttpResponse {
        Self::respond(
            status,
            &ErrorBody {
                status,
                message: message.to_string(),
                code: None,
            },
        )
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        *self.last_bearer.lock().expect("bearer lock") = Some(request.bearer.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportFailure::Failed("connection refused".to_string()));
        }
        if self
            .fail_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportFailure::Failed("connection reset".to_string()));
        }

        let body: Value = request
            .body
            .as_deref()
            .map(|bytes| serde_json::from_slice(bytes).expect("request json"))
            .unwrap_or(Value::Null);

        if request.url.ends_with("/api/records_upsert") {
            let req: RecordUpsertRequest =
                serde_json::from_value(body).expect("upsert request");
            if self
                .reject_keys
                .lock()
                .expect("reject lock")
                .contains(&req.natural_key)
            {
                return Ok(Self::error(500, "db locked"));
            }
            self.upserts.fetch_add(1, Ordering::SeqCst);
            let record = RemoteRecord {
                owner_id: req.owner_id.clone(),
                natural_key: req.natural_key.clone(),
                payload: req.payload,
                updated_at: self.next_timestamp(),
            };
            self.records
                .lock()
                .expect("records lock")
                .insert((req.owner_id, req.natural_key), record.clone());
            return Ok(Self::respond(200, &RecordResponse { record }));
        }
        if request.url.ends_with("/api/records_get") {
            let req: RecordGetRequest = serde_json::from_value(body).expect("get request");
            let record = self
                .records
                .lock()
                .expect("records lock")
                .get(&(req.owner_id, req.natural_key))
                .cloned();
            return Ok(Self::respond(200, &RecordMaybeResponse { record }));
        }
        if request.url.ends_with("/api/records_list") {
            let req: RecordListRequest = serde_json::from_value(body).expect("list request");
            let mut records: Vec<RemoteRecord> = self
                .records
                .lock()
                .expect("records lock")
                .values()
                .filter(|record| record.owner_id == req.owner_id)
                .cloned()
                .collect();
            records.sort_by(|a, b| a.natural_key.cmp(&b.natural_key));
            return Ok(Self::respond(200, &RecordListResponse { records }));
        }
        if request.url.ends_with("/api/records_delete") {
            let req: RecordDeleteRequest = serde_json::from_value(body).expect("delete request");
            let deleted = self
                .records
                .lock()
                .expect("records lock")
                .remove(&(req.owner_id, req.natural_key))
                .is_some();
            return Ok(Self::respond(200, &DeletedResponse { deleted }));
        }
        if request.url.ends_with("/api/events_ingest") {
            let req: EventBatchRequest = serde_json::from_value(body).expect("events request");
            let inserted = req.events.len();
            self.events.lock().expect("events lock").extend(req.events);
            return Ok(Self::respond(200, &InsertedResponse { inserted }));
        }
        Ok(Self::error(404, "unknown route"))
    }
}

/// Transport that never reaches a server.
#[derive(Default)]
pub struct FailingTransport {
    pub attempts: AtomicU32,
}

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportFailure::Failed("connection refused".to_string()))
    }
}

/// Transport that answers every request with a fixed status and body.
pub struct StatusTransport {
    pub status: u16,
    pub body: Value,
    pub attempts: AtomicU32,
}

impl StatusTransport {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Transport for StatusTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse {
            status: self.status,
            body: serde_json::to_vec(&self.body).expect("encode body"),
        })
    }
}

/// Transport that hangs long enough to trip the client deadline.
pub struct SlowTransport {
    pub delay: Duration,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        tokio::time::sleep(self.delay).await;
        Ok(HttpResponse {
            status: 200,
            body: b"{}".to_vec(),
        })
    }
}
