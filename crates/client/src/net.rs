use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use quitpath_api::{
    DeletedResponse, ErrorBody, EventBatchRequest, InsertedResponse, RecordDeleteRequest,
    RecordGetRequest, RecordListRequest, RecordListResponse, RecordMaybeResponse, RecordResponse,
    RecordUpsertRequest,
};
use quitpath_core::{RemoteRecord, TelemetryEvent};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::token::TokenSource;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure; the retryable class.
    #[error("{0}")]
    Failed(String),
}

/// Transport seam under the API client so tests can script failures
/// without a listening socket.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        // No per-client timeout; the API client enforces the deadline via
        // cancellation so it applies to any transport.
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|err| TransportFailure::Failed(err.to_string()))?;
        let mut builder = self
            .client
            .request(method, &request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::Failed(err.to_string())
    }
}

struct ApiClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_transport(config, tokens, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        config: ClientConfig,
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                config,
                transport,
                tokens,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// POSTs `body` to `path` and decodes the JSON response. Transport
    /// failures back off with `base_delay * 2^(max_retries - remaining)`;
    /// timeouts and HTTP errors propagate immediately.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ClientError> {
        let payload = serde_json::to_vec(body)?;
        let url = format!(
            "{}{}",
            self.inner.config.base_url.trim_end_matches('/'),
            path
        );
        let mut retries_remaining = self.inner.config.max_retries;
        loop {
            match self.attempt(&url, &payload).await {
                Ok(response) => return self.decode(response),
                Err(ClientError::Transport(message)) if retries_remaining > 0 => {
                    let exponent = self.inner.config.max_retries - retries_remaining;
                    let delay = self.inner.config.retry_base_delay * 2u32.pow(exponent);
                    tracing::debug!(
                        error = %message,
                        delay_ms = delay.as_millis() as u64,
                        "transport failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    retries_remaining -= 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self, url: &str, payload: &[u8]) -> Result<HttpResponse, ClientError> {
        let request = HttpRequest {
            method: "POST".to_string(),
            url: url.to_string(),
            bearer: self.inner.tokens.token(),
            body: Some(payload.to_vec()),
        };
        let send = self.inner.transport.send(request);
        match tokio::time::timeout(self.inner.config.request_timeout, send).await {
            Err(_) => Err(ClientError::Timeout),
            Ok(Err(TransportFailure::Timeout)) => Err(ClientError::Timeout),
            Ok(Err(TransportFailure::Failed(message))) => Err(ClientError::Transport(message)),
            Ok(Ok(response)) => Ok(response),
        }
    }

    fn decode<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ClientError> {
        if (200..300).contains(&response.status) {
            return Ok(serde_json::from_slice(&response.body)?);
        }
        if response.status == 401 {
            // Force the next request to re-resolve credentials.
            self.inner.tokens.clear();
        }
        let body: Option<ErrorBody> = serde_json::from_slice(&response.body).ok();
        let message = body
            .as_ref()
            .map(|parsed| parsed.message.clone())
            .unwrap_or_else(|| format!("request failed with status {}", response.status));
        Err(ClientError::Http {
            status: response.status,
            message,
            body,
        })
    }

    pub async fn upsert_record(
        &self,
        request: &RecordUpsertRequest,
    ) -> Result<RemoteRecord, ClientError> {
        let response: RecordResponse = self.request("/api/records_upsert", request).await?;
        Ok(response.record)
    }

    pub async fn get_record(
        &self,
        request: &RecordGetRequest,
    ) -> Result<Option<RemoteRecord>, ClientError> {
        let response: RecordMaybeResponse = self.request("/api/records_get", request).await?;
        Ok(response.record)
    }

    pub async fn list_records(&self, owner_id: &str) -> Result<Vec<RemoteRecord>, ClientError> {
        let request = RecordListRequest {
            owner_id: owner_id.to_string(),
        };
        let response: RecordListResponse = self.request("/api/records_list", &request).await?;
        Ok(response.records)
    }

    pub async fn delete_record(&self, request: &RecordDeleteRequest) -> Result<bool, ClientError> {
        let response: DeletedResponse = self.request("/api/records_delete", request).await?;
        Ok(response.deleted)
    }

    pub async fn submit_events(&self, events: Vec<TelemetryEvent>) -> Result<usize, ClientError> {
        let request = EventBatchRequest { events };
        let response: InsertedResponse = self.request("/api/events_ingest", &request).await?;
        Ok(response.inserted)
    }
}
