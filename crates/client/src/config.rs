use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Hard deadline per request attempt, enforced by cancellation.
    pub request_timeout: Duration,
    /// Retries for transport-level failures only; HTTP errors and timeouts
    /// are never retried.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub flush_interval: Duration,
    pub flush_threshold: usize,
    pub platform: String,
    pub app_version: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            flush_interval: Duration::from_secs(30),
            flush_threshold: 100,
            platform: default_platform().to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn default_platform() -> &'static str {
    if cfg!(target_os = "ios") {
        "ios"
    } else if cfg!(target_os = "android") {
        "android"
    } else {
        std::env::consts::OS
    }
}
