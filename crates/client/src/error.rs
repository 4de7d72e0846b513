use quitpath_api::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The hard request deadline fired before a response arrived.
    #[error("Request timeout")]
    Timeout,
    /// No HTTP response was obtained (connection/DNS failure). The only
    /// retryable class.
    #[error("transport error: {0}")]
    Transport(String),
    /// A non-2xx response, thrown immediately with the parsed error body
    /// when one was available.
    #[error("http {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<ErrorBody>,
    },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("local store error: {0}")]
    Store(#[from] quitpath_store::StoreError),
}

impl ClientError {
    /// HTTP status behind this error; 0 when no response was obtained.
    pub fn status(&self) -> u16 {
        match self {
            ClientError::Http { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}
