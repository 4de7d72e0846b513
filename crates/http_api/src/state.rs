use std::sync::Arc;

use rand::RngCore;

use quitpath_app::AppState;

use crate::rate_limit::RateLimiter;

/// Session collaborator: resolves a bearer token to a user id, or `None`
/// when the token does not belong to a live session.
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str) -> Option<String>;
}

/// Single shared-token deployment, used by the CLI binary and tests.
pub struct StaticTokenValidator {
    token: String,
    user_id: String,
}

impl StaticTokenValidator {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }
}

impl SessionValidator for StaticTokenValidator {
    fn validate(&self, token: &str) -> Option<String> {
        (token == self.token).then(|| self.user_id.clone())
    }
}

/// Authenticated user attached to the request by the session middleware.
#[derive(Debug, Clone)]
pub struct SessionUser(pub String);

#[derive(Clone)]
pub struct HttpState {
    pub app: AppState,
    pub sessions: Arc<dyn SessionValidator>,
    pub limiter: Arc<RateLimiter>,
}

impl HttpState {
    pub fn new(app: AppState, sessions: Arc<dyn SessionValidator>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            app,
            sessions,
            limiter,
        }
    }
}

pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
