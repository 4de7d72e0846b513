use std::sync::Mutex;

use crate::{SharedStore, lock_store};

pub const AUTH_TOKEN_SETTING: &str = "auth_token";

/// Credential seam for the network client. `clear()` is called on a 401 so
/// the next request is forced to re-resolve the token.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
    fn clear(&self);
}

/// Reads the bearer token from the local store's settings, caching it in
/// memory. `clear()` drops only the cache; the persisted value (refreshed
/// by the auth collaborator) is re-read on the next request.
pub struct StoredTokenSource {
    store: SharedStore,
    cached: Mutex<Option<Option<String>>>,
}

impl StoredTokenSource {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }
}

impl TokenSource for StoredTokenSource {
    fn token(&self) -> Option<String> {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = cached.as_ref() {
            return value.clone();
        }
        let value = match lock_store(&self.store).get_setting(AUTH_TOKEN_SETTING) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read auth token from local store");
                None
            }
        };
        *cached = Some(value.clone());
        value
    }

    fn clear(&self) {
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = None;
    }
}

/// Fixed token holder for tests and tools that do not carry a local store.
pub struct InMemoryTokenSource {
    token: Mutex<Option<String>>,
}

impl InMemoryTokenSource {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token),
        }
    }
}

impl TokenSource for InMemoryTokenSource {
    fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn clear(&self) {
        *self
            .token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
