//! Mobile client core: local-first record sync, batched telemetry and the
//! backoff-aware network client they share.

mod config;
mod error;
mod net;
mod sync;
mod telemetry;
mod token;

use std::sync::{Arc, Mutex};

use quitpath_store::LocalStore;

pub use config::ClientConfig;
pub use error::ClientError;
pub use net::{ApiClient, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportFailure};
pub use sync::{SyncReconciler, SyncReport};
pub use telemetry::TelemetryQueue;
pub use token::{AUTH_TOKEN_SETTING, InMemoryTokenSource, StoredTokenSource, TokenSource};

/// The local store is shared between the reconciler, the telemetry spool
/// and the token source; sqlite connections are not `Sync`, so access goes
/// through one mutex.
pub type SharedStore = Arc<Mutex<LocalStore>>;

pub(crate) fn lock_store(store: &SharedStore) -> std::sync::MutexGuard<'_, LocalStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
