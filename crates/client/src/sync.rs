use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use quitpath_api::{RecordDeleteRequest, RecordGetRequest, RecordUpsertRequest};
use quitpath_core::{JournalEntry, RecordKey, SyncStatus};
use quitpath_store::LocalRecord;

use crate::error::ClientError;
use crate::net::ApiClient;
use crate::{SharedStore, lock_store};

/// Bound on concurrent remote calls during `sync_pending`, so a large
/// backlog cannot saturate the network client.
pub const SYNC_CONCURRENCY: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
}

/// Reconciles the local record store with the authoritative backend.
/// Conflicts resolve last-write-wins through the server's upsert; the
/// reconciler does no field-level merging.
#[derive(Clone)]
pub struct SyncReconciler {
    store: SharedStore,
    api: ApiClient,
    owner_id: String,
    sync_permits: Arc<Semaphore>,
}

impl SyncReconciler {
    pub fn new(store: SharedStore, api: ApiClient, owner_id: impl Into<String>) -> Self {
        Self {
            store,
            api,
            owner_id: owner_id.into(),
            sync_permits: Arc::new(Semaphore::new(SYNC_CONCURRENCY)),
        }
    }

    fn key(&self, natural_key: &str) -> RecordKey {
        RecordKey::new(self.owner_id.clone(), natural_key)
    }

    /// Writes locally first (the write is retained no matter what), then
    /// attempts one remote upsert. Remote failures degrade to a `Failed`
    /// envelope instead of propagating; only local store errors are `Err`.
    pub async fn save(&self, natural_key: &str, payload: &Value) -> Result<SyncStatus, ClientError> {
        let key = self.key(natural_key);
        lock_store(&self.store).put(&key, payload)?;
        self.push(&key, payload).await
    }

    pub async fn save_entry(&self, entry: &JournalEntry) -> Result<SyncStatus, ClientError> {
        let payload = serde_json::to_value(entry)?;
        self.save(&entry.date, &payload).await
    }

    /// Remote is authoritative for reads when reachable: a fetched record
    /// overwrites the local cache. On remote failure (or a key the backend
    /// does not have) the local copy is returned instead.
    pub async fn load(&self, natural_key: &str) -> Result<Option<Value>, ClientError> {
        let key = self.key(natural_key);
        let request = RecordGetRequest {
            owner_id: key.owner_id.clone(),
            natural_key: key.natural_key.clone(),
        };
        match self.api.get_record(&request).await {
            Ok(Some(remote)) => {
                lock_store(&self.store).put_synced(&key, &remote.payload, &remote.updated_at)?;
                Ok(Some(remote.payload))
            }
            Ok(None) => Ok(lock_store(&self.store).get(&key)?),
            Err(err) => {
                tracing::debug!(error = %err, natural_key, "remote fetch failed, serving local copy");
                Ok(lock_store(&self.store).get(&key)?)
            }
        }
    }

    pub async fn load_entry(&self, date: &str) -> Result<Option<JournalEntry>, ClientError> {
        match self.load(date).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Merges the full remote listing into the local cache (remote entries
    /// win on key collision) and returns the merged map keyed by natural
    /// key. On remote failure the local map is returned unmodified.
    pub async fn load_all(&self) -> Result<BTreeMap<String, Value>, ClientError> {
        match self.api.list_records(&self.owner_id).await {
            Ok(remote_records) => {
                let store = lock_store(&self.store);
                for remote in &remote_records {
                    let key = RecordKey::new(remote.owner_id.clone(), remote.natural_key.clone());
                    store.put_synced(&key, &remote.payload, &remote.updated_at)?;
                }
                Ok(local_map(store.get_all(&self.owner_id)?))
            }
            Err(err) => {
                tracing::debug!(error = %err, "remote listing failed, serving local records");
                Ok(local_map(lock_store(&self.store).get_all(&self.owner_id)?))
            }
        }
    }

    /// Re-attempts the upsert for every record not yet synced. Attempts are
    /// independent per key; a failure on one never aborts the others.
    pub async fn sync_pending(&self) -> Result<SyncReport, ClientError> {
        let pending = lock_store(&self.store).pending(&self.owner_id)?;
        let mut tasks: JoinSet<Result<SyncStatus, ClientError>> = JoinSet::new();
        for record in pending {
            let reconciler = self.clone();
            tasks.spawn(async move {
                let _permit = match reconciler.sync_permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Ok(SyncStatus::Failed {
                            error: "sync aborted".to_string(),
                        });
                    }
                };
                reconciler.push(&record.key, &record.payload).await
            });
        }

        let mut report = SyncReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(SyncStatus::Synced)) => report.synced += 1,
                Ok(Ok(_)) => report.failed += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    tracing::warn!(error = %err, "local store error during pending sync");
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(error = %err, "pending sync task panicked");
                }
            }
        }
        Ok(report)
    }

    /// Best-effort remote delete, then unconditional local delete.
    pub async fn delete(&self, natural_key: &str) -> Result<(), ClientError> {
        let key = self.key(natural_key);
        let request = RecordDeleteRequest {
            owner_id: key.owner_id.clone(),
            natural_key: key.natural_key.clone(),
        };
        if let Err(err) = self.api.delete_record(&request).await {
            tracing::warn!(error = %err, natural_key, "remote delete failed, removing local copy anyway");
        }
        lock_store(&self.store).delete(&key)?;
        Ok(())
    }

    async fn push(&self, key: &RecordKey, payload: &Value) -> Result<SyncStatus, ClientError> {
        lock_store(&self.store).mark_status(key, &SyncStatus::Syncing, None)?;
        let request = RecordUpsertRequest {
            owner_id: key.owner_id.clone(),
            natural_key: key.natural_key.clone(),
            payload: payload.clone(),
        };
        match self.api.upsert_record(&request).await {
            Ok(remote) => {
                lock_store(&self.store).put_synced(key, &remote.payload, &remote.updated_at)?;
                Ok(SyncStatus::Synced)
            }
            Err(err) => {
                let status = SyncStatus::Failed {
                    error: err.to_string(),
                };
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                lock_store(&self.store).mark_status(key, &status, Some(&now))?;
                tracing::warn!(
                    error = %err,
                    natural_key = %key.natural_key,
                    "remote upsert failed, keeping local write"
                );
                Ok(status)
            }
        }
    }
}

fn local_map(records: Vec<LocalRecord>) -> BTreeMap<String, Value> {
    records
        .into_iter()
        .map(|record| (record.key.natural_key, record.payload))
        .collect()
}
