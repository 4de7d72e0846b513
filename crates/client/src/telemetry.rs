use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rand::RngCore;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use quitpath_core::{SubscriptionState, TelemetryEvent, is_critical_event};

use crate::config::ClientConfig;
use crate::net::ApiClient;
use crate::{SharedStore, lock_store};

struct PendingEvent {
    event_name: String,
    properties: Map<String, Value>,
}

#[derive(Clone)]
struct SpooledEvent {
    seq: Option<i64>,
    event: TelemetryEvent,
}

struct QueueState {
    initialized: bool,
    session_id: Option<String>,
    user_id: Option<String>,
    subscription: Option<SubscriptionState>,
    pre_init: Vec<PendingEvent>,
    queue: Vec<SpooledEvent>,
}

struct QueueInner {
    config: ClientConfig,
    api: ApiClient,
    spool: Option<SharedStore>,
    state: Mutex<QueueState>,
    /// Serializes flushes so a retried batch cannot interleave with a
    /// concurrent one; `track()` never waits on this.
    flush_lock: tokio::sync::Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// In-memory event buffer with timer-, size- and criticality-driven
/// flushing, optionally backed by the local store's durable spool.
///
/// Constructed explicitly and started once per process; there is no
/// module-level instance.
#[derive(Clone)]
pub struct TelemetryQueue {
    inner: Arc<QueueInner>,
}

impl TelemetryQueue {
    pub fn new(api: ApiClient, config: ClientConfig, spool: Option<SharedStore>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                api,
                spool,
                state: Mutex::new(QueueState {
                    initialized: false,
                    session_id: None,
                    user_id: None,
                    subscription: None,
                    pre_init: Vec::new(),
                    queue: Vec::new(),
                }),
                flush_lock: tokio::sync::Mutex::new(()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Finishes initialization: assigns the per-process session id, reloads
    /// spooled events from a previous process, replays the pre-init buffer
    /// and starts the background flush timer. Must run inside a tokio
    /// runtime.
    pub fn start(&self) {
        let spooled = self.load_spool();
        {
            let mut state = self.lock_state();
            if state.initialized {
                return;
            }
            state.initialized = true;
            state.session_id = Some(generate_session_id());
            state.queue = spooled;
            let replayed: Vec<PendingEvent> = state.pre_init.drain(..).collect();
            for pending in replayed {
                let event = build_event(
                    &state,
                    &self.inner.config,
                    &pending.event_name,
                    pending.properties,
                );
                let seq = self.spool_append(&event);
                state.queue.push(SpooledEvent { seq, event });
            }
        }

        let queue = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(queue.inner.config.flush_interval);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                queue.flush().await;
            }
        });
        let mut timer = self.lock_timer();
        *timer = Some(handle);
    }

    pub fn set_user(&self, user_id: Option<String>) {
        self.lock_state().user_id = user_id;
    }

    pub fn set_subscription(&self, subscription: Option<SubscriptionState>) {
        self.lock_state().subscription = subscription;
    }

    /// Records one event. Before `start()` the event is held in the
    /// pre-init buffer; afterwards it is stamped, spooled and queued.
    /// Critical events and a full queue trigger an immediate flush.
    pub async fn track(&self, event_name: &str, properties: Map<String, Value>) {
        let event = {
            let mut state = self.lock_state();
            if !state.initialized {
                state.pre_init.push(PendingEvent {
                    event_name: event_name.to_string(),
                    properties,
                });
                return;
            }
            build_event(&state, &self.inner.config, event_name, properties)
        };
        let seq = self.spool_append(&event);
        let queue_len = {
            let mut state = self.lock_state();
            state.queue.push(SpooledEvent { seq, event });
            state.queue.len()
        };
        if is_critical_event(event_name) || queue_len >= self.inner.config.flush_threshold {
            self.flush().await;
        }
    }

    /// Swaps the queue out before awaiting the network call, so `track()`
    /// calls racing the flush land in a fresh queue. On failure the batch
    /// is put back at the front, preserving delivery order; the error is
    /// swallowed and the next timer tick retries.
    pub async fn flush(&self) {
        let _flush_guard = self.inner.flush_lock.lock().await;
        let batch: Vec<SpooledEvent> = {
            let mut state = self.lock_state();
            std::mem::take(&mut state.queue)
        };
        if batch.is_empty() {
            return;
        }
        let events: Vec<TelemetryEvent> = batch.iter().map(|item| item.event.clone()).collect();
        let count = events.len();
        match self.inner.api.submit_events(events).await {
            Ok(_) => {
                let seqs: Vec<i64> = batch.iter().filter_map(|item| item.seq).collect();
                self.spool_remove(&seqs);
                tracing::debug!(count, "flushed telemetry batch");
            }
            Err(err) => {
                tracing::debug!(error = %err, count, "telemetry flush failed, re-queueing batch");
                let mut state = self.lock_state();
                let mut requeued = batch;
                requeued.extend(state.queue.drain(..));
                state.queue = requeued;
            }
        }
    }

    /// Session teardown: stops the timer and makes one final flush attempt.
    pub async fn shutdown(&self) {
        let handle = self.lock_timer().take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.flush().await;
    }

    /// Events currently buffered (excluding the pre-init holding area).
    pub fn queued_len(&self) -> usize {
        self.lock_state().queue.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn load_spool(&self) -> Vec<SpooledEvent> {
        let Some(store) = &self.inner.spool else {
            return Vec::new();
        };
        match lock_store(store).spool_load() {
            Ok(rows) => rows
                .into_iter()
                .map(|(seq, event)| SpooledEvent {
                    seq: Some(seq),
                    event,
                })
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to reload telemetry spool");
                Vec::new()
            }
        }
    }

    fn spool_append(&self, event: &TelemetryEvent) -> Option<i64> {
        let store = self.inner.spool.as_ref()?;
        match lock_store(store).spool_append(event) {
            Ok(seq) => Some(seq),
            Err(err) => {
                tracing::warn!(error = %err, "failed to spool telemetry event");
                None
            }
        }
    }

    fn spool_remove(&self, seqs: &[i64]) {
        if seqs.is_empty() {
            return;
        }
        let Some(store) = &self.inner.spool else {
            return;
        };
        if let Err(err) = lock_store(store).spool_remove(seqs) {
            tracing::warn!(error = %err, "failed to truncate telemetry spool");
        }
    }
}

fn build_event(
    state: &QueueState,
    config: &ClientConfig,
    event_name: &str,
    mut properties: Map<String, Value>,
) -> TelemetryEvent {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    properties.insert("platform".to_string(), Value::from(config.platform.clone()));
    properties.insert(
        "app_version".to_string(),
        Value::from(config.app_version.clone()),
    );
    if let Some(subscription) = &state.subscription {
        properties.insert(
            "is_subscriber".to_string(),
            Value::from(subscription.is_active_at(&now)),
        );
    }
    TelemetryEvent {
        user_id: state.user_id.clone(),
        session_id: state.session_id.clone().unwrap_or_default(),
        event_name: event_name.to_string(),
        properties,
        created_at: now,
    }
}

fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}
