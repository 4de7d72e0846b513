use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Chance that a request also sweeps expired windows, bounding memory
/// growth without a dedicated timer.
const SWEEP_PROBABILITY: f64 = 0.01;
/// Entries stay evictable-but-present for this long past their window so
/// a reset straddling the boundary still sees its own entry.
const SWEEP_GRACE_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy)]
pub struct RouteLimit {
    pub max_requests: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub default: RouteLimit,
    pub overrides: HashMap<String, RouteLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut overrides = HashMap::new();
        // Telemetry batches arrive in bursts; summaries are dashboard polls.
        overrides.insert(
            "/api/events_ingest".to_string(),
            RouteLimit {
                max_requests: 240,
                window_ms: 60_000,
            },
        );
        overrides.insert(
            "/api/metrics_summary".to_string(),
            RouteLimit {
                max_requests: 30,
                window_ms: 60_000,
            },
        );
        Self {
            default: RouteLimit {
                max_requests: 60,
                window_ms: 60_000,
            },
            overrides,
        }
    }
}

impl RateLimitConfig {
    pub fn route_limit(&self, route: &str) -> RouteLimit {
        self.overrides.get(route).copied().unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowHit {
    pub count: u32,
    pub reset_at_ms: u64,
}

/// Fixed-window counter seam. The in-memory impl is correct for a single
/// process; a shared counter service can stand in behind the same trait.
pub trait CounterStore: Send + Sync {
    /// Counts a request against the `(identifier, route)` window, resetting
    /// the window to `count = 1` when it has lapsed.
    fn hit(&self, identifier: &str, route: &str, window_ms: u64, now_ms: u64) -> WindowHit;
    /// Drops entries whose window ended before `expired_before_ms`.
    fn sweep(&self, expired_before_ms: u64);
}

struct WindowEntry {
    count: u32,
    reset_at_ms: u64,
}

#[derive(Default)]
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<(String, String), WindowEntry>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn hit(&self, identifier: &str, route: &str, window_ms: u64, now_ms: u64) -> WindowHit {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (identifier.to_string(), route.to_string());
        if let Some(entry) = entries.get_mut(&key)
            && now_ms <= entry.reset_at_ms
        {
            entry.count += 1;
            return WindowHit {
                count: entry.count,
                reset_at_ms: entry.reset_at_ms,
            };
        }
        let reset_at_ms = now_ms + window_ms;
        entries.insert(
            key,
            WindowEntry {
                count: 1,
                reset_at_ms,
            },
        );
        WindowHit {
            count: 1,
            reset_at_ms,
        }
    }

    fn sweep(&self, expired_before_ms: u64) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.retain(|_, entry| entry.reset_at_ms >= expired_before_ms);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryCounterStore::new()))
    }

    pub fn with_store(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self { store, config }
    }

    pub fn check(&self, identifier: &str, route: &str) -> Decision {
        self.check_at(identifier, route, now_ms())
    }

    pub fn check_at(&self, identifier: &str, route: &str, now_ms: u64) -> Decision {
        let limit = self.config.route_limit(route);
        let hit = self.store.hit(identifier, route, limit.window_ms, now_ms);
        if rand::thread_rng().r#gen::<f64>() < SWEEP_PROBABILITY {
            self.store.sweep(now_ms.saturating_sub(SWEEP_GRACE_MS));
        }
        if hit.count > limit.max_requests {
            let retry_after_ms = hit.reset_at_ms.saturating_sub(now_ms);
            return Decision {
                allowed: false,
                limit: limit.max_requests,
                remaining: 0,
                retry_after_secs: retry_after_ms.div_ceil(1000),
            };
        }
        Decision {
            allowed: true,
            limit: limit.max_requests,
            remaining: limit.max_requests - hit.count,
            retry_after_secs: 0,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
