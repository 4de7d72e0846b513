use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Composite key identifying one synced record: one journal entry per
/// owner per calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub owner_id: String,
    pub natural_key: String,
}

impl RecordKey {
    pub fn new(owner_id: impl Into<String>, natural_key: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            natural_key: natural_key.into(),
        }
    }
}

/// Whether the local copy of a record matches the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Unsynced,
    Syncing,
    Synced,
    Failed { error: String },
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncStatus::Synced)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    pub status: SyncStatus,
    pub last_sync_attempt: Option<String>,
}

impl SyncEnvelope {
    pub fn unsynced() -> Self {
        Self {
            status: SyncStatus::Unsynced,
            last_sync_attempt: None,
        }
    }
}

/// Authoritative server-side representation of a record. `updated_at` is
/// assigned by the server clock on upsert, never by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub owner_id: String,
    pub natural_key: String,
    pub payload: Value,
    pub updated_at: String,
}

/// Daily journal entry payload. The entry date doubles as the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub date: String,
    pub cravings: u32,
    pub cigarettes_smoked: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub user_id: Option<String>,
    pub session_id: String,
    pub event_name: String,
    pub properties: serde_json::Map<String, Value>,
    pub created_at: String,
}

pub mod event_names {
    pub const SIGNUP: &str = "signup";
    pub const REVENUE: &str = "revenue";
    pub const CONVERSION: &str = "conversion";
    pub const ERROR: &str = "error";
    pub const APP_CRASH: &str = "app_crash";
    pub const CRAVING_LOGGED: &str = "craving_logged";
    pub const JOURNAL_SAVED: &str = "journal_saved";
    pub const MILESTONE_REACHED: &str = "milestone_reached";
}

/// Events that are flushed immediately instead of waiting for the timer.
pub const CRITICAL_EVENTS: &[&str] = &[
    event_names::SIGNUP,
    event_names::REVENUE,
    event_names::CONVERSION,
    event_names::ERROR,
    event_names::APP_CRASH,
];

pub fn is_critical_event(event_name: &str) -> bool {
    CRITICAL_EVENTS.contains(&event_name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// One row per completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMetricSample {
    pub endpoint: String,
    pub method: String,
    pub ts: String,
    pub latency_ms: u64,
    pub status: u16,
    pub error: Option<String>,
    pub requester_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCount {
    pub message: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMetricsSummary {
    pub endpoint: String,
    pub method: String,
    pub total_calls: u64,
    pub calls_last_hour: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    pub distinct_requesters: u64,
    pub top_errors: Vec<ErrorCount>,
}

pub const TOP_ERRORS_LIMIT: usize = 5;

/// Percentile by index into the ascending-sorted latency set:
/// `sorted[floor(n * quantile)]`, clamped to the last element.
pub fn latency_percentile(sorted: &[u64], quantile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = ((sorted.len() as f64) * quantile).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

pub fn top_error_counts<'a>(errors: impl Iterator<Item = &'a str>) -> Vec<ErrorCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for error in errors {
        *counts.entry(error).or_insert(0) += 1;
    }
    let mut result: Vec<ErrorCount> = counts
        .into_iter()
        .map(|(message, count)| ErrorCount {
            message: message.to_string(),
            count,
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
    result.truncate(TOP_ERRORS_LIMIT);
    result
}

/// Groups samples by (endpoint, method) and derives one summary per group.
/// `last_hour_start` is an RFC3339 UTC boundary; timestamps in the same
/// format compare lexicographically.
pub fn summarize_samples(
    samples: &[ApiMetricSample],
    last_hour_start: &str,
) -> Vec<ApiMetricsSummary> {
    let mut groups: BTreeMap<(&str, &str), Vec<&ApiMetricSample>> = BTreeMap::new();
    for sample in samples {
        groups
            .entry((sample.endpoint.as_str(), sample.method.as_str()))
            .or_default()
            .push(sample);
    }
    groups
        .into_iter()
        .map(|((endpoint, method), group)| {
            let total_calls = group.len() as u64;
            let calls_last_hour = group
                .iter()
                .filter(|sample| sample.ts.as_str() >= last_hour_start)
                .count() as u64;
            let error_count = group.iter().filter(|sample| sample.status >= 400).count() as u64;
            let success_count = total_calls - error_count;
            let mut latencies: Vec<u64> = group.iter().map(|sample| sample.latency_ms).collect();
            latencies.sort_unstable();
            let distinct_requesters = group
                .iter()
                .filter_map(|sample| sample.requester_id.as_deref())
                .collect::<HashSet<_>>()
                .len() as u64;
            let top_errors = top_error_counts(
                group
                    .iter()
                    .filter_map(|sample| sample.error.as_deref()),
            );
            ApiMetricsSummary {
                endpoint: endpoint.to_string(),
                method: method.to_string(),
                total_calls,
                calls_last_hour,
                success_count,
                error_count,
                error_rate: error_count as f64 / total_calls as f64,
                p95_latency_ms: latency_percentile(&latencies, 0.95),
                p99_latency_ms: latency_percentile(&latencies, 0.99),
                distinct_requesters,
                top_errors,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Monthly,
    Annual,
    Lifetime,
}

/// Entitlement state. `expiry_date` is absent only for the lifetime tier;
/// for every other tier expiry is authoritative over the stored status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionState {
    pub status: SubscriptionStatus,
    pub tier: SubscriptionTier,
    pub expiry_date: Option<String>,
}

impl SubscriptionState {
    pub fn effective_status_at(&self, now: &str) -> SubscriptionStatus {
        if let Some(expiry) = &self.expiry_date
            && now > expiry.as_str()
        {
            return SubscriptionStatus::Expired;
        }
        self.status
    }

    pub fn is_active_at(&self, now: &str) -> bool {
        matches!(
            self.effective_status_at(now),
            SubscriptionStatus::Trial | SubscriptionStatus::Active
        )
    }
}

pub fn subscription_can_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> bool {
    use SubscriptionStatus::*;
    matches!(
        (from, to),
        (Trial, Active) | (Trial, Expired) | (Active, Cancelled) | (Active, Expired)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(endpoint: &str, latency_ms: u64, status: u16, error: Option<&str>) -> ApiMetricSample {
        ApiMetricSample {
            endpoint: endpoint.to_string(),
            method: "POST".to_string(),
            ts: "2025-06-01T12:30:00.000Z".to_string(),
            latency_ms,
            status,
            error: error.map(|value| value.to_string()),
            requester_id: None,
        }
    }

    #[test]
    fn percentile_uses_floor_index_into_sorted_set() {
        let latencies: Vec<u64> = (1..=100).map(|value| value * 10).collect();
        assert_eq!(latency_percentile(&latencies, 0.95), 960);
        assert_eq!(latency_percentile(&latencies, 0.99), 1000);
    }

    #[test]
    fn percentile_clamps_on_small_sets() {
        assert_eq!(latency_percentile(&[], 0.95), 0);
        assert_eq!(latency_percentile(&[42], 0.99), 42);
    }

    #[test]
    fn summary_counts_errors_and_last_hour() {
        let mut samples = vec![
            sample("/api/records_upsert", 20, 200, None),
            sample("/api/records_upsert", 40, 200, None),
            sample("/api/records_upsert", 80, 500, Some("db locked")),
            sample("/api/records_upsert", 90, 500, Some("db locked")),
        ];
        samples[0].ts = "2025-06-01T10:00:00.000Z".to_string();

        let summaries = summarize_samples(&samples, "2025-06-01T12:00:00.000Z");
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.total_calls, 4);
        assert_eq!(summary.calls_last_hour, 3);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.error_count, 2);
        assert!((summary.error_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(summary.top_errors.len(), 1);
        assert_eq!(summary.top_errors[0].message, "db locked");
        assert_eq!(summary.top_errors[0].count, 2);
    }

    #[test]
    fn top_errors_are_capped_and_ordered_by_frequency() {
        let errors = [
            "timeout", "timeout", "timeout", "db locked", "db locked", "bad key", "parse",
            "refused", "eof",
        ];
        let counts = top_error_counts(errors.iter().copied());
        assert_eq!(counts.len(), TOP_ERRORS_LIMIT);
        assert_eq!(counts[0].message, "timeout");
        assert_eq!(counts[0].count, 3);
        assert_eq!(counts[1].message, "db locked");
    }

    #[test]
    fn expiry_is_authoritative_over_stale_status() {
        let state = SubscriptionState {
            status: SubscriptionStatus::Active,
            tier: SubscriptionTier::Monthly,
            expiry_date: Some("2025-05-01T00:00:00.000Z".to_string()),
        };
        assert!(state.is_active_at("2025-04-30T23:59:00.000Z"));
        assert!(!state.is_active_at("2025-05-02T00:00:00.000Z"));
        assert_eq!(
            state.effective_status_at("2025-05-02T00:00:00.000Z"),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn lifetime_tier_has_no_expiry() {
        let state = SubscriptionState {
            status: SubscriptionStatus::Active,
            tier: SubscriptionTier::Lifetime,
            expiry_date: None,
        };
        assert!(state.is_active_at("2099-01-01T00:00:00.000Z"));
    }

    #[test]
    fn transitions_follow_the_entitlement_machine() {
        use SubscriptionStatus::*;
        assert!(subscription_can_transition(Trial, Active));
        assert!(subscription_can_transition(Active, Expired));
        assert!(subscription_can_transition(Active, Cancelled));
        assert!(subscription_can_transition(Trial, Expired));
        assert!(!subscription_can_transition(Cancelled, Active));
        assert!(!subscription_can_transition(Expired, Active));
        assert!(!subscription_can_transition(Trial, Cancelled));
    }

    #[test]
    fn critical_set_matches_expected_events() {
        assert!(is_critical_event(event_names::SIGNUP));
        assert!(is_critical_event(event_names::APP_CRASH));
        assert!(!is_critical_event(event_names::CRAVING_LOGGED));
    }
}
