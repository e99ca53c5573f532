use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use resilience::ErrorKind;

use crate::snapshot::MetricsSnapshot;

/// Samples kept per duration series before the oldest are evicted.
pub const DEFAULT_SERIES_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct State {
    total_requests: u64,
    successful_fills: u64,
    failed_fills: u64,
    cancelled_requests: u64,
    failures_by_kind: BTreeMap<ErrorKind, u64>,
    exact_matches: u64,
    fuzzy_matches: u64,
    no_matches: u64,
    response_times: VecDeque<Duration>,
    matching_times: VecDeque<Duration>,
    filling_times: VecDeque<Duration>,
    source_apps: BTreeMap<String, u64>,
    source_domains: BTreeMap<String, u64>,
}

fn push_bounded(series: &mut VecDeque<Duration>, sample: Duration, capacity: usize) {
    series.push_back(sample);
    while series.len() > capacity {
        series.pop_front();
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Shared request and latency counters for the autofill service.
///
/// One mutex guards all state. Statistics are computed on a
/// [`snapshot`](Self::snapshot), outside the lock. Every recording is also
/// forwarded to the `metrics` facade, which is a no-op unless the process
/// installs a recorder.
#[derive(Debug)]
pub struct MetricsCollector {
    series_capacity: usize,
    state: Mutex<State>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_series_capacity(DEFAULT_SERIES_CAPACITY)
    }

    /// `capacity` is clamped to at least one sample.
    pub fn with_series_capacity(capacity: usize) -> Self {
        Self {
            series_capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    pub fn series_capacity(&self) -> usize {
        self.series_capacity
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_request(&self, app_id: &str, domain: Option<&str>) {
        let total = {
            let mut state = self.lock();
            state.total_requests += 1;
            *state.source_apps.entry(app_id.to_owned()).or_default() += 1;
            if let Some(domain) = domain {
                *state.source_domains.entry(domain.to_owned()).or_default() += 1;
            }
            state.total_requests
        };
        metrics::counter!("autofill_requests_total").increment(1);
        tracing::debug!(
            category = "performance",
            app_id,
            domain = domain.unwrap_or("N/A"),
            total_requests = total,
            "request recorded"
        );
    }

    /// Zero `matching` or `filling` durations mean "not measured" and are
    /// not stored.
    pub fn record_success(&self, response: Duration, matching: Duration, filling: Duration) {
        let cap = self.series_capacity;
        let (succeeded, total) = {
            let mut state = self.lock();
            state.successful_fills += 1;
            push_bounded(&mut state.response_times, response, cap);
            if !matching.is_zero() {
                push_bounded(&mut state.matching_times, matching, cap);
            }
            if !filling.is_zero() {
                push_bounded(&mut state.filling_times, filling, cap);
            }
            (state.successful_fills, state.total_requests)
        };

        metrics::counter!("autofill_fills_total", "outcome" => "success").increment(1);
        metrics::histogram!("autofill_response_ms").record(as_ms(response));
        if !matching.is_zero() {
            metrics::histogram!("autofill_matching_ms").record(as_ms(matching));
        }
        if !filling.is_zero() {
            metrics::histogram!("autofill_filling_ms").record(as_ms(filling));
        }

        tracing::info!(
            category = "performance",
            response_ms = response.as_millis() as u64,
            successful_fills = succeeded,
            total_requests = total,
            "fill succeeded"
        );
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        let failed = {
            let mut state = self.lock();
            state.failed_fills += 1;
            *state.failures_by_kind.entry(kind).or_default() += 1;
            state.failed_fills
        };
        metrics::counter!("autofill_fills_total", "outcome" => "failure").increment(1);
        metrics::counter!("autofill_failures_total", "kind" => kind.as_str()).increment(1);
        tracing::warn!(
            category = "performance",
            kind = %kind,
            failed_fills = failed,
            "fill failed"
        );
    }

    pub fn record_cancellation(&self) {
        let cancelled = {
            let mut state = self.lock();
            state.cancelled_requests += 1;
            state.cancelled_requests
        };
        metrics::counter!("autofill_fills_total", "outcome" => "cancelled").increment(1);
        tracing::info!(category = "performance", cancelled, "fill cancelled by user");
    }

    pub fn record_exact_match(&self) {
        self.lock().exact_matches += 1;
        metrics::counter!("autofill_matches_total", "kind" => "exact").increment(1);
    }

    pub fn record_fuzzy_match(&self) {
        self.lock().fuzzy_matches += 1;
        metrics::counter!("autofill_matches_total", "kind" => "fuzzy").increment(1);
    }

    pub fn record_no_match(&self) {
        let misses = {
            let mut state = self.lock();
            state.no_matches += 1;
            state.no_matches
        };
        metrics::counter!("autofill_matches_total", "kind" => "none").increment(1);
        tracing::debug!(category = "matching", no_matches = misses, "no credential matched");
    }

    /// Deep copy of the current state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.lock();
        MetricsSnapshot {
            total_requests: state.total_requests,
            successful_fills: state.successful_fills,
            failed_fills: state.failed_fills,
            cancelled_requests: state.cancelled_requests,
            failures_by_kind: state.failures_by_kind.clone(),
            exact_matches: state.exact_matches,
            fuzzy_matches: state.fuzzy_matches,
            no_matches: state.no_matches,
            response_times: state.response_times.iter().copied().collect(),
            matching_times: state.matching_times.iter().copied().collect(),
            filling_times: state.filling_times.iter().copied().collect(),
            source_apps: state.source_apps.clone(),
            source_domains: state.source_domains.clone(),
        }
    }

    pub fn reset(&self) {
        *self.lock() = State::default();
        tracing::info!(category = "performance", "metrics reset");
    }

    pub fn formatted_stats(&self) -> String {
        self.snapshot().report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn counts_requests_and_sources() {
        let metrics = MetricsCollector::new();
        metrics.record_request("com.android.chrome", Some("github.com"));
        metrics.record_request("com.android.chrome", None);
        metrics.record_request("com.example.app", Some("example.com"));

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.source_apps["com.android.chrome"], 2);
        assert_eq!(snap.source_domains.len(), 2);
    }

    #[test]
    fn zero_stage_durations_are_not_stored() {
        let metrics = MetricsCollector::new();
        metrics.record_success(ms(40), Duration::ZERO, ms(5));

        let snap = metrics.snapshot();
        assert_eq!(snap.response_times, vec![ms(40)]);
        assert!(snap.matching_times.is_empty());
        assert_eq!(snap.filling_times, vec![ms(5)]);
    }

    #[test]
    fn series_evicts_oldest_beyond_capacity() {
        let metrics = MetricsCollector::new();
        for i in 0..1005 {
            metrics.record_success(ms(i), ms(i), ms(i));
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.response_times.len(), DEFAULT_SERIES_CAPACITY);
        assert_eq!(snap.response_times.first(), Some(&ms(5)));
        assert_eq!(snap.response_times.last(), Some(&ms(1004)));
        assert_eq!(snap.matching_times.len(), DEFAULT_SERIES_CAPACITY);
        assert_eq!(snap.successful_fills, 1005);
    }

    #[test]
    fn failures_are_counted_by_kind() {
        let metrics = MetricsCollector::new();
        metrics.record_failure(ErrorKind::RequestTimeout);
        metrics.record_failure(ErrorKind::RequestTimeout);
        metrics.record_failure(ErrorKind::DatabaseError);
        metrics.record_cancellation();

        let snap = metrics.snapshot();
        assert_eq!(snap.failed_fills, 3);
        assert_eq!(snap.failures_by_kind[&ErrorKind::RequestTimeout], 2);
        assert_eq!(snap.cancelled_requests, 1);
    }

    #[test]
    fn match_outcomes_and_success_rate() {
        let metrics = MetricsCollector::new();
        for _ in 0..4 {
            metrics.record_request("app", None);
        }
        metrics.record_exact_match();
        metrics.record_exact_match();
        metrics.record_fuzzy_match();
        metrics.record_no_match();
        metrics.record_success(ms(10), ms(2), ms(3));
        metrics.record_success(ms(30), ms(2), ms(3));
        metrics.record_success(ms(20), ms(2), ms(3));

        let snap = metrics.snapshot();
        assert_eq!((snap.exact_matches, snap.fuzzy_matches, snap.no_matches), (2, 1, 1));
        assert_eq!(snap.success_rate(), 75.0);
        assert_eq!(snap.response_stats().mean, ms(20));
        assert!(metrics.formatted_stats().contains("Success rate: 75.00%"));
    }

    #[test]
    fn reset_clears_everything() {
        let metrics = MetricsCollector::with_series_capacity(0);
        assert_eq!(metrics.series_capacity(), 1);
        metrics.record_request("app", Some("example.com"));
        metrics.record_success(ms(1), ms(1), ms(1));
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn concurrent_recording_loses_nothing() {
        let metrics = Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for i in 0..250 {
                        metrics.record_request("app", Some("example.com"));
                        metrics.record_success(ms(t * 250 + i), ms(1), ms(1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 2000);
        assert_eq!(snap.successful_fills, 2000);
        assert_eq!(snap.response_times.len(), DEFAULT_SERIES_CAPACITY);
        assert_eq!(snap.source_domains["example.com"], 2000);
    }
}
