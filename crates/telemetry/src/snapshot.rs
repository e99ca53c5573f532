//! Point-in-time copy of the collector state and the statistics derived
//! from it.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use resilience::ErrorKind;
use serde::{Serialize, Serializer};

/// Apps and domains listed in [`MetricsSnapshot::report`].
pub const REPORT_TOP_N: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_fills: u64,
    pub failed_fills: u64,
    pub cancelled_requests: u64,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,

    pub exact_matches: u64,
    pub fuzzy_matches: u64,
    pub no_matches: u64,

    #[serde(serialize_with = "millis_series")]
    pub response_times: Vec<Duration>,
    #[serde(serialize_with = "millis_series")]
    pub matching_times: Vec<Duration>,
    #[serde(serialize_with = "millis_series")]
    pub filling_times: Vec<Duration>,

    pub source_apps: BTreeMap<String, u64>,
    pub source_domains: BTreeMap<String, u64>,
}

/// Summary statistics over one duration series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    #[serde(with = "resilience::serde_millis")]
    pub mean: Duration,
    #[serde(with = "resilience::serde_millis")]
    pub min: Duration,
    #[serde(with = "resilience::serde_millis")]
    pub max: Duration,
    #[serde(with = "resilience::serde_millis")]
    pub p95: Duration,
    #[serde(with = "resilience::serde_millis")]
    pub p99: Duration,
}

impl SeriesStats {
    /// All fields are zero for an empty series.
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let total: u128 = sorted.iter().map(Duration::as_nanos).sum();
        let mean_nanos = total / sorted.len() as u128;

        Self {
            count: sorted.len(),
            mean: Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX)),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p95: percentile_sorted(&sorted, 0.95),
            p99: percentile_sorted(&sorted, 0.99),
        }
    }
}

/// The `p` percentile of `samples` (`0.0..=1.0`), taking the element at
/// `floor(n * p)` of the sorted series. Zero for an empty series.
pub fn percentile(samples: &[Duration], p: f64) -> Duration {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let index = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[index]
}

fn top_n(counts: &BTreeMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    // BTreeMap order breaks ties by name.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

impl MetricsSnapshot {
    /// Successful fills as a percentage of all requests.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_fills as f64 / self.total_requests as f64 * 100.0
    }

    pub fn response_stats(&self) -> SeriesStats {
        SeriesStats::from_samples(&self.response_times)
    }

    pub fn matching_stats(&self) -> SeriesStats {
        SeriesStats::from_samples(&self.matching_times)
    }

    pub fn filling_stats(&self) -> SeriesStats {
        SeriesStats::from_samples(&self.filling_times)
    }

    pub fn top_apps(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.source_apps, n)
    }

    pub fn top_domains(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.source_domains, n)
    }

    /// Multi-line human readable summary.
    pub fn report(&self) -> String {
        let response = self.response_stats();
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "=== Autofill statistics ===");
        let _ = writeln!(out, "Total requests: {}", self.total_requests);
        let _ = writeln!(out, "Success rate: {:.2}%", self.success_rate());
        let _ = writeln!(
            out,
            "Succeeded: {} | Failed: {} | Cancelled: {}",
            self.successful_fills, self.failed_fills, self.cancelled_requests
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Performance:");
        let _ = writeln!(out, "  Mean response: {} ms", response.mean.as_millis());
        let _ = writeln!(out, "  P95 response: {} ms", response.p95.as_millis());
        let _ = writeln!(out, "  P99 response: {} ms", response.p99.as_millis());
        let _ = writeln!(out, "  Max response: {} ms", response.max.as_millis());
        let _ = writeln!(out, "  Min response: {} ms", response.min.as_millis());
        let _ = writeln!(out);

        let _ = writeln!(out, "Matching:");
        let _ = writeln!(out, "  Exact: {}", self.exact_matches);
        let _ = writeln!(out, "  Fuzzy: {}", self.fuzzy_matches);
        let _ = writeln!(out, "  None: {}", self.no_matches);

        let sections = [
            ("apps", self.top_apps(REPORT_TOP_N)),
            ("domains", self.top_domains(REPORT_TOP_N)),
        ];
        for (name, ranked) in sections {
            if ranked.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "Top {REPORT_TOP_N} {name}:");
            for (key, count) in ranked {
                let _ = writeln!(out, "  {key}: {count}");
            }
        }

        if !self.failures_by_kind.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Failures:");
            for (kind, count) in &self.failures_by_kind {
                let _ = writeln!(out, "  {kind}: {count}");
            }
        }

        out
    }
}

fn millis_series<S>(series: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(
        series
            .iter()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[test]
    fn percentile_uses_floor_index() {
        let samples = ms(&(1..=100).collect::<Vec<_>>());
        assert_eq!(percentile(&samples, 0.95), Duration::from_millis(96));
        assert_eq!(percentile(&samples, 0.99), Duration::from_millis(100));
        assert_eq!(percentile(&samples, 1.0), Duration::from_millis(100));

        let small = ms(&[30, 10, 20]);
        assert_eq!(percentile(&small, 0.95), Duration::from_millis(30));
        assert_eq!(percentile(&small, 0.5), Duration::from_millis(20));
    }

    #[test]
    fn empty_series_yields_zeros() {
        assert_eq!(percentile(&[], 0.95), Duration::ZERO);
        assert_eq!(SeriesStats::from_samples(&[]), SeriesStats::default());
        assert_eq!(MetricsSnapshot::default().success_rate(), 0.0);
    }

    #[test]
    fn series_stats_summarise_samples() {
        let stats = SeriesStats::from_samples(&ms(&[100, 300, 200]));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, Duration::from_millis(200));
        assert_eq!(stats.min, Duration::from_millis(100));
        assert_eq!(stats.max, Duration::from_millis(300));
        assert_eq!(stats.p95, Duration::from_millis(300));
    }

    #[test]
    fn success_rate_is_a_percentage_of_requests() {
        let snapshot = MetricsSnapshot {
            total_requests: 8,
            successful_fills: 6,
            ..MetricsSnapshot::default()
        };
        assert_eq!(snapshot.success_rate(), 75.0);
    }

    #[test]
    fn top_n_orders_by_count_then_name() {
        let snapshot = MetricsSnapshot {
            source_apps: [("b.app", 2), ("a.app", 2), ("c.app", 5), ("d.app", 1)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            ..MetricsSnapshot::default()
        };
        assert_eq!(
            snapshot.top_apps(3),
            vec![
                ("c.app".to_string(), 5),
                ("a.app".to_string(), 2),
                ("b.app".to_string(), 2),
            ]
        );
        assert!(snapshot.top_domains(5).is_empty());
    }

    #[test]
    fn report_lists_sections() {
        let mut snapshot = MetricsSnapshot {
            total_requests: 2,
            successful_fills: 1,
            failed_fills: 1,
            response_times: ms(&[40]),
            ..MetricsSnapshot::default()
        };
        snapshot.source_domains.insert("github.com".into(), 2);
        snapshot.failures_by_kind.insert(ErrorKind::RequestTimeout, 1);

        let report = snapshot.report();
        assert!(report.contains("Success rate: 50.00%"));
        assert!(report.contains("Mean response: 40 ms"));
        assert!(report.contains("Top 5 domains:\n  github.com: 2"));
        assert!(!report.contains("Top 5 apps"));
        assert!(report.contains("request_timeout: 1"));
    }

    #[test]
    fn series_serialize_as_milliseconds() {
        let snapshot = MetricsSnapshot {
            response_times: ms(&[12, 7]),
            ..MetricsSnapshot::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["response_times"], serde_json::json!([12, 7]));
    }
}
