//! In-process metrics for the autofill service.
//!
//! [`MetricsCollector`] is shared behind an `Arc` and counts requests,
//! outcomes and match kinds, and keeps bounded latency series. A
//! [`MetricsSnapshot`] derives success rate, percentiles and top sources.
//! [`Stopwatch`] times individual stages.
//!
//! ```
//! use std::time::Duration;
//! use telemetry::MetricsCollector;
//!
//! let metrics = MetricsCollector::new();
//! metrics.record_request("com.android.chrome", Some("github.com"));
//! metrics.record_success(Duration::from_millis(42), Duration::from_millis(3), Duration::ZERO);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.success_rate(), 100.0);
//! assert_eq!(snapshot.response_stats().p95, Duration::from_millis(42));
//! ```

mod collector;
mod snapshot;
mod stopwatch;

pub use collector::{MetricsCollector, DEFAULT_SERIES_CAPACITY};
pub use snapshot::{percentile, MetricsSnapshot, SeriesStats, REPORT_TOP_N};
pub use stopwatch::Stopwatch;
