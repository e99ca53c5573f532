//! Bounded in-memory log of recent failures.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AutofillError, ErrorKind};

pub const DEFAULT_REPORT_CAPACITY: usize = 100;
const RECENT_SUMMARY_LEN: usize = 10;

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub reported_at: DateTime<Utc>,
}

/// Aggregate view over the retained reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_kind: BTreeMap<ErrorKind, usize>,
    /// Newest last.
    pub recent: Vec<ErrorReport>,
}

/// Keeps the last `capacity` failures, dropping the oldest first.
#[derive(Debug)]
pub struct ErrorReporter {
    capacity: usize,
    reports: Mutex<VecDeque<ErrorReport>>,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REPORT_CAPACITY)
    }
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            reports: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn report(&self, error: &AutofillError) {
        self.report_with_context(error, BTreeMap::new());
    }

    pub fn report_with_context(&self, error: &AutofillError, context: BTreeMap<String, String>) {
        let entry = ErrorReport {
            kind: error.kind(),
            message: error.to_string(),
            context,
            reported_at: Utc::now(),
        };
        tracing::debug!(category = "error", kind = %entry.kind, "error reported");

        let mut reports = self.reports.lock().unwrap_or_else(|p| p.into_inner());
        if reports.len() == self.capacity {
            reports.pop_front();
        }
        reports.push_back(entry);
    }

    pub fn stats(&self) -> ErrorStats {
        let reports = self.reports.lock().unwrap_or_else(|p| p.into_inner());
        let mut by_kind = BTreeMap::new();
        for report in reports.iter() {
            *by_kind.entry(report.kind).or_insert(0) += 1;
        }
        let skip = reports.len().saturating_sub(RECENT_SUMMARY_LEN);
        ErrorStats {
            total_errors: reports.len(),
            by_kind,
            recent: reports.iter().skip(skip).cloned().collect(),
        }
    }

    pub fn clear(&self) {
        self.reports
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oldest_reports_are_evicted_at_capacity() {
        let reporter = ErrorReporter::with_capacity(3);
        for i in 0..5 {
            reporter.report(&AutofillError::database(format!("failure {i}")));
        }

        let stats = reporter.stats();
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.recent[0].message, "database error: failure 2");
        assert_eq!(stats.recent[2].message, "database error: failure 4");
    }

    #[test]
    fn stats_count_by_kind_and_keep_last_ten() {
        let reporter = ErrorReporter::new();
        for _ in 0..12 {
            reporter.report(&AutofillError::ServiceNotReady);
        }
        let mut ctx = BTreeMap::new();
        ctx.insert("package".to_string(), "com.example".to_string());
        reporter.report_with_context(&AutofillError::invalid_request("no fields"), ctx);

        let stats = reporter.stats();
        assert_eq!(stats.total_errors, 13);
        assert_eq!(stats.by_kind[&ErrorKind::ServiceNotReady], 12);
        assert_eq!(stats.by_kind[&ErrorKind::InvalidRequest], 1);
        assert_eq!(stats.recent.len(), 10);
        let last = stats.recent.last().unwrap();
        assert_eq!(last.kind, ErrorKind::InvalidRequest);
        assert_eq!(last.context["package"], "com.example");
    }

    #[test]
    fn clear_empties_the_log() {
        let reporter = ErrorReporter::new();
        reporter.report(&AutofillError::ServiceNotReady);
        reporter.clear();
        assert_eq!(reporter.stats(), ErrorStats::default());
    }
}
