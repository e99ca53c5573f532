use std::time::Duration;

use tokio::time::Instant;

/// Measures one operation, excluding any intervals spent paused.
///
/// Reads the tokio clock, so paused-time tests can drive it with
/// `tokio::time::advance`.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    operation: &'static str,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl Stopwatch {
    pub fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// No-op when already paused.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    /// No-op when running.
    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }

    /// Running time so far.
    pub fn elapsed(&self) -> Duration {
        let now = Instant::now();
        let paused = match self.paused_at {
            Some(at) => self.paused_total + now.saturating_duration_since(at),
            None => self.paused_total,
        };
        now.saturating_duration_since(self.started)
            .saturating_sub(paused)
    }

    pub fn finish(mut self) -> Duration {
        self.resume();
        let elapsed = self.elapsed();
        tracing::debug!(
            category = "performance",
            operation = self.operation,
            duration_ms = elapsed.as_millis() as u64,
            paused_ms = self.paused_total.as_millis() as u64,
            "operation finished"
        );
        elapsed
    }
}
