//! Retry, fallback, timeout and safe-execution wrappers.
//!
//! These are decorators for the caller: the matcher and the response builder
//! never retry on their own. Every suspension point (the wrapped future, the
//! inter-retry sleep, the deadline) is a tokio future, so dropping the
//! returned future abandons whatever retries were still pending.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::AutofillError;

/// Hook invoked before each retry with the zero-based index of the attempt
/// that just failed.
pub type BeforeRetryHook = Arc<dyn Fn(u32, &AutofillError) + Send + Sync>;

/// Degraded path run once the retry loop gives up.
pub type FallbackFn<T> =
    Arc<dyn Fn(AutofillError) -> BoxFuture<'static, Result<T, AutofillError>> + Send + Sync>;

/// Serializable retry settings, as found in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts after the first one.
    #[serde(default)]
    pub retry_count: u32,
    /// Delay unit; the wait before attempt `k` is `base_delay * (k - 1)`.
    #[serde(
        rename = "base_delay_ms",
        with = "crate::serde_millis",
        default = "RetryConfig::default_base_delay"
    )]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_count: 0,
            base_delay: Self::default_base_delay(),
        }
    }
}

impl RetryConfig {
    fn default_base_delay() -> Duration {
        Duration::from_millis(100)
    }

    pub fn with_retry_count(mut self, retries: u32) -> Self {
        self.retry_count = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }
}

/// Per-call retry policy.
pub struct RetryPolicy<T> {
    pub retry_count: u32,
    pub base_delay: Duration,
    before_retry: Option<BeforeRetryHook>,
    fallback: Option<FallbackFn<T>>,
}

impl<T> RetryPolicy<T> {
    pub fn new(retry_count: u32, base_delay: Duration) -> Self {
        Self {
            retry_count,
            base_delay,
            before_retry: None,
            fallback: None,
        }
    }

    /// Single attempt, no hooks.
    pub fn no_retry() -> Self {
        Self::from_config(&RetryConfig::default())
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.retry_count, config.base_delay)
    }

    pub fn with_before_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(u32, &AutofillError) + Send + Sync + 'static,
    {
        self.before_retry = Some(Arc::new(hook));
        self
    }

    pub fn with_fallback<F, Fut>(mut self, fallback: F) -> Self
    where
        F: Fn(AutofillError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AutofillError>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |err| Box::pin(fallback(err))));
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Wait after the failed attempt with zero-based index `failed_attempt`.
    ///
    /// Linear in the attempt index, not exponential.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(failed_attempt.saturating_add(1))
    }

    fn total_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

impl<T> Clone for RetryPolicy<T> {
    fn clone(&self) -> Self {
        Self {
            retry_count: self.retry_count,
            base_delay: self.base_delay,
            before_retry: self.before_retry.clone(),
            fallback: self.fallback.clone(),
        }
    }
}

impl<T> fmt::Debug for RetryPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retry_count", &self.retry_count)
            .field("base_delay", &self.base_delay)
            .field("before_retry", &self.before_retry.is_some())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<T> Default for RetryPolicy<T> {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Outcome of [`with_recovery`].
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// Final value, or the last error (or the fallback's error).
    pub result: Result<T, AutofillError>,
    /// Number of times the operation itself was invoked.
    pub attempts: u32,
    /// Wall time across all attempts, delays and the fallback.
    pub total_duration: Duration,
    /// Whether `result` is `Ok`.
    pub succeeded: bool,
    /// Whether the fallback ran.
    pub used_fallback: bool,
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        self.succeeded
    }

    pub fn into_result(self) -> Result<T, AutofillError> {
        self.result
    }
}

/// Run `operation` under `policy`.
///
/// The closure receives the zero-based attempt index. A non-retryable error
/// ends the loop at once, even with budget left. Once the loop ends without
/// success the fallback (if any) gets the last error; the fallback is never
/// retried.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use resilience::{with_recovery, AutofillError, RetryPolicy};
///
/// # tokio_test_block_on(async {
/// let policy = RetryPolicy::new(2, Duration::from_millis(1));
/// let outcome = with_recovery(&policy, |attempt| async move {
///     if attempt == 0 {
///         Err(AutofillError::database("locked"))
///     } else {
///         Ok("entries")
///     }
/// })
/// .await;
/// assert_eq!(outcome.attempts, 2);
/// assert_eq!(outcome.into_result().unwrap(), "entries");
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
/// # }
/// ```
pub async fn with_recovery<T, F, Fut>(policy: &RetryPolicy<T>, mut operation: F) -> RetryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AutofillError>>,
{
    let start = Instant::now();
    let total_attempts = policy.total_attempts();
    let mut attempt: u32 = 0;

    let last_error = loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(
                        category = "error",
                        attempt = attempt + 1,
                        total_attempts,
                        "operation succeeded after retry"
                    );
                }
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                    succeeded: true,
                    used_fallback: false,
                };
            }
            Err(error) => {
                tracing::warn!(
                    category = "error",
                    attempt = attempt + 1,
                    total_attempts,
                    error = %error,
                    kind = %error.kind(),
                    "operation failed"
                );

                if !error.is_retryable() {
                    tracing::debug!(kind = %error.kind(), "error kind is not retryable, giving up");
                    break error;
                }
                if attempt >= policy.retry_count {
                    break error;
                }

                if let Some(hook) = &policy.before_retry {
                    hook(attempt, &error);
                }
                let delay = policy.delay_after(attempt);
                tracing::debug!(
                    next_attempt = attempt + 2,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    };
    let attempts = attempt + 1;

    match &policy.fallback {
        Some(fallback) => {
            tracing::info!(
                category = "error",
                original_error = %last_error,
                "running fallback"
            );
            match fallback(last_error).await {
                Ok(value) => RetryResult {
                    result: Ok(value),
                    attempts,
                    total_duration: start.elapsed(),
                    succeeded: true,
                    used_fallback: true,
                },
                Err(fallback_error) => {
                    tracing::error!(
                        category = "error",
                        error = %fallback_error,
                        "fallback failed as well"
                    );
                    RetryResult {
                        result: Err(fallback_error),
                        attempts,
                        total_duration: start.elapsed(),
                        succeeded: false,
                        used_fallback: true,
                    }
                }
            }
        }
        None => {
            tracing::error!(
                category = "error",
                error = %last_error,
                attempts,
                "operation failed, no fallback configured"
            );
            RetryResult {
                result: Err(last_error),
                attempts,
                total_duration: start.elapsed(),
                succeeded: false,
                used_fallback: false,
            }
        }
    }
}

/// Run `operation` under a deadline.
///
/// A breach becomes [`AutofillError::RequestTimeout`]; any other failure is
/// returned unchanged.
pub async fn with_timeout<T, Fut>(duration: Duration, operation: Fut) -> Result<T, AutofillError>
where
    Fut: Future<Output = Result<T, AutofillError>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => {
            tracing::debug!(category = "error", error = %error, "operation failed");
            Err(error)
        }
        Err(_elapsed) => {
            tracing::error!(
                category = "error",
                timeout_ms = duration.as_millis() as u64,
                "operation timed out"
            );
            Err(AutofillError::RequestTimeout { duration })
        }
    }
}

/// Run `operation`, swallowing any failure.
pub async fn safely<T, Fut>(operation: Fut) -> Option<T>
where
    Fut: Future<Output = Result<T, AutofillError>>,
{
    safely_or_else(operation, |_| {}).await
}

/// Like [`safely`], handing the swallowed error to `on_error`.
pub async fn safely_or_else<T, Fut, E>(operation: Fut, on_error: E) -> Option<T>
where
    Fut: Future<Output = Result<T, AutofillError>>,
    E: FnOnce(AutofillError),
{
    match operation.await {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::error!(category = "error", error = %error, "safe execution failed");
            on_error(error);
            None
        }
    }
}
