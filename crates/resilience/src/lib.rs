//! Error taxonomy and resilience wrappers for the autofill core.
//!
//! [`AutofillError`] is the one error type every layer reports in. The
//! wrappers in [`recovery`] decorate any fallible async unit of work:
//!
//! - [`with_recovery`] retries with a linear delay, then runs an optional
//!   fallback
//! - [`with_timeout`] turns a deadline breach into
//!   [`AutofillError::RequestTimeout`]
//! - [`safely`] / [`safely_or_else`] swallow failures
//!
//! ```
//! use std::time::Duration;
//! use resilience::{with_timeout, AutofillError};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let entries = with_timeout(Duration::from_millis(500), async {
//!     Ok::<_, AutofillError>(vec!["github.com"])
//! })
//! .await
//! .unwrap();
//! assert_eq!(entries.len(), 1);
//! # });
//! ```

pub mod error;
pub mod recovery;
pub mod reporter;
pub mod serde_millis;

pub use error::{AutofillError, ErrorKind};
pub use recovery::{
    safely, safely_or_else, with_recovery, with_timeout, BeforeRetryHook, FallbackFn,
    RetryConfig, RetryPolicy, RetryResult,
};
pub use reporter::{ErrorReport, ErrorReporter, ErrorStats, DEFAULT_REPORT_CAPACITY};
