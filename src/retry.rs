//! Retry logic with exponential backoff
//!
//! Remote fetches are the only operations wrapped here. The executor makes up to
//! `max_attempts` attempts and waits `initial_delay * backoff_multiplier^n` before retry
//! `n` (zero-based). No jitter is applied.
//!
//! # Example
//!
//! ```no_run
//! use sticker_dl::retry::{IsRetryable, execute_with_retry};
//! use sticker_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = execute_with_retry(&config, "fetch", || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, remote service hiccups, connection reset) should
/// return `true`. Local failures (disk, archive, conversion) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Every failure talking to the remote service is treated as transient
            Error::Network(_) | Error::Remote(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            // A name collision means the suffix space is broken, retrying cannot help
            Error::Workspace(_) => false,
            Error::Convert(_) | Error::Archive(_) => false,
            Error::Config { .. } => false,
            Error::Delivery(_) | Error::NothingConverted { .. } => false,
            Error::Cancelled | Error::ShuttingDown => false,
            Error::NotSupported(_) | Error::Other(_) => false,
        }
    }
}

/// Delay to wait after the failed attempt with zero-based index `attempt_index`
pub fn backoff_delay(config: &RetryConfig, attempt_index: u32) -> Duration {
    let factor = config
        .backoff_multiplier
        .powi(i32::try_from(attempt_index).unwrap_or(i32::MAX));
    Duration::try_from_secs_f64(config.initial_delay.as_secs_f64() * factor)
        .unwrap_or(Duration::MAX)
}

/// Execute an async operation with exponential backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (attempts, initial delay, multiplier)
/// * `operation_name` - Name used in log lines
/// * `operation` - Async closure that returns Result<T, E> where E implements IsRetryable
///
/// # Returns
///
/// Returns the first successful result, or the last error once `max_attempts` attempts
/// have failed. Non-retryable errors are returned after the attempt that produced them.
pub async fn execute_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display + std::fmt::Debug,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = backoff_delay(config, attempt);
                tracing::error!(
                    operation = operation_name,
                    error = %e,
                    detail = ?e,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        operation = operation_name,
                        error = %e,
                        detail = ?e,
                        attempt = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        operation = operation_name,
                        error = %e,
                        detail = ?e,
                        attempt = attempt + 1,
                        "operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}
