//! Exponential backoff retry for rate-limited Stripe calls.
//!
//! Stripe answers bursts of requests with HTTP 429. Every call made by the
//! extractor goes through [`retry_with_backoff`], which sleeps and retries
//! only those responses and gives up after a bounded number of attempts.

use std::time::Duration;

use crate::error::{MigrationError, Result};

/// Configuration for retry behavior.
///
/// The delay between retries grows exponentially up to `max_delay`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use paddle_migration::reliability::RetryPolicy;
///
/// // Default policy: 8 attempts, 2s initial delay, 30s max delay
/// let policy = RetryPolicy::default();
///
/// // Custom policy for a tight test loop
/// let fast = RetryPolicy {
///     max_attempts: 3,
///     initial_delay: Duration::from_millis(1),
///     max_delay: Duration::from_millis(5),
///     backoff_multiplier: 2.0,
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one (default: 8)
    pub max_attempts: u32,
    /// Delay before the first retry (default: 2s)
    pub initial_delay: Duration,
    /// Upper bound for any single delay (default: 30s)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (default: 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Calculates delay for a specific attempt.
    ///
    /// Uses exponential backoff: delay = `initial_delay` * (multiplier ^ attempt),
    /// capped at `max_delay`.
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, reason = "acceptable for duration calculations")]
        let (delay_ms, max_ms) = (
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent),
            self.max_delay.as_millis() as f64,
        );
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "delay_ms is below max_delay and non-negative when converted"
        )]
        let delay = if delay_ms.is_finite() && delay_ms < max_ms {
            Duration::from_millis(delay_ms as u64)
        } else {
            self.max_delay
        };
        delay.min(self.max_delay)
    }
}

/// Executes an operation, retrying rate-limited attempts with exponential backoff.
///
/// Errors for which [`is_retryable`] is `false` are returned immediately.
/// When every one of `max_attempts` attempts was rate limited the call fails
/// with [`MigrationError::RetriesExhausted`].
///
/// # Examples
///
/// ```
/// use std::{cell::Cell, time::Duration};
///
/// use paddle_migration::{
///     MigrationError,
///     reliability::{RetryPolicy, retry_with_backoff},
/// };
///
/// # async fn example() -> paddle_migration::Result<()> {
/// let policy = RetryPolicy { initial_delay: Duration::from_millis(1), ..RetryPolicy::default() };
/// let calls = Cell::new(0);
///
/// let value = retry_with_backoff(&policy, || {
///     calls.set(calls.get() + 1);
///     let n = calls.get();
///     async move { if n < 3 { Err(MigrationError::RateLimited) } else { Ok("done") } }
/// })
/// .await?;
///
/// assert_eq!(value, "done");
/// assert_eq!(calls.get(), 3);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the first non-retryable error, or [`MigrationError::RetriesExhausted`]
/// once the policy runs out of attempts.
pub async fn retry_with_backoff<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);

    for attempt in 0..attempts {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if is_retryable(&error) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %error,
                    "Rate limited, will retry"
                );

                // Don't sleep after the last attempt
                if attempt + 1 < attempts {
                    let delay = policy.delay_for_attempt(attempt);
                    tracing::debug!(delay_ms = delay.as_millis(), "Sleeping before retry");
                    tokio::time::sleep(delay).await;
                }
            }
            Err(error) => return Err(error),
        }
    }

    tracing::error!(attempts, "Giving up after repeated rate limiting");
    Err(MigrationError::RetriesExhausted { attempts })
}

/// Determines if an error is retryable.
///
/// Only [`MigrationError::RateLimited`] is retried. Every other upstream
/// error is treated as missing data or a hard failure by the caller.
///
/// # Examples
///
/// ```
/// use paddle_migration::{MigrationError, reliability::is_retryable};
///
/// assert!(is_retryable(&MigrationError::RateLimited));
/// assert!(!is_retryable(&MigrationError::ApiError { status: 404, message: "gone".into() }));
/// ```
#[must_use]
pub fn is_retryable(error: &MigrationError) -> bool {
    matches!(error, MigrationError::RateLimited)
}
