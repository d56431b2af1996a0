//! Reliability patterns for Stripe API calls.
//!
//! Provides bounded exponential backoff for rate-limited requests.

mod retry;

pub use retry::{RetryPolicy, is_retryable, retry_with_backoff};
