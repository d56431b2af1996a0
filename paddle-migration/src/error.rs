//! Error types for the Stripe to Paddle migration.
//!
//! This module defines all error types that can occur while extracting
//! subscriptions from Stripe or remapping identifiers in the exported CSV.
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Transient Errors** ([`MigrationError::RateLimited`]): retried with backoff
//! - **Exhaustion** ([`MigrationError::RetriesExhausted`]): bounded retry gave up
//! - **Upstream Errors** ([`MigrationError::HttpError`], [`MigrationError::ApiError`],
//!   [`MigrationError::InvalidResponse`]): Stripe could not answer the request
//! - **Local Errors** ([`MigrationError::ConfigError`], [`MigrationError::InvalidInput`],
//!   [`MigrationError::CsvError`], [`MigrationError::IoError`]): configuration or file problems
//!
//! # Examples
//!
//! ```
//! use paddle_migration::error::{MigrationError, Result};
//!
//! fn require_column(headers: &[&str], name: &str) -> Result<usize> {
//!     headers
//!         .iter()
//!         .position(|h| *h == name)
//!         .ok_or_else(|| MigrationError::InvalidInput(format!("missing column '{name}'")))
//! }
//!
//! assert!(require_column(&["discount_id"], "discount_id").is_ok());
//! assert!(require_column(&["price_id_1"], "discount_id").is_err());
//! ```

use thiserror::Error;

/// Result type alias for migration operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Errors that can occur during the migration.
///
/// # Error Recovery
///
/// - **Rate limits** ([`RateLimited`](Self::RateLimited)): retried automatically, see
///   [`crate::reliability::retry_with_backoff`]
/// - **Exhausted retries** ([`RetriesExhausted`](Self::RetriesExhausted)): rerun later or
///   raise `retry.max_attempts`
/// - **API errors** ([`ApiError`](Self::ApiError)): check the API key and account permissions
/// - **File errors** ([`IoError`](Self::IoError), [`CsvError`](Self::CsvError)): check paths
///   and that the file was produced by the extractor
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum MigrationError {
    /// HTTP request failed before a response was received.
    ///
    /// Wraps [`reqwest::Error`]: timeouts, refused connections, DNS or TLS failures.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Stripe answered with a non-success status other than 429.
    ///
    /// `message` is taken from the `error.message` field of Stripe's error body
    /// when present, otherwise the raw body.
    #[error("Stripe API returned status {status}: {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the API.
        message: String,
    },

    /// Stripe answered with HTTP 429.
    ///
    /// This is the only retryable error, see [`crate::reliability::is_retryable`].
    #[error("Stripe rate limit exceeded")]
    RateLimited,

    /// A retryable operation kept failing until the retry policy gave up.
    #[error("rate limit persisted after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Response body could not be decoded.
    #[error("Invalid Stripe response: {0}")]
    InvalidResponse(String),

    /// Configuration is invalid or incomplete.
    ///
    /// # Examples
    ///
    /// ```
    /// use paddle_migration::error::MigrationError;
    ///
    /// let err = MigrationError::ConfigError("page_size must be between 1 and 100".to_owned());
    /// assert!(err.to_string().starts_with("Invalid configuration"));
    /// ```
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Input file does not have the expected shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// File system operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MigrationError {
    /// Returns `true` for errors that should end an extraction run.
    ///
    /// Auxiliary customer lookups swallow every other error and leave the
    /// corresponding cell empty.
    #[must_use]
    pub fn is_fatal_for_lookup(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}
