//! Migration configuration.
//!
//! This module defines TOML-deserializable configuration for the Stripe
//! source, the retry policy and the CSV file locations. Every section and
//! field has a default, so an empty file (or no file) is a valid configuration.
//!
//! # Examples
//!
//! ```toml
//! [source]
//! page_size = 50
//! timeout_secs = 60
//!
//! [retry]
//! max_attempts = 10
//! initial_delay_ms = 1000
//!
//! [files]
//! extract_output = "exports/paddle_migration_output.csv"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use url::Url;

use crate::{
    error::{MigrationError, Result},
    reliability::RetryPolicy,
};

/// Environment variable holding the Stripe secret key.
pub const API_KEY_ENV: &str = "STRIPE_API_KEY";

/// Default extractor output, also the remapper input.
pub const DEFAULT_EXTRACT_OUTPUT: &str = "paddle_migration_output.csv";

/// Default reference file with old and new price and discount IDs.
pub const DEFAULT_MAPPING_REFERENCE: &str = "prices-discounts-mapping-ref.csv";

/// Default remapper output.
pub const DEFAULT_REMAP_OUTPUT: &str = "paddle_migration_output_mapped.csv";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationConfig {
    /// Stripe API settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Rate-limit retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// CSV file locations.
    #[serde(default)]
    pub files: FilesConfig,
}

impl MigrationConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::ConfigError`] if the TOML is malformed or a
    /// value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use paddle_migration::config::MigrationConfig;
    ///
    /// let config = MigrationConfig::from_toml("[source]\npage_size = 25\n").unwrap();
    /// assert_eq!(config.source.page_size, 25);
    /// assert_eq!(config.retry.max_attempts, 8);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| MigrationError::ConfigError(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::ConfigError`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Stripe API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Subscriptions requested per page (Stripe allows 1-100).
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl SourceConfig {
    /// Validates the source settings.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `base_url` does not parse or does not use HTTPS
    /// - `page_size` is not 1-100
    /// - `timeout_secs` is not 1-300 or `connect_timeout_secs` is not 1-60
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            MigrationError::ConfigError(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        if url.scheme() != "https" {
            return Err(MigrationError::ConfigError(format!(
                "base_url must use HTTPS, got: {}",
                url.scheme()
            )));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(MigrationError::ConfigError(
                "page_size must be between 1 and 100".to_owned(),
            ));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(MigrationError::ConfigError(
                "timeout_secs must be between 1 and 300".to_owned(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 60 {
            return Err(MigrationError::ConfigError(
                "connect_timeout_secs must be between 1 and 60".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns connect timeout as Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Rate-limit retry settings, converted into a [`RetryPolicy`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Validates the retry settings.
    ///
    /// # Errors
    ///
    /// Returns error if `max_attempts` is 0, `max_delay_ms` is below
    /// `initial_delay_ms`, or `backoff_multiplier` is below 1.0.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(MigrationError::ConfigError("max_attempts must be at least 1".to_owned()));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(MigrationError::ConfigError(
                "max_delay_ms must not be lower than initial_delay_ms".to_owned(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(MigrationError::ConfigError(
                "backoff_multiplier must be a finite number >= 1.0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Builds the retry policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

/// CSV file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesConfig {
    /// Extractor output.
    #[serde(default = "default_extract_output")]
    pub extract_output: PathBuf,

    /// Reference file with the ID mappings.
    #[serde(default = "default_mapping_reference")]
    pub mapping_reference: PathBuf,

    /// Remapper output.
    #[serde(default = "default_remap_output")]
    pub remap_output: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            extract_output: default_extract_output(),
            mapping_reference: default_mapping_reference(),
            remap_output: default_remap_output(),
        }
    }
}

/// Reads the Stripe secret key from [`API_KEY_ENV`].
///
/// # Errors
///
/// Returns [`MigrationError::ConfigError`] if the variable is unset or empty.
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_owned()),
        _ => Err(MigrationError::ConfigError(format!("{API_KEY_ENV} is not set"))),
    }
}

fn default_base_url() -> String {
    "https://api.stripe.com".to_owned()
}

const fn default_page_size() -> u8 {
    100
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_max_attempts() -> u32 {
    8
}

const fn default_initial_delay_ms() -> u64 {
    2_000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_extract_output() -> PathBuf {
    PathBuf::from(DEFAULT_EXTRACT_OUTPUT)
}

fn default_mapping_reference() -> PathBuf {
    PathBuf::from(DEFAULT_MAPPING_REFERENCE)
}

fn default_remap_output() -> PathBuf {
    PathBuf::from(DEFAULT_REMAP_OUTPUT)
}
