//! Paddle Migration: Stripe subscription export for Paddle Billing imports
//!
//! A Rust library that reads live subscriptions from Stripe and produces the
//! CSV file Paddle Billing's subscription importer expects, then rewrites the
//! Stripe price and discount IDs in that file to their Paddle counterparts.
//!
//! # Workflow
//!
//! ```text
//! ┌─────────────────┐
//! │   Stripe API    │  /v1/subscriptions, /v1/payment_methods,
//! │                 │  /v1/customers/{id}/tax_ids
//! └────────┬────────┘
//!          │ HTTPS, bearer key, 429 backoff
//!          │
//! ┌────────▼────────────────────────────────────────┐
//! │  extract                                        │
//! │  ┌──────────────┐      ┌──────────────────┐     │
//! │  │  Extractor   │──────│  discount cycles │     │
//! │  └──────────────┘      └──────────────────┘     │
//! └────────┬────────────────────────────────────────┘
//!          │ paddle_migration_output.csv
//!          │
//! ┌────────▼────────┐      prices-discounts-mapping-ref.csv
//! │  remap          │◄──── (Stripe ID → Paddle ID)
//! └────────┬────────┘
//!          │ paddle_migration_output_mapped.csv
//!          ▼
//!    Paddle importer
//! ```
//!
//! # Quick Start
//!
//! ## 1. Extract subscriptions
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use paddle_migration::{
//!     config::MigrationConfig,
//!     extract::{Extractor, write_csv},
//!     stripe::StripeClient,
//! };
//!
//! # async fn example() -> paddle_migration::Result<()> {
//! let config = MigrationConfig::default();
//! let client = StripeClient::new(&config.source, "sk_live_...")?;
//! let policy = config.retry.policy();
//!
//! let extraction =
//!     Extractor::new(&client, &policy, config.source.page_size).run(Utc::now()).await;
//! write_csv(&config.files.extract_output, &extraction.records)?;
//!
//! if let Some(error) = extraction.error {
//!     return Err(error);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## 2. Remap identifiers
//!
//! ```rust,no_run
//! use paddle_migration::remap::{CsvTable, IdMapping, MappingKind};
//!
//! # fn example() -> paddle_migration::Result<()> {
//! let mut table = CsvTable::read("paddle_migration_output.csv")?;
//!
//! let prices = IdMapping::load("prices-discounts-mapping-ref.csv", MappingKind::Prices)?;
//! let mapped = table.map_prices(&prices);
//! println!("{mapped} price cells mapped");
//!
//! table.save("paddle_migration_output_mapped.csv")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`stripe`]: Stripe REST client, response models and the [`stripe::SubscriptionSource`] seam
//! - [`extract`]: Subscription traversal, row mapping, discount cycles, CSV output
//! - [`remap`]: Stripe to Paddle ID rewriting of an extracted CSV
//! - [`reliability`]: Bounded exponential backoff for rate-limited calls
//! - [`config`]: TOML configuration with validation
//! - [`error`]: Error types with recovery guidance
//!
//! # Rate Limits
//!
//! Every Stripe call is retried on HTTP 429 with exponential backoff (8 attempts,
//! 2s initial delay, 30s cap by default). When retries run out, extraction stops
//! and the rows collected so far are still returned, so a partial file can be
//! written and inspected.
//!
//! # Error Handling
//!
//! All operations return [`Result<T, MigrationError>`](error::Result):
//!
//! ```rust
//! use paddle_migration::MigrationError;
//!
//! fn describe(error: &MigrationError) -> &'static str {
//!     match error {
//!         MigrationError::RetriesExhausted { .. } => "rerun later or raise retry.max_attempts",
//!         MigrationError::ApiError { status: 401, .. } => "check STRIPE_API_KEY",
//!         MigrationError::InvalidInput(_) => "check the reference file columns",
//!         _ => "see logs",
//!     }
//! }
//!
//! assert_eq!(describe(&MigrationError::RetriesExhausted { attempts: 8 }), "rerun later or raise retry.max_attempts");
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and csv"
)]

pub mod config;
pub mod error;
pub mod extract;
pub mod reliability;
pub mod remap;
pub mod stripe;

pub use error::{MigrationError, Result};
