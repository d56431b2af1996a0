//! Stripe source API access.
//!
//! [`SubscriptionSource`] is the seam between the extractor and the network.
//! [`StripeClient`] implements it over Stripe's REST API; tests substitute
//! in-memory sources.

mod client;
pub mod models;

pub use client::{StripeClient, SUBSCRIPTION_EXPANSIONS};
pub use models::{
    Address, BillingInterval, Coupon, CouponDuration, Customer, Discount, IntervalUnit, List,
    PaymentMethod, Plan, Price, Subscription, SubscriptionItem, TaxId,
};

use crate::error::Result;

/// Read-only access to the billing data needed for the migration.
///
/// Implementations report HTTP 429 as [`crate::MigrationError::RateLimited`]
/// so the caller's retry policy can recognise it.
#[allow(async_fn_in_trait, reason = "used with concrete types only, no Send bound needed")]
pub trait SubscriptionSource {
    /// Fetches one page of subscriptions with customer, discount coupon and
    /// item prices expanded.
    ///
    /// `starting_after` is the ID of the last subscription of the previous
    /// page, `None` for the first page.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be decoded.
    async fn list_subscriptions(
        &self,
        limit: u8,
        starting_after: Option<&str>,
    ) -> Result<List<Subscription>>;

    /// Lists the customer's card payment methods.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be decoded.
    async fn list_card_payment_methods(&self, customer_id: &str) -> Result<List<PaymentMethod>>;

    /// Lists the customer's tax IDs.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be decoded.
    async fn list_tax_ids(&self, customer_id: &str) -> Result<List<TaxId>>;
}
