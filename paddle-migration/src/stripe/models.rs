//! Stripe API objects consumed by the extractor.
//!
//! Only the fields the migration reads are modelled. Everything else in the
//! Stripe payload is ignored during deserialization.

use serde::Deserialize;

/// A page of a Stripe list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    /// Objects on this page.
    pub data: Vec<T>,
    /// Whether more objects exist after the last one on this page.
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self { data: Vec::new(), has_more: false }
    }
}

/// Subscription status value that is never migrated.
pub const STATUS_PAST_DUE: &str = "past_due";

/// Collection method for subscriptions charged to a stored payment method.
pub const CHARGE_AUTOMATICALLY: &str = "charge_automatically";

/// A Stripe subscription with `customer`, `discount.coupon` and
/// `items.data.price` expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID (`sub_...`).
    pub id: String,
    /// Raw status, e.g. `active`, `trialing`, `past_due`.
    pub status: String,
    /// Expanded customer.
    pub customer: Customer,
    /// Lowercase ISO 4217 currency.
    pub currency: String,
    /// Start of the current period (unix seconds).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// End of the current period (unix seconds).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// Subscription start (unix seconds).
    #[serde(default)]
    pub start_date: Option<i64>,
    /// `charge_automatically` or `send_invoice`.
    pub collection_method: String,
    /// Days until an invoice is due, for `send_invoice` subscriptions.
    #[serde(default)]
    pub days_until_due: Option<u32>,
    /// Trial end (unix seconds).
    #[serde(default)]
    pub trial_end: Option<i64>,
    /// Active discount with the coupon expanded.
    #[serde(default)]
    pub discount: Option<Discount>,
    /// Legacy single-plan view, present when the subscription has one price.
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Set while payment collection is paused.
    #[serde(default)]
    pub pause_collection: Option<PauseCollection>,
    /// Line items with prices expanded.
    #[serde(default)]
    pub items: List<SubscriptionItem>,
}

impl Subscription {
    /// Returns `true` for subscriptions in the `past_due` state.
    #[must_use]
    pub fn is_past_due(&self) -> bool {
        self.status == STATUS_PAST_DUE
    }

    /// Returns `true` if Stripe charges the stored payment method automatically.
    #[must_use]
    pub fn charges_automatically(&self) -> bool {
        self.collection_method == CHARGE_AUTOMATICALLY
    }

    /// Resolves the billing interval used for discount cycle counting.
    ///
    /// Uses `plan` when present, then the first item's recurring price, and
    /// falls back to monthly.
    #[must_use]
    pub fn billing_interval(&self) -> BillingInterval {
        if let Some(plan) = &self.plan {
            return BillingInterval { unit: plan.interval, count: plan.interval_count };
        }
        self.items
            .data
            .iter()
            .filter_map(|item| item.price.as_ref()?.recurring.as_ref())
            .map(|recurring| BillingInterval {
                unit: recurring.interval,
                count: recurring.interval_count,
            })
            .next()
            .unwrap_or_default()
    }
}

/// Stripe customer.
///
/// Deleted customers come back with only `id` and `deleted`, so every other
/// field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Customer {
    /// Customer ID (`cus_...`).
    pub id: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Full name or business name.
    #[serde(default)]
    pub name: Option<String>,
    /// Billing address.
    #[serde(default)]
    pub address: Option<Address>,
}

/// Postal address.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Address {
    /// Two-letter country code.
    #[serde(default)]
    pub country: Option<String>,
    /// Street line 1.
    #[serde(default)]
    pub line1: Option<String>,
    /// Street line 2.
    #[serde(default)]
    pub line2: Option<String>,
    /// City.
    #[serde(default)]
    pub city: Option<String>,
    /// State, county, province or region.
    #[serde(default)]
    pub state: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Discount applied to a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct Discount {
    /// Discount ID (`di_...`).
    pub id: String,
    /// When the discount started applying (unix seconds).
    pub start: i64,
    /// Expanded coupon.
    pub coupon: Coupon,
}

/// Coupon backing a discount.
#[derive(Debug, Clone, Deserialize)]
pub struct Coupon {
    /// Coupon ID.
    pub id: String,
    /// How long the coupon applies.
    pub duration: CouponDuration,
    /// Number of months a `repeating` coupon applies for.
    #[serde(default)]
    pub duration_in_months: Option<u32>,
}

/// Coupon duration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponDuration {
    /// Applies to a single invoice.
    Once,
    /// Applies for `duration_in_months`.
    Repeating,
    /// Applies indefinitely.
    Forever,
}

/// Recurrence unit of a price or plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    /// Daily.
    Day,
    /// Weekly.
    Week,
    /// Monthly.
    #[default]
    Month,
    /// Yearly.
    Year,
}

/// Billing interval: unit plus count, e.g. every 3 months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingInterval {
    /// Recurrence unit.
    pub unit: IntervalUnit,
    /// Number of units between charges.
    pub count: u32,
}

impl Default for BillingInterval {
    fn default() -> Self {
        Self { unit: IntervalUnit::Month, count: 1 }
    }
}

/// Legacy plan object on a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    /// Recurrence unit.
    pub interval: IntervalUnit,
    /// Number of units between charges.
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
}

/// Pause state of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct PauseCollection {
    /// `keep_as_draft`, `mark_uncollectible` or `void`.
    #[serde(default)]
    pub behavior: Option<String>,
    /// When collection resumes (unix seconds).
    #[serde(default)]
    pub resumes_at: Option<i64>,
}

/// Subscription line item.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID (`si_...`).
    pub id: String,
    /// Expanded price.
    #[serde(default)]
    pub price: Option<Price>,
    /// Quantity, absent for metered prices.
    #[serde(default)]
    pub quantity: Option<u64>,
}

/// Price object.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID (`price_...`).
    pub id: String,
    /// Recurrence, absent for one-time prices.
    #[serde(default)]
    pub recurring: Option<Recurring>,
}

/// Recurring component of a price.
#[derive(Debug, Clone, Deserialize)]
pub struct Recurring {
    /// Recurrence unit.
    pub interval: IntervalUnit,
    /// Number of units between charges.
    #[serde(default = "default_interval_count")]
    pub interval_count: u32,
}

/// Stored payment method.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    /// Payment method ID (`pm_...`), used as the card token.
    pub id: String,
}

/// Customer tax identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxId {
    /// Tax ID value as entered, e.g. `DE123456789`.
    pub value: String,
}

/// Error body returned by Stripe for non-success responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorDetail,
}

/// Detail part of [`ErrorBody`].
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

const fn default_interval_count() -> u32 {
    1
}
