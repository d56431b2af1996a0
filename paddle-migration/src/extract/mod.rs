//! Subscription extraction from Stripe into Paddle import rows.
//!
//! The [`Extractor`] walks every subscription page, resolves each customer's
//! card token and tax identifier, and turns the result into
//! [`SubscriptionRecord`]s. Rows are buffered until the traversal finishes so
//! [`write_csv`] can size the item columns to the widest subscription.
//!
//! # Failure semantics
//!
//! A failed listing call ends the traversal. Per-customer lookups fail soft:
//! errors leave the cell empty, except exhausted rate-limit retries, which end
//! the traversal too. Either way the rows collected so far are kept in the
//! returned [`Extraction`].

pub mod discount;
mod record;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

pub use discount::{DiscountCycles, RemainingCycles, UNLIMITED_MARKER, remaining_discount_cycles};
pub use record::{
    ADDITIONAL_INFORMATION_GUIDANCE, CUSTOM_DATA_KEY_GUIDANCE, CUSTOM_DATA_VALUE_GUIDANCE,
    CollectionMode, CustomerLookups, DISCOUNT_ID_COLUMN, FIXED_COLUMNS, ItemColumns,
    NOT_IN_STRIPE, PAUSED_AT_GUIDANCE, PRICE_ID_PREFIX, PURCHASE_ORDER_GUIDANCE, QUANTITY_PREFIX,
    STATUS_PAUSED, SubscriptionRecord, header, write_csv, write_records,
};

use crate::{
    error::{MigrationError, Result},
    reliability::{RetryPolicy, retry_with_backoff},
    stripe::SubscriptionSource,
};

/// Outcome of an extraction run.
///
/// `error` is set when the traversal stopped early; `records` then holds
/// everything collected before the failure.
#[derive(Debug)]
pub struct Extraction {
    /// Rows for every non-past-due subscription seen.
    pub records: Vec<SubscriptionRecord>,
    /// Error that ended the traversal, if any.
    pub error: Option<MigrationError>,
}

impl Extraction {
    /// Returns `true` if every page was read.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Reads subscriptions from a [`SubscriptionSource`].
///
/// # Examples
///
/// ```no_run
/// use chrono::Utc;
/// use paddle_migration::{
///     config::SourceConfig, extract::Extractor, reliability::RetryPolicy, stripe::StripeClient,
/// };
///
/// # async fn example() -> paddle_migration::Result<()> {
/// let client = StripeClient::new(&SourceConfig::default(), "sk_test_123")?;
/// let policy = RetryPolicy::default();
///
/// let extraction = Extractor::new(&client, &policy, 100).run(Utc::now()).await;
/// println!("{} subscriptions", extraction.records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Extractor<'a, S> {
    source: &'a S,
    retry: &'a RetryPolicy,
    page_size: u8,
}

impl<'a, S: SubscriptionSource> Extractor<'a, S> {
    /// Creates an extractor reading `page_size` subscriptions per request.
    #[must_use]
    pub fn new(source: &'a S, retry: &'a RetryPolicy, page_size: u8) -> Self {
        Self { source, retry, page_size }
    }

    /// Runs the traversal, using `now` for trial and discount calculations.
    #[instrument(skip_all, fields(page_size = self.page_size))]
    pub async fn run(&self, now: DateTime<Utc>) -> Extraction {
        let mut records = Vec::new();
        let error = self.collect(now, &mut records).await.err();

        match &error {
            None => info!(records = records.len(), "Extraction complete"),
            Some(e) => warn!(records = records.len(), error = %e, "Extraction stopped early"),
        }

        Extraction { records, error }
    }

    async fn collect(&self, now: DateTime<Utc>, records: &mut Vec<SubscriptionRecord>) -> Result<()> {
        let mut cursor: Option<String> = None;
        let mut page_number = 0u32;

        loop {
            page_number += 1;
            let starting_after = cursor.as_deref();
            let page = retry_with_backoff(self.retry, move || {
                self.source.list_subscriptions(self.page_size, starting_after)
            })
            .await?;
            debug!(page = page_number, size = page.data.len(), "Fetched subscription page");

            for sub in &page.data {
                if sub.is_past_due() {
                    debug!(subscription_id = %sub.id, "Skipping past_due subscription");
                    continue;
                }
                if sub.id.is_empty() || sub.customer.id.is_empty() {
                    warn!(
                        subscription_id = %sub.id,
                        customer_id = %sub.customer.id,
                        "Skipping subscription without IDs"
                    );
                    continue;
                }
                let lookups = self.customer_lookups(&sub.customer.id).await?;
                records.push(SubscriptionRecord::from_subscription(sub, lookups, now));
            }

            if !page.has_more {
                return Ok(());
            }
            match page.data.last() {
                Some(last) => cursor = Some(last.id.clone()),
                None => {
                    warn!(page = page_number, "Empty page reported has_more, stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn customer_lookups(&self, customer_id: &str) -> Result<CustomerLookups> {
        let card_token = retry_with_backoff(self.retry, move || {
            self.source.list_card_payment_methods(customer_id)
        })
        .await
        .map(|methods| methods.data.into_iter().next().map(|pm| pm.id).unwrap_or_default());
        let card_token = fail_soft(card_token, "card_token", customer_id)?;

        let tax_identifier =
            retry_with_backoff(self.retry, move || self.source.list_tax_ids(customer_id))
                .await
                .map(|ids| ids.data.into_iter().next().map(|tax| tax.value).unwrap_or_default());
        let tax_identifier = fail_soft(tax_identifier, "tax_id", customer_id)?;

        Ok(CustomerLookups { card_token, tax_identifier })
    }
}

/// Turns a failed lookup into an empty value unless the failure must stop the run.
fn fail_soft(result: Result<String>, lookup: &'static str, customer_id: &str) -> Result<String> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal_for_lookup() => Err(e),
        Err(e) => {
            warn!(customer_id, lookup, error = %e, "Lookup failed, leaving field empty");
            Ok(String::new())
        }
    }
}
