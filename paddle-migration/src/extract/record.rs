//! Paddle import rows and their CSV schema.
//!
//! A [`SubscriptionRecord`] is one row of Paddle's subscription import file:
//! 34 fixed columns followed by `price_id_i,quantity_i` pairs. The width of
//! the repeated group is the largest item count in the batch, so rows are
//! buffered and the header is fixed before anything is written.

use std::{fs::File, io, path::Path};

use chrono::{DateTime, TimeDelta, Utc};

use super::discount::remaining_discount_cycles;
use crate::{
    error::Result,
    stripe::{Address, Subscription},
};

/// Fixed column names, in output order.
pub const FIXED_COLUMNS: [&str; 34] = [
    "customer_email",
    "customer_full_name",
    "customer_external_id",
    "business_tax_identifier",
    "business_name",
    "business_company_number",
    "business_external_id",
    "address_country_code",
    "address_street_line1",
    "address_street_line2",
    "address_city",
    "address_region",
    "address_postal_code",
    "address_external_id",
    "status",
    "currency_code",
    "started_at",
    "paused_at",
    "collection_mode",
    "enable_checkout",
    "purchase_order_number",
    "additional_information",
    "payment_terms_frequency",
    "payment_terms_interval",
    "current_period_started_at",
    "current_period_ends_at",
    "trial_period_frequency",
    "trial_period_interval",
    "subscription_external_id",
    "card_token",
    "discount_id",
    "discount_remaining_cycles",
    "subscription_custom_data_key_1",
    "subscription_custom_data_value_1",
];

/// Prefix of the repeated price columns.
pub const PRICE_ID_PREFIX: &str = "price_id_";

/// Prefix of the repeated quantity columns.
pub const QUANTITY_PREFIX: &str = "quantity_";

/// Name of the discount column.
pub const DISCOUNT_ID_COLUMN: &str = "discount_id";

/// Status written for subscriptions whose collection is paused.
pub const STATUS_PAUSED: &str = "paused";

/// Interval unit for trial and payment terms.
const DAY: &str = "day";

/// Timestamp format expected by the Paddle importer.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Guidance for columns Stripe has no value for.
pub const NOT_IN_STRIPE: &str =
    "Not found in Stripe. Add your own internal value if desired, otherwise delete this column";

/// Guidance for `paused_at`.
pub const PAUSED_AT_GUIDANCE: &str = "Not found in the Stripe API. Enrich from your database, \
                                      otherwise delete this column if not needed.";

/// Guidance for `purchase_order_number` on manually collected subscriptions.
pub const PURCHASE_ORDER_GUIDANCE: &str = "No specific PO field in Stripe. Appropriate values may \
                                           be found in custom_fields. Add logic to populate this \
                                           column for manual subs, or delete.";

/// Guidance for `additional_information` on manually collected subscriptions.
pub const ADDITIONAL_INFORMATION_GUIDANCE: &str =
    "No specific additional_information field in Stripe. The description field in the Invoice \
     API may contain appropriate values. Add logic to populate this column for manual subs, or \
     delete.";

/// Guidance for `subscription_custom_data_key_1`.
pub const CUSTOM_DATA_KEY_GUIDANCE: &str = "Amend the logic to add any custom_data key here. \
                                            Repeat columns as necessary for more custom_data. \
                                            Delete if unnecessary.";

/// Guidance for `subscription_custom_data_value_1`.
pub const CUSTOM_DATA_VALUE_GUIDANCE: &str = "Amend the logic to add any custom_data value here. \
                                              Repeat columns as necessary for more custom_data. \
                                              Delete if unnecessary.";

/// How Paddle collects payment for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// Charged to the stored card.
    Automatic,
    /// Invoiced and paid by the customer.
    Manual,
}

impl CollectionMode {
    /// Returns the value written to the `collection_mode` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// Values resolved by separate per-customer requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerLookups {
    /// First card payment method ID, or empty.
    pub card_token: String,
    /// First tax ID value, or empty.
    pub tax_identifier: String,
}

/// One `price_id_i` / `quantity_i` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemColumns {
    /// Price ID, empty if the item has no price.
    pub price_id: String,
    /// Quantity, empty for metered items.
    pub quantity: String,
}

/// One row of the Paddle subscription import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs, reason = "fields mirror the column names in FIXED_COLUMNS")]
pub struct SubscriptionRecord {
    pub customer_email: String,
    pub customer_full_name: String,
    pub customer_external_id: String,
    pub business_tax_identifier: String,
    pub business_name: String,
    pub business_company_number: String,
    pub business_external_id: String,
    pub address_country_code: String,
    pub address_street_line1: String,
    pub address_street_line2: String,
    pub address_city: String,
    pub address_region: String,
    pub address_postal_code: String,
    pub address_external_id: String,
    pub status: String,
    pub currency_code: String,
    pub started_at: String,
    pub paused_at: String,
    pub collection_mode: String,
    pub enable_checkout: String,
    pub purchase_order_number: String,
    pub additional_information: String,
    pub payment_terms_frequency: String,
    pub payment_terms_interval: String,
    pub current_period_started_at: String,
    pub current_period_ends_at: String,
    pub trial_period_frequency: String,
    pub trial_period_interval: String,
    pub subscription_external_id: String,
    pub card_token: String,
    pub discount_id: String,
    pub discount_remaining_cycles: String,
    pub subscription_custom_data_key_1: String,
    pub subscription_custom_data_value_1: String,
    /// Line items in Stripe order.
    pub items: Vec<ItemColumns>,
}

impl SubscriptionRecord {
    /// Flattens a Stripe subscription into an import row.
    ///
    /// `now` drives the trial and discount calculations. The caller is
    /// responsible for skipping past-due subscriptions.
    #[must_use]
    pub fn from_subscription(
        sub: &Subscription,
        lookups: CustomerLookups,
        now: DateTime<Utc>,
    ) -> Self {
        let customer = &sub.customer;
        let address = customer.address.clone().unwrap_or_default();
        let Address { country, line1, line2, city, state, postal_code } = address;

        let mode = if sub.charges_automatically() {
            CollectionMode::Automatic
        } else {
            CollectionMode::Manual
        };

        let (trial_period_frequency, trial_period_interval) =
            match trial_days_remaining(sub.trial_end, now) {
                Some(days) => (days.to_string(), DAY.to_owned()),
                None => (String::new(), String::new()),
            };

        let (discount_id, discount_remaining_cycles) =
            remaining_discount_cycles(sub.discount.as_ref(), sub.billing_interval(), now)
                .map(|cycles| (cycles.discount_id, cycles.remaining.to_string()))
                .unwrap_or_default();

        let mut record = Self {
            customer_email: customer.email.clone().unwrap_or_default(),
            customer_full_name: customer.name.clone().unwrap_or_default(),
            customer_external_id: customer.id.clone(),
            business_tax_identifier: lookups.tax_identifier,
            business_name: customer.name.clone().unwrap_or_default(),
            business_company_number: NOT_IN_STRIPE.to_owned(),
            business_external_id: NOT_IN_STRIPE.to_owned(),
            address_country_code: country.unwrap_or_default(),
            address_street_line1: line1.unwrap_or_default(),
            address_street_line2: line2.unwrap_or_default(),
            address_city: city.unwrap_or_default(),
            address_region: state.unwrap_or_default(),
            address_postal_code: postal_code.unwrap_or_default(),
            address_external_id: NOT_IN_STRIPE.to_owned(),
            status: sub.status.clone(),
            currency_code: sub.currency.to_uppercase(),
            started_at: format_timestamp(sub.start_date),
            paused_at: PAUSED_AT_GUIDANCE.to_owned(),
            collection_mode: mode.as_str().to_owned(),
            current_period_started_at: format_timestamp(sub.current_period_start),
            current_period_ends_at: format_timestamp(sub.current_period_end),
            trial_period_frequency,
            trial_period_interval,
            subscription_external_id: sub.id.clone(),
            card_token: lookups.card_token,
            discount_id,
            discount_remaining_cycles,
            subscription_custom_data_key_1: CUSTOM_DATA_KEY_GUIDANCE.to_owned(),
            subscription_custom_data_value_1: CUSTOM_DATA_VALUE_GUIDANCE.to_owned(),
            items: sub
                .items
                .data
                .iter()
                .map(|item| ItemColumns {
                    price_id: item.price.as_ref().map(|p| p.id.clone()).unwrap_or_default(),
                    quantity: item.quantity.map(|q| q.to_string()).unwrap_or_default(),
                })
                .collect(),
            ..Self::default()
        };

        if mode == CollectionMode::Manual {
            record.enable_checkout = "TRUE".to_owned();
            record.purchase_order_number = PURCHASE_ORDER_GUIDANCE.to_owned();
            record.additional_information = ADDITIONAL_INFORMATION_GUIDANCE.to_owned();
            if let Some(days) = sub.days_until_due {
                record.payment_terms_frequency = days.to_string();
                record.payment_terms_interval = DAY.to_owned();
            }
        }

        // Pause wins over whatever Stripe reports as the status
        if sub.pause_collection.is_some() {
            record.status = STATUS_PAUSED.to_owned();
        }

        record
    }

    /// Number of `price_id_i` / `quantity_i` pairs this row needs.
    ///
    /// Always at least 1: a subscription without items still gets an empty
    /// first pair.
    #[must_use]
    pub fn item_slots(&self) -> usize {
        self.items.len().max(1)
    }

    fn fixed_values(&self) -> [&str; 34] {
        [
            &self.customer_email,
            &self.customer_full_name,
            &self.customer_external_id,
            &self.business_tax_identifier,
            &self.business_name,
            &self.business_company_number,
            &self.business_external_id,
            &self.address_country_code,
            &self.address_street_line1,
            &self.address_street_line2,
            &self.address_city,
            &self.address_region,
            &self.address_postal_code,
            &self.address_external_id,
            &self.status,
            &self.currency_code,
            &self.started_at,
            &self.paused_at,
            &self.collection_mode,
            &self.enable_checkout,
            &self.purchase_order_number,
            &self.additional_information,
            &self.payment_terms_frequency,
            &self.payment_terms_interval,
            &self.current_period_started_at,
            &self.current_period_ends_at,
            &self.trial_period_frequency,
            &self.trial_period_interval,
            &self.subscription_external_id,
            &self.card_token,
            &self.discount_id,
            &self.discount_remaining_cycles,
            &self.subscription_custom_data_key_1,
            &self.subscription_custom_data_value_1,
        ]
    }

    /// Renders the row padded to `slots` item pairs.
    #[must_use]
    pub fn to_row(&self, slots: usize) -> Vec<&str> {
        let mut row = Vec::with_capacity(FIXED_COLUMNS.len() + slots * 2);
        row.extend(self.fixed_values());
        for slot in 0..slots {
            match self.items.get(slot) {
                Some(item) => row.extend([item.price_id.as_str(), item.quantity.as_str()]),
                None => row.extend(["", ""]),
            }
        }
        row
    }
}

/// Builds the header for `slots` item pairs.
///
/// # Examples
///
/// ```
/// use paddle_migration::extract::header;
///
/// let header = header(2);
/// assert_eq!(header.len(), 38);
/// assert_eq!(header[34..], ["price_id_1", "quantity_1", "price_id_2", "quantity_2"]);
/// ```
#[must_use]
pub fn header(slots: usize) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|column| (*column).to_owned())
        .chain((1..=slots).flat_map(|i| {
            [format!("{PRICE_ID_PREFIX}{i}"), format!("{QUANTITY_PREFIX}{i}")]
        }))
        .collect()
}

/// Writes `records` as CSV, sizing the item group to the widest record.
///
/// Returns the number of item pairs in the header.
///
/// # Errors
///
/// Returns error if writing to `writer` fails.
pub fn write_records<W: io::Write>(writer: W, records: &[SubscriptionRecord]) -> Result<usize> {
    let slots = records.iter().map(SubscriptionRecord::item_slots).max().unwrap_or(1);

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(header(slots))?;
    for record in records {
        csv_writer.write_record(record.to_row(slots))?;
    }
    csv_writer.flush()?;

    Ok(slots)
}

/// Writes `records` to a CSV file at `path`, replacing any existing file.
///
/// # Errors
///
/// Returns error if the file cannot be created or written.
pub fn write_csv<P: AsRef<Path>>(path: P, records: &[SubscriptionRecord]) -> Result<usize> {
    let file = File::create(path.as_ref())?;
    write_records(io::BufWriter::new(file), records)
}

/// Whole days left in a trial, counting the current partial day.
///
/// `None` when there is no trial or it has already ended.
fn trial_days_remaining(trial_end: Option<i64>, now: DateTime<Utc>) -> Option<i64> {
    let end = DateTime::from_timestamp(trial_end?, 0)?;
    let left = end - now;
    (left >= TimeDelta::zero()).then(|| left.num_days() + 1)
}

/// Formats a unix timestamp for the importer, empty when absent.
fn format_timestamp(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::{Months, TimeZone};

    use super::*;
    use crate::stripe::{
        Coupon, CouponDuration, Customer, Discount, List, Price, SubscriptionItem,
        models::PauseCollection,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn subscription() -> Subscription {
        Subscription {
            id: "sub_1".into(),
            status: "active".into(),
            customer: Customer {
                id: "cus_1".into(),
                email: Some("ada@example.com".into()),
                name: Some("Ada Lovelace".into()),
                address: Some(Address {
                    country: Some("GB".into()),
                    line1: Some("1 Main St".into()),
                    line2: None,
                    city: Some("London".into()),
                    state: None,
                    postal_code: Some("N1 1AA".into()),
                }),
            },
            currency: "gbp".into(),
            current_period_start: Some(1_760_000_000),
            current_period_end: Some(1_762_592_000),
            start_date: Some(1_700_000_000),
            collection_method: "charge_automatically".into(),
            days_until_due: None,
            trial_end: None,
            discount: None,
            plan: None,
            pause_collection: None,
            items: List {
                data: vec![SubscriptionItem {
                    id: "si_1".into(),
                    price: Some(Price { id: "price_1".into(), recurring: None }),
                    quantity: Some(2),
                }],
                has_more: false,
            },
        }
    }

    fn lookups() -> CustomerLookups {
        CustomerLookups { card_token: "pm_1".into(), tax_identifier: "GB123".into() }
    }

    #[test]
    fn test_automatic_subscription_row() {
        let record = SubscriptionRecord::from_subscription(&subscription(), lookups(), now());

        assert_eq!(record.customer_email, "ada@example.com");
        assert_eq!(record.customer_external_id, "cus_1");
        assert_eq!(record.business_name, "Ada Lovelace");
        assert_eq!(record.business_tax_identifier, "GB123");
        assert_eq!(record.card_token, "pm_1");
        assert_eq!(record.address_city, "London");
        assert_eq!(record.address_street_line2, "");
        assert_eq!(record.address_region, "");
        assert_eq!(record.status, "active");
        assert_eq!(record.currency_code, "GBP");
        assert_eq!(record.started_at, "2023-11-14T22:13:20Z");
        assert_eq!(record.collection_mode, "automatic");
        assert_eq!(record.enable_checkout, "");
        assert_eq!(record.purchase_order_number, "");
        assert_eq!(record.payment_terms_frequency, "");
        assert_eq!(record.discount_id, "");
        assert_eq!(record.discount_remaining_cycles, "");
        assert_eq!(record.business_company_number, NOT_IN_STRIPE);
        assert_eq!(
            record.items,
            vec![ItemColumns { price_id: "price_1".into(), quantity: "2".into() }]
        );
    }

    #[test]
    fn test_missing_address_yields_empty_fields() {
        let mut sub = subscription();
        sub.customer.address = None;
        sub.customer.email = None;

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.customer_email, "");
        assert_eq!(record.address_country_code, "");
        assert_eq!(record.address_street_line1, "");
        assert_eq!(record.address_postal_code, "");
    }

    #[test]
    fn test_manual_collection_fields() {
        let mut sub = subscription();
        sub.collection_method = "send_invoice".into();
        sub.days_until_due = Some(30);

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.collection_mode, "manual");
        assert_eq!(record.enable_checkout, "TRUE");
        assert_eq!(record.purchase_order_number, PURCHASE_ORDER_GUIDANCE);
        assert_eq!(record.additional_information, ADDITIONAL_INFORMATION_GUIDANCE);
        assert_eq!(record.payment_terms_frequency, "30");
        assert_eq!(record.payment_terms_interval, "day");
    }

    #[test]
    fn test_manual_collection_without_due_days() {
        let mut sub = subscription();
        sub.collection_method = "send_invoice".into();

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.enable_checkout, "TRUE");
        assert_eq!(record.payment_terms_frequency, "");
        assert_eq!(record.payment_terms_interval, "");
    }

    #[test]
    fn test_trial_counts_current_day() {
        let mut sub = subscription();
        sub.trial_end = Some((now() + TimeDelta::hours(36)).timestamp());

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.trial_period_frequency, "2");
        assert_eq!(record.trial_period_interval, "day");
    }

    #[test]
    fn test_ended_trial_is_blank() {
        let mut sub = subscription();
        sub.trial_end = Some((now() - TimeDelta::hours(1)).timestamp());

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.trial_period_frequency, "");
        assert_eq!(record.trial_period_interval, "");
    }

    #[test]
    fn test_paused_overrides_status() {
        let mut sub = subscription();
        sub.pause_collection =
            Some(PauseCollection { behavior: Some("void".into()), resumes_at: None });

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.status, "paused");
    }

    #[test]
    fn test_discount_columns() {
        let mut sub = subscription();
        sub.discount = Some(Discount {
            id: "di_1".into(),
            start: now().checked_sub_months(Months::new(2)).unwrap().timestamp(),
            coupon: Coupon {
                id: "Q1".into(),
                duration: CouponDuration::Repeating,
                duration_in_months: Some(3),
            },
        });

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.discount_id, "di_1");
        assert_eq!(record.discount_remaining_cycles, "1");
    }

    #[test]
    fn test_item_without_price_or_quantity() {
        let mut sub = subscription();
        sub.items.data.push(SubscriptionItem { id: "si_2".into(), price: None, quantity: None });

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());

        assert_eq!(record.items.len(), 2);
        assert_eq!(record.items[1], ItemColumns::default());
    }

    #[test]
    fn test_zero_items_still_has_one_slot() {
        let mut sub = subscription();
        sub.items.data.clear();

        let record = SubscriptionRecord::from_subscription(&sub, lookups(), now());
        let row = record.to_row(record.item_slots());

        assert_eq!(record.item_slots(), 1);
        assert_eq!(row.len(), FIXED_COLUMNS.len() + 2);
        assert_eq!(row[34..], ["", ""]);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(Some(0)), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(None), "");
    }

    #[test]
    fn test_write_records_pads_to_widest() {
        let mut wide = SubscriptionRecord::from_subscription(&subscription(), lookups(), now());
        wide.items.push(ItemColumns { price_id: "price_2".into(), quantity: "1".into() });
        wide.items.push(ItemColumns { price_id: "price_3".into(), quantity: "5".into() });
        let narrow = SubscriptionRecord::from_subscription(&subscription(), lookups(), now());

        let mut out = Vec::new();
        let slots = write_records(&mut out, &[narrow, wide]).unwrap();
        assert_eq!(slots, 3);

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 34 + 6);
        assert_eq!(&headers[38], "price_id_3");
        assert_eq!(&headers[39], "quantity_3");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][34], "price_1");
        assert_eq!(&rows[0][36], "");
        assert_eq!(&rows[0][39], "");
        assert_eq!(&rows[1][38], "price_3");
        assert_eq!(&rows[1][39], "5");
    }

    #[test]
    fn test_write_empty_batch_has_one_slot() {
        let mut out = Vec::new();
        let slots = write_records(&mut out, &[]).unwrap();

        assert_eq!(slots, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.trim_end().ends_with("price_id_1,quantity_1"));
    }

    #[test]
    fn test_header_order_matches_fixed_values() {
        let record = SubscriptionRecord {
            customer_email: "email".into(),
            subscription_custom_data_value_1: "last".into(),
            ..SubscriptionRecord::default()
        };
        let row = record.to_row(1);
        let header = header(1);

        assert_eq!(header[0], "customer_email");
        assert_eq!(row[0], "email");
        assert_eq!(header[33], "subscription_custom_data_value_1");
        assert_eq!(row[33], "last");
    }
}
