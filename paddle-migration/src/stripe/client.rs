//! Stripe REST client built on reqwest.

use std::fmt;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::{
    SubscriptionSource,
    models::{ErrorBody, List, PaymentMethod, Subscription, TaxId},
};
use crate::{
    config::SourceConfig,
    error::{MigrationError, Result},
};

/// Relations expanded inline on the subscription list call.
///
/// Expanding these avoids one request per subscription for the customer,
/// the discount coupon and every item price. Payment methods and tax IDs
/// cannot be expanded and need separate calls.
pub const SUBSCRIPTION_EXPANSIONS: [&str; 3] =
    ["data.customer", "data.discount.coupon", "data.items.data.price"];

/// Client for the Stripe API.
///
/// Constructed once at startup and passed by reference to the extractor.
///
/// # Examples
///
/// ```
/// use paddle_migration::{config::SourceConfig, stripe::StripeClient};
///
/// let client = StripeClient::new(&SourceConfig::default(), "sk_test_123").unwrap();
/// assert_eq!(client.base_url().as_str(), "https://api.stripe.com/");
/// ```
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Creates a client for the configured API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::ConfigError`] if the base URL does not parse and
    /// [`MigrationError::HttpError`] if the HTTP client cannot be built.
    pub fn new(config: &SourceConfig, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            MigrationError::ConfigError(format!("invalid base_url '{}': {e}", config.base_url))
        })?;

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("paddle-migration/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(MigrationError::HttpError)?;

        Ok(Self { http, base_url, api_key: api_key.into() })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends an authenticated GET request and decodes the JSON response.
    #[instrument(skip(self, query), fields(base_url = %self.base_url))]
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| MigrationError::ConfigError(format!("invalid request path {path}: {e}")))?;

        let response = self.http.get(url).bearer_auth(&self.api_key).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MigrationError::RateLimited);
        }

        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(MigrationError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|e| MigrationError::InvalidResponse(format!("{path}: {e}")))
    }
}

impl SubscriptionSource for StripeClient {
    async fn list_subscriptions(
        &self,
        limit: u8,
        starting_after: Option<&str>,
    ) -> Result<List<Subscription>> {
        let limit = limit.to_string();
        let mut query = vec![("limit", limit.as_str())];
        query.extend(SUBSCRIPTION_EXPANSIONS.iter().map(|field| ("expand[]", *field)));
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor));
        }

        self.get("/v1/subscriptions", &query).await
    }

    async fn list_card_payment_methods(&self, customer_id: &str) -> Result<List<PaymentMethod>> {
        self.get("/v1/payment_methods", &[("customer", customer_id), ("type", "card")]).await
    }

    async fn list_tax_ids(&self, customer_id: &str) -> Result<List<TaxId>> {
        self.get(&format!("/v1/customers/{customer_id}/tax_ids"), &[]).await
    }
}

/// Extracts `error.message` from a Stripe error body, falling back to the raw text.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error.message)
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
