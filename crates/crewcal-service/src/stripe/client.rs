//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use crewcal_core::UserId;

use super::types::{
    CheckoutSession, Customer, Invoice, PaymentMethod, Price, Product, StripeErrorResponse,
    StripeList, Subscription,
};
use crate::provider::{BillingProvider, CheckoutRequest, SubscriptionUpdate};

/// Stripe API version the types in this module are written against.
pub const STRIPE_API_VERSION: &str = "2023-10-16";

/// Error type for Stripe operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Webhook signature did not match or is too old.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// Webhook signature header could not be parsed.
    #[error("Malformed webhook signature header: {0}")]
    MalformedSignature(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An object carried a value we cannot represent, such as an unknown
    /// subscription status.
    #[error("Malformed Stripe object: {0}")]
    Malformed(String),

    /// A response was well-formed JSON but not usable.
    #[error("Unexpected Stripe response: {0}")]
    Unexpected(String),
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `base_url` - API root, normally `https://api.stripe.com/v1`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.get(format!("{}{path}", self.base_url)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.post(format!("{}{path}", self.base_url)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.delete(format!("{}{path}", self.base_url)))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .basic_auth(&self.api_key, Option::<&str>::None)
            .header("Stripe-Version", STRIPE_API_VERSION)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => {
                tracing::warn!(
                    status = %status,
                    error_type = %stripe_error.error.error_type,
                    code = ?stripe_error.error.code,
                    "Stripe rejected request"
                );
                Err(StripeError::Api {
                    error_type: stripe_error.error.error_type,
                    message: stripe_error.error.message,
                    code: stripe_error.error.code,
                })
            }
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut params = vec![("metadata[user_id]", user_id.to_string())];
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }

        tracing::debug!(user_id = %user_id, "Creating Stripe customer");
        let response = self.post("/customers").form(&params).send().await?;
        Self::handle_response(response).await
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        let response = self
            .get(&format!("/subscriptions/{subscription_id}"))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, StripeError> {
        let response = self.get(&format!("/products/{product_id}")).send().await?;
        Self::handle_response(response).await
    }

    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, StripeError> {
        let response = self
            .get("/prices")
            .query(&[
                ("lookup_keys[]", lookup_key),
                ("active", "true"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let prices: StripeList<Price> = Self::handle_response(response).await?;
        Ok(prices.data.into_iter().next())
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, StripeError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some((item_id, price_id)) = &update.price {
            params.push(("items[0][id]", item_id.clone()));
            params.push(("items[0][price]", price_id.clone()));
        }
        if let Some(flag) = update.cancel_at_period_end {
            params.push(("cancel_at_period_end", flag.to_string()));
        }
        if let Some(proration) = update.proration {
            params.push(("proration_behavior", proration.as_str().to_string()));
        }

        tracing::debug!(
            subscription_id = %subscription_id,
            price_change = update.price.is_some(),
            cancel_at_period_end = ?update.cancel_at_period_end,
            "Updating Stripe subscription"
        );

        let response = self
            .post(&format!("/subscriptions/{subscription_id}"))
            .form(&params)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        let response = self
            .delete(&format!("/subscriptions/{subscription_id}"))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".into(), "subscription".into()),
            ("customer".into(), request.customer_id.clone()),
            ("line_items[0][price]".into(), request.price_id.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
        ];
        for (key, value) in &request.metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }

        tracing::debug!(
            customer_id = %request.customer_id,
            price_id = %request.price_id,
            "Creating Stripe checkout session"
        );

        let response = self.post("/checkout/sessions").form(&params).send().await?;
        Self::handle_response(response).await
    }

    async fn list_payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentMethod>, StripeError> {
        let response = self
            .get("/payment_methods")
            .query(&[("customer", customer_id), ("type", "card")])
            .send()
            .await?;
        let methods: StripeList<PaymentMethod> = Self::handle_response(response).await?;
        Ok(methods.data)
    }

    async fn list_invoices(&self, customer_id: &str, limit: u32) -> Result<Vec<Invoice>, StripeError> {
        let limit = limit.clamp(1, 100).to_string();
        let response = self
            .get("/invoices")
            .query(&[("customer", customer_id), ("limit", limit.as_str())])
            .send()
            .await?;
        let invoices: StripeList<Invoice> = Self::handle_response(response).await?;
        Ok(invoices.data)
    }
}
