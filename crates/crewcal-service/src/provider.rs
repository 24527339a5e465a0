//! Payment provider abstraction.
//!
//! Handlers and webhook reconcilers talk to the provider through
//! [`BillingProvider`] so tests can swap Stripe for an in-process fake.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crewcal_core::UserId;

use crate::stripe::{
    CheckoutSession, Customer, Invoice, PaymentMethod, Price, Product, StripeError, Subscription,
};

/// How the provider should bill the difference when a price changes mid-period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proration {
    /// Charge or credit the difference immediately.
    CreateProrations,
    /// Leave the current period alone.
    None,
}

impl Proration {
    /// Wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateProrations => "create_prorations",
            Self::None => "none",
        }
    }
}

/// Changes to apply to a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    /// Swap the price of an item: `(item_id, price_id)`.
    pub price: Option<(String, String)>,
    /// Set or clear the cancel-at-period-end flag.
    pub cancel_at_period_end: Option<bool>,
    /// Proration behaviour for a price swap.
    pub proration: Option<Proration>,
}

impl SubscriptionUpdate {
    /// Only toggle `cancel_at_period_end`.
    #[must_use]
    pub fn cancel_at_period_end(flag: bool) -> Self {
        Self {
            cancel_at_period_end: Some(flag),
            ..Self::default()
        }
    }

    /// Swap an item's price.
    #[must_use]
    pub fn swap_price(item_id: &str, price_id: &str, proration: Proration) -> Self {
        Self {
            price: Some((item_id.to_string(), price_id.to_string())),
            proration: Some(proration),
            ..Self::default()
        }
    }
}

/// A hosted checkout for a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Customer to bill.
    pub customer_id: String,
    /// Price to subscribe to.
    pub price_id: String,
    /// Redirect after success.
    pub success_url: String,
    /// Redirect after abandoning checkout.
    pub cancel_url: String,
    /// Metadata copied onto the session (`user_id`, `replaces_subscription`).
    pub metadata: BTreeMap<String, String>,
}

/// Operations crewcal needs from the payment provider.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer for a user.
    async fn create_customer(
        &self,
        user_id: &UserId,
        email: Option<&str>,
    ) -> Result<Customer, StripeError>;

    /// Fetch a subscription.
    async fn retrieve_subscription(&self, subscription_id: &str)
        -> Result<Subscription, StripeError>;

    /// Fetch a product.
    async fn retrieve_product(&self, product_id: &str) -> Result<Product, StripeError>;

    /// Find the active price carrying `lookup_key`.
    async fn find_price_by_lookup_key(&self, lookup_key: &str)
        -> Result<Option<Price>, StripeError>;

    /// Apply an update and return the provider's resulting subscription.
    async fn update_subscription(
        &self,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, StripeError>;

    /// End a subscription immediately.
    async fn cancel_subscription_now(&self, subscription_id: &str)
        -> Result<Subscription, StripeError>;

    /// Open a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError>;

    /// Card payment methods of a customer.
    async fn list_payment_methods(&self, customer_id: &str)
        -> Result<Vec<PaymentMethod>, StripeError>;

    /// Most recent invoices of a customer.
    async fn list_invoices(&self, customer_id: &str, limit: u32)
        -> Result<Vec<Invoice>, StripeError>;
}
