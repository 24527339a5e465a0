//! Stripe API types.
//!
//! Only the fields crewcal reads are modelled; everything else in the
//! provider's payloads is ignored.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crewcal_core::{SubscriptionSnapshot, SubscriptionStatus};

use super::client::StripeError;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Customer ID.
    pub customer: String,
    /// Status string (`active`, `past_due`, ...).
    pub status: String,
    /// Current period start (Unix).
    pub current_period_start: i64,
    /// Current period end (Unix).
    pub current_period_end: i64,
    /// Whether the subscription ends at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Created timestamp (Unix).
    pub created: i64,
    /// When the subscription ended (Unix).
    #[serde(default)]
    pub ended_at: Option<i64>,
    /// Subscription items.
    pub items: StripeList<SubscriptionItem>,
}

impl Subscription {
    /// The first (and for crewcal, only) subscription item.
    #[must_use]
    pub fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.data.first()
    }

    /// Convert into the provider-neutral snapshot used by the state machine.
    ///
    /// # Errors
    ///
    /// Fails on a status string or timestamp that cannot be represented.
    pub fn snapshot(&self) -> Result<SubscriptionSnapshot, StripeError> {
        let status: SubscriptionStatus = self
            .status
            .parse()
            .map_err(|e: crewcal_core::CoreError| StripeError::Malformed(e.to_string()))?;
        Ok(SubscriptionSnapshot {
            id: self.id.clone(),
            customer_id: self.customer.clone(),
            status,
            current_period_start: timestamp(self.current_period_start)?,
            current_period_end: timestamp(self.current_period_end)?,
            cancel_at_period_end: self.cancel_at_period_end,
            created_at: timestamp(self.created)?,
            ended_at: self.ended_at.map(timestamp).transpose()?,
        })
    }
}

/// Convert a Unix timestamp from a Stripe payload.
///
/// # Errors
///
/// Returns `StripeError::Malformed` for out-of-range values.
pub fn timestamp(secs: i64) -> Result<DateTime<Utc>, StripeError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| StripeError::Malformed(format!("timestamp out of range: {secs}")))
}

/// One line of a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    pub id: String,
    /// The price billed by this item.
    pub price: Price,
}

/// Stripe price object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
    /// Lookup key, e.g. `growth_monthly`.
    #[serde(default)]
    pub lookup_key: Option<String>,
    /// Amount in cents.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// Product ID.
    pub product: String,
    /// Recurrence, for subscription prices.
    #[serde(default)]
    pub recurring: Option<Recurring>,
}

/// Recurrence of a price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurring {
    /// `month` or `year`.
    pub interval: String,
}

/// Stripe product object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Metadata; `plan_id` names the tier.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Subscription created by the session, once completed.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Session mode (`subscription`).
    #[serde(default)]
    pub mode: Option<String>,
    /// Metadata set when the session was created.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID.
    pub id: String,
    /// Subscription the invoice bills.
    #[serde(default)]
    pub subscription: Option<String>,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Amount paid in cents.
    #[serde(default)]
    pub amount_paid: i64,
    /// Invoice status.
    #[serde(default)]
    pub status: Option<String>,
    /// Invoice lines.
    #[serde(default)]
    pub lines: Option<StripeList<InvoiceLine>>,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Hosted invoice page.
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
}

impl Invoice {
    /// Amount of the first line, which is what the subscription charged.
    #[must_use]
    pub fn first_line_amount(&self) -> Option<i64> {
        self.lines.as_ref()?.data.first().map(|l| l.amount)
    }
}

/// One invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Amount in cents.
    pub amount: i64,
}

/// Stripe payment method object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Payment method ID.
    pub id: String,
    /// Method type (`card`, ...).
    #[serde(rename = "type")]
    pub method_type: String,
    /// Card details for card methods.
    #[serde(default)]
    pub card: Option<Card>,
}

/// Card details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Brand (`visa`, ...).
    pub brand: String,
    /// Last four digits.
    pub last4: String,
    /// Expiry month.
    pub exp_month: u32,
    /// Expiry year.
    pub exp_year: u32,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

impl<T> StripeList<T> {
    /// A single-page list.
    #[must_use]
    pub fn of(data: Vec<T>) -> Self {
        Self {
            data,
            has_more: false,
        }
    }
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe error response body.
#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    /// The error.
    pub error: StripeErrorBody,
}

/// Stripe error details.
#[derive(Debug, Deserialize)]
pub struct StripeErrorBody {
    /// Error type.
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
    /// Machine readable code.
    #[serde(default)]
    pub code: Option<String>,
}
