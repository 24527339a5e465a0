//! Request and response types for the crewcal client.
//!
//! Domain payloads (plans, subscription records, dashboard aggregates) reuse
//! the types from `crewcal-core`; only the envelopes live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crewcal_core::{
    BillingFrequency, MonthlyEvents, PlanQuote, PlanTier, SubscriptionRecord, TeamInsights,
    UpcomingEvents,
};

/// Plan listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansResponse {
    /// Every tier with its prices.
    pub plans: Vec<PlanQuote>,
    /// Label for the yearly discount, e.g. `"25%"`.
    #[serde(default)]
    pub yearly_discount_percentage: Option<String>,
}

/// Checkout or plan change request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Target tier.
    pub plan_id: PlanTier,
    /// Billing frequency.
    pub frequency: BillingFrequency,
    /// Where checkout should return to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// Cancel or reactivate request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscriptionTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
}

/// An invoice from the billing history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Invoice id.
    pub id: String,
    /// Amount paid in cents.
    pub amount_paid: i64,
    /// Invoice status.
    #[serde(default)]
    pub status: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Hosted invoice page.
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,
}

/// The caller's subscription and recent invoices.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionResponse {
    /// Active subscription, else the most recent one.
    pub subscription: Option<SubscriptionRecord>,
    /// Recent invoices.
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

/// A hosted checkout to redirect the user to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Provider session id.
    pub session_id: String,
    /// Hosted checkout URL.
    pub url: String,
}

/// Result of a cancel or reactivate request.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    /// Whether the action succeeded.
    pub success: bool,
    /// Message for the user.
    pub message: String,
}

/// Result of a plan change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PlanChangeOutcome {
    /// Changed in place, or scheduled for period end.
    Updated {
        /// Always `true`.
        success: bool,
        /// Message for the user.
        message: String,
    },
    /// No payment method on file; send the user to this checkout.
    Redirect {
        /// Hosted checkout URL.
        url: String,
    },
}

/// Card on file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    /// Payment method id.
    pub id: String,
    /// Card brand.
    #[serde(default)]
    pub brand: Option<String>,
    /// Last four digits.
    #[serde(default)]
    pub last4: Option<String>,
    /// Expiry month.
    #[serde(default)]
    pub exp_month: Option<u32>,
    /// Expiry year.
    #[serde(default)]
    pub exp_year: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentMethodsResponse {
    pub payment_methods: Vec<PaymentMethod>,
}

/// Outcome of a team member import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportSummary {
    /// Non-blank data rows in the file.
    pub total_rows: usize,
    /// Rows with every required field.
    pub valid_rows: usize,
    /// Members stored.
    pub imported: usize,
    /// Valid rows that failed to store.
    pub failed: usize,
    /// Departments created for this import.
    pub departments_created: usize,
}

/// Dashboard aggregates.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Headline numbers.
    pub insights: TeamInsights,
    /// Events per calendar month.
    pub event_distribution: Vec<MonthlyEvents>,
    /// Events in the next 30 days.
    pub upcoming_events: UpcomingEvents,
}

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}
