//! Subscription and payment method handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crewcal_core::{BillingFrequency, PlanTier, SubscriptionRecord};

use crate::auth::AuthUser;
use crate::billing::actions::{self, PlanChangeOutcome};
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{self, Invoice, PaymentMethod};

/// Number of invoices shown with the subscription.
const INVOICE_HISTORY_LIMIT: u32 = 10;

// =============================================================================
// Request / response types
// =============================================================================

/// Body of checkout and change-plan requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    /// Target tier (`starter`, `growth`, `pro`, `enterprise`).
    pub plan_id: String,
    /// Billing frequency; monthly when omitted.
    #[serde(default)]
    pub frequency: BillingFrequency,
    /// Where checkout should send the user back to; the frontend by default.
    #[serde(default)]
    pub return_url: Option<String>,
}

/// Body of cancel and reactivate requests.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTarget {
    /// Subscription the caller believes is active.
    #[serde(default)]
    pub subscription_id: Option<String>,
}

/// Outcome of a cancel, reactivate or in-place plan change.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    /// Always `true`; failures are error responses.
    pub success: bool,
    /// Message for the user.
    pub message: String,
}

impl ActionResponse {
    fn ok(message: String) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

/// A checkout session to redirect to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Provider session id.
    pub session_id: String,
    /// Hosted checkout URL.
    pub url: String,
}

/// Result of a change-plan request.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChangePlanResponse {
    /// Changed in place.
    Updated(ActionResponse),
    /// Complete a checkout first.
    Redirect {
        /// Hosted checkout URL.
        url: String,
    },
}

/// Invoice summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    /// Invoice id.
    pub id: String,
    /// Amount paid in cents.
    pub amount_paid: i64,
    /// Invoice status.
    pub status: Option<String>,
    /// When the invoice was created.
    pub created_at: Option<DateTime<Utc>>,
    /// Hosted invoice page.
    pub hosted_invoice_url: Option<String>,
}

impl From<Invoice> for InvoiceView {
    fn from(invoice: Invoice) -> Self {
        Self {
            created_at: stripe::timestamp(invoice.created).ok(),
            id: invoice.id,
            amount_paid: invoice.amount_paid,
            status: invoice.status,
            hosted_invoice_url: invoice.hosted_invoice_url,
        }
    }
}

/// The caller's subscription with recent invoices.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Active subscription, else the most recent one, else `null`.
    pub subscription: Option<SubscriptionRecord>,
    /// Recent invoices, newest first.
    pub invoices: Vec<InvoiceView>,
}

/// Card on file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodView {
    /// Payment method id.
    pub id: String,
    /// Card brand.
    pub brand: Option<String>,
    /// Last four digits.
    pub last4: Option<String>,
    /// Expiry month.
    pub exp_month: Option<u32>,
    /// Expiry year.
    pub exp_year: Option<u32>,
}

impl From<PaymentMethod> for PaymentMethodView {
    fn from(method: PaymentMethod) -> Self {
        let card = method.card;
        Self {
            id: method.id,
            brand: card.as_ref().map(|c| c.brand.clone()),
            last4: card.as_ref().map(|c| c.last4.clone()),
            exp_month: card.as_ref().map(|c| c.exp_month),
            exp_year: card.as_ref().map(|c| c.exp_year),
        }
    }
}

/// Payment methods response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodsResponse {
    /// Cards on file; empty when the user has never checked out.
    pub payment_methods: Vec<PaymentMethodView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /v1/subscription`
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let subscription = state.store.current_subscription(&user.user_id)?;

    let customer_id = state
        .store
        .get_profile(&user.user_id)?
        .and_then(|p| p.stripe_customer_id);
    let invoices = match (customer_id, &state.billing) {
        (Some(customer_id), Some(provider)) => provider
            .list_invoices(&customer_id, INVOICE_HISTORY_LIMIT)
            .await?
            .into_iter()
            .map(InvoiceView::from)
            .collect(),
        _ => Vec::new(),
    };

    Ok(Json(SubscriptionResponse {
        subscription,
        invoices,
    }))
}

/// `POST /v1/subscription/checkout`
pub async fn start_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<PlanRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let tier: PlanTier = req.plan_id.parse()?;
    let started =
        actions::start_checkout(&state, &user, tier, req.frequency, req.return_url.as_deref())
            .await?;

    Ok(Json(CheckoutResponse {
        session_id: started.session_id,
        url: started.url,
    }))
}

/// `POST /v1/subscription/change-plan`
pub async fn change_plan(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<PlanRequest>,
) -> Result<Json<ChangePlanResponse>, ApiError> {
    let tier: PlanTier = req.plan_id.parse()?;

    Ok(Json(
        match actions::change_plan(&state, &user, tier, req.frequency).await? {
            PlanChangeOutcome::Updated { message } => ChangePlanResponse::Updated(ActionResponse {
                success: true,
                message,
            }),
            PlanChangeOutcome::Redirect { url } => ChangePlanResponse::Redirect { url },
        },
    ))
}

/// `POST /v1/subscription/cancel`
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Option<Json<SubscriptionTarget>>,
) -> Result<Json<ActionResponse>, ApiError> {
    let target = body.map(|Json(t)| t).unwrap_or_default();
    let message = actions::cancel(&state, &user, target.subscription_id.as_deref()).await?;
    Ok(ActionResponse::ok(message))
}

/// `POST /v1/subscription/reactivate`
pub async fn reactivate_subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    body: Option<Json<SubscriptionTarget>>,
) -> Result<Json<ActionResponse>, ApiError> {
    let target = body.map(|Json(t)| t).unwrap_or_default();
    let message = actions::reactivate(&state, &user, target.subscription_id.as_deref()).await?;
    Ok(ActionResponse::ok(message))
}

/// `GET /v1/payment-methods`
pub async fn list_payment_methods(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<PaymentMethodsResponse>, ApiError> {
    let customer_id = state
        .store
        .get_profile(&user.user_id)?
        .and_then(|p| p.stripe_customer_id);

    let payment_methods = match (customer_id, &state.billing) {
        (Some(customer_id), Some(provider)) => provider
            .list_payment_methods(&customer_id)
            .await?
            .into_iter()
            .map(PaymentMethodView::from)
            .collect(),
        _ => Vec::new(),
    };

    Ok(Json(PaymentMethodsResponse { payment_methods }))
}
