//! User-initiated subscription actions.
//!
//! Each action checks the local record first, calls the provider, and only
//! then saves the mirrored result. A provider rejection leaves the record
//! untouched. A save that races another writer replays the local transition
//! on the fresh record.

use std::collections::BTreeMap;

use crewcal_core::{
    compare_plans, BillingFrequency, PlanChange, PlanDescriptor, PlanPrice, PlanTier,
    PricingConfig, Profile, SubscriptionRecord,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::provider::{BillingProvider, CheckoutRequest, Proration, SubscriptionUpdate};
use crate::state::AppState;
use crate::stripe::Price;

use super::{apply_and_save, subscription_item};

/// Placeholder Stripe substitutes with the session id on redirect.
const CHECKOUT_SESSION_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

const NO_ACTIVE_SUBSCRIPTION: &str = "No active subscription found";

/// A hosted checkout the user should be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutStarted {
    /// Provider session id.
    pub session_id: String,
    /// Hosted checkout URL.
    pub url: String,
}

/// Result of a plan change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanChangeOutcome {
    /// The subscription was changed (or the change scheduled) in place.
    Updated {
        /// Message for the user.
        message: String,
    },
    /// No payment method on file; the user must complete a checkout.
    Redirect {
        /// Hosted checkout URL.
        url: String,
    },
}

// =============================================================================
// Checkout
// =============================================================================

/// Start a hosted checkout for a first subscription.
pub async fn start_checkout(
    state: &AppState,
    user: &AuthUser,
    tier: PlanTier,
    frequency: BillingFrequency,
    return_url: Option<&str>,
) -> Result<CheckoutStarted, ApiError> {
    if state.store.active_subscription(&user.user_id)?.is_some() {
        return Err(ApiError::Conflict(
            "You already have an active subscription".into(),
        ));
    }
    ensure_self_serve(&state.config.pricing, tier, frequency)?;

    let provider = state.billing()?.as_ref();
    let mut profile = state.ensure_profile(user)?;
    let customer_id = ensure_customer(state, provider, &mut profile).await?;
    let price = price_for(provider, tier, frequency).await?;

    let mut metadata = BTreeMap::new();
    metadata.insert("user_id".to_string(), user.user_id.to_string());

    let session = provider
        .create_checkout_session(&checkout_request(state, customer_id, &price, return_url, metadata))
        .await?;
    let url = session
        .url
        .ok_or_else(|| ApiError::Internal("checkout session has no url".into()))?;

    tracing::info!(
        user_id = %user.user_id,
        session_id = %session.id,
        plan_id = %tier,
        frequency = %frequency,
        "Checkout session created"
    );

    Ok(CheckoutStarted {
        session_id: session.id,
        url,
    })
}

// =============================================================================
// Cancel / reactivate
// =============================================================================

/// Cancel the active subscription at the end of its period.
pub async fn cancel(
    state: &AppState,
    user: &AuthUser,
    subscription_id: Option<&str>,
) -> Result<String, ApiError> {
    let mut record = active_record(state, user, subscription_id)?;
    record.request_cancel()?;

    let updated = state
        .billing()?
        .update_subscription(&record.id, &SubscriptionUpdate::cancel_at_period_end(true))
        .await?;
    let snapshot = updated.snapshot()?;
    let record = apply_and_save(state, record, |r| {
        r.mirror(&snapshot);
    })?;

    tracing::info!(user_id = %user.user_id, subscription_id = %record.id, "Cancellation scheduled");
    Ok("Subscription will be canceled at the end of the billing period".into())
}

/// Undo a scheduled cancellation.
pub async fn reactivate(
    state: &AppState,
    user: &AuthUser,
    subscription_id: Option<&str>,
) -> Result<String, ApiError> {
    let mut record = active_record(state, user, subscription_id)?;
    record.reactivate()?;

    let updated = state
        .billing()?
        .update_subscription(&record.id, &SubscriptionUpdate::cancel_at_period_end(false))
        .await?;
    let snapshot = updated.snapshot()?;
    let record = apply_and_save(state, record, |r| {
        r.mirror(&snapshot);
    })?;

    tracing::info!(user_id = %user.user_id, subscription_id = %record.id, "Subscription reactivated");
    Ok("Subscription reactivated successfully".into())
}

// =============================================================================
// Change plan
// =============================================================================

/// Move the active subscription to another tier or frequency.
///
/// Upgrades and frequency changes within a tier apply immediately with
/// proration. Downgrades switch the provider price without proration and take
/// effect locally at period end.
pub async fn change_plan(
    state: &AppState,
    user: &AuthUser,
    tier: PlanTier,
    frequency: BillingFrequency,
) -> Result<PlanChangeOutcome, ApiError> {
    ensure_self_serve(&state.config.pricing, tier, frequency)?;

    let record = active_record(state, user, None)?;
    if record.plan_id == tier.as_str() && record.frequency == frequency {
        return Err(ApiError::BadRequest("You are already on this plan".into()));
    }

    let provider = state.billing()?.as_ref();
    let price = price_for(provider, tier, frequency).await?;

    if provider.list_payment_methods(&record.customer_id).await?.is_empty() {
        return redirect_to_checkout(state, user, &record, &price).await;
    }

    let plan = PlanDescriptor::for_tier(tier, frequency);
    let subscription = provider.retrieve_subscription(&record.id).await?;
    let item_id = subscription_item(&subscription)?.id.clone();

    let (record, message) = match compare_plans(&record.plan_id, tier.as_str()) {
        PlanChange::Upgrade | PlanChange::SameTier => {
            let update = SubscriptionUpdate {
                cancel_at_period_end: Some(false),
                ..SubscriptionUpdate::swap_price(&item_id, &price.id, Proration::CreateProrations)
            };
            let updated = provider.update_subscription(&record.id, &update).await?;
            let snapshot = updated.snapshot()?;
            let record = apply_and_save(state, record, |r| {
                r.apply_plan_change(plan.clone(), &snapshot);
            })?;
            (record, "Plan updated successfully".to_string())
        }
        PlanChange::Downgrade => {
            let update = SubscriptionUpdate {
                cancel_at_period_end: Some(false),
                ..SubscriptionUpdate::swap_price(&item_id, &price.id, Proration::None)
            };
            provider.update_subscription(&record.id, &update).await?;
            let message = format!(
                "Your plan will change to {} at the end of the current billing period",
                plan.plan_name
            );
            let record = apply_and_save(state, record, |r| r.schedule_plan(plan.clone()))?;
            (record, message)
        }
    };

    tracing::info!(
        user_id = %user.user_id,
        subscription_id = %record.id,
        plan_id = %tier,
        frequency = %frequency,
        scheduled = record.scheduled_plan.is_some(),
        "Plan changed"
    );

    Ok(PlanChangeOutcome::Updated { message })
}

async fn redirect_to_checkout(
    state: &AppState,
    user: &AuthUser,
    record: &SubscriptionRecord,
    price: &Price,
) -> Result<PlanChangeOutcome, ApiError> {
    let mut metadata = BTreeMap::new();
    metadata.insert("user_id".to_string(), user.user_id.to_string());
    metadata.insert("replaces_subscription".to_string(), record.id.clone());

    let request = checkout_request(state, record.customer_id.clone(), price, None, metadata);
    let session = state.billing()?.create_checkout_session(&request).await?;
    let url = session
        .url
        .ok_or_else(|| ApiError::Internal("checkout session has no url".into()))?;

    tracing::info!(
        user_id = %user.user_id,
        subscription_id = %record.id,
        "No payment method on file; redirecting plan change to checkout"
    );
    Ok(PlanChangeOutcome::Redirect { url })
}

// =============================================================================
// Helpers
// =============================================================================

/// Enterprise and other custom-priced plans are arranged with sales.
fn ensure_self_serve(
    pricing: &PricingConfig,
    tier: PlanTier,
    frequency: BillingFrequency,
) -> Result<(), ApiError> {
    match pricing.price_for_plan(tier.as_str(), frequency) {
        PlanPrice::Fixed(_) => Ok(()),
        PlanPrice::Custom => Err(ApiError::BadRequest(format!(
            "The {} plan has custom pricing. Please contact sales.",
            tier.display_name()
        ))),
    }
}

/// The user's active subscription, optionally pinned to an id.
fn active_record(
    state: &AppState,
    user: &AuthUser,
    subscription_id: Option<&str>,
) -> Result<SubscriptionRecord, ApiError> {
    state
        .store
        .active_subscription(&user.user_id)?
        .filter(|record| subscription_id.map_or(true, |id| id == record.id))
        .ok_or_else(|| ApiError::NotFound(NO_ACTIVE_SUBSCRIPTION.into()))
}

async fn price_for(
    provider: &dyn BillingProvider,
    tier: PlanTier,
    frequency: BillingFrequency,
) -> Result<Price, ApiError> {
    let lookup_key = PricingConfig::lookup_key(tier, frequency);
    provider
        .find_price_by_lookup_key(&lookup_key)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("No price configured for {lookup_key}")))
}

/// The profile's provider customer, created on first use.
async fn ensure_customer(
    state: &AppState,
    provider: &dyn BillingProvider,
    profile: &mut Profile,
) -> Result<String, ApiError> {
    if let Some(customer_id) = &profile.stripe_customer_id {
        return Ok(customer_id.clone());
    }

    let customer = provider
        .create_customer(&profile.user_id, profile.email.as_deref())
        .await?;
    profile.stripe_customer_id = Some(customer.id.clone());
    profile.updated_at = chrono::Utc::now();
    state.store.put_profile(profile)?;

    tracing::info!(user_id = %profile.user_id, customer_id = %customer.id, "Stripe customer created");
    Ok(customer.id)
}

fn checkout_request(
    state: &AppState,
    customer_id: String,
    price: &Price,
    return_url: Option<&str>,
    metadata: BTreeMap<String, String>,
) -> CheckoutRequest {
    let base = return_url
        .unwrap_or(&state.config.frontend_url)
        .trim_end_matches('/');
    CheckoutRequest {
        customer_id,
        price_id: price.id.clone(),
        success_url: format!(
            "{base}/subscription/success?session_id={CHECKOUT_SESSION_PLACEHOLDER}"
        ),
        cancel_url: format!("{base}/subscription/cancel"),
        metadata,
    }
}
