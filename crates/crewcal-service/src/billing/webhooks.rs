//! Reconciliation of Stripe events into local subscription records.
//!
//! Every handler is safe to replay: records are upserted by subscription id
//! and the loyalty discount is recomputed rather than accumulated. Events
//! about subscriptions we have no record of are logged and acknowledged.

use chrono::Utc;

use crewcal_core::{SubscriptionRecord, UserId};

use crate::error::ApiError;
use crate::provider::{BillingProvider, Proration, SubscriptionUpdate};
use crate::state::AppState;
use crate::stripe::{CheckoutSession, Invoice, Subscription, WebhookEvent};

use super::{resolve_plan, save, subscription_item, sync_profile_status};

/// Apply one verified webhook event.
pub async fn handle_event(state: &AppState, event: &WebhookEvent) -> Result<(), ApiError> {
    let object = event.data.object.clone();
    let parse_error = |e: serde_json::Error| {
        ApiError::BadRequest(format!("Malformed {} payload: {e}", event.event_type))
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = serde_json::from_value(object).map_err(parse_error)?;
            checkout_completed(state, &session).await
        }
        "invoice.paid" => {
            let invoice: Invoice = serde_json::from_value(object).map_err(parse_error)?;
            invoice_paid(state, &invoice).await
        }
        "invoice.payment_failed" => {
            let invoice: Invoice = serde_json::from_value(object).map_err(parse_error)?;
            payment_failed(state, &invoice)
        }
        "customer.subscription.updated" => {
            let subscription: Subscription = serde_json::from_value(object).map_err(parse_error)?;
            subscription_updated(state, &subscription)
        }
        "customer.subscription.deleted" => {
            let subscription: Subscription = serde_json::from_value(object).map_err(parse_error)?;
            subscription_deleted(state, &subscription)
        }
        other => {
            tracing::debug!(event_type = %other, event_id = %event.id, "Unhandled Stripe event");
            Ok(())
        }
    }
}

// =============================================================================
// checkout.session.completed
// =============================================================================

async fn checkout_completed(state: &AppState, session: &CheckoutSession) -> Result<(), ApiError> {
    let Some(subscription_id) = session.subscription.as_deref() else {
        tracing::warn!(session_id = %session.id, "Checkout session has no subscription");
        return Ok(());
    };
    let Some(user_id) = session
        .metadata
        .get("user_id")
        .and_then(|raw| raw.parse::<UserId>().ok())
    else {
        tracing::warn!(session_id = %session.id, "Checkout session has no usable user_id");
        return Ok(());
    };

    let provider = state.billing()?.as_ref();
    let subscription = provider.retrieve_subscription(subscription_id).await?;
    let snapshot = subscription.snapshot()?;
    let plan = resolve_plan(provider, &subscription).await?;

    let record = match state.store.get_subscription(subscription_id)? {
        Some(mut existing) => {
            existing.refresh_from_checkout(&snapshot, plan);
            existing
        }
        None => SubscriptionRecord::from_checkout(user_id, &snapshot, plan),
    };
    save(state, &record)?;

    let mut profile = match state.store.get_profile(&user_id)? {
        Some(profile) => profile,
        None => crewcal_core::Profile::new(user_id, None),
    };
    profile.link_billing(&record.customer_id, record.status);
    state.store.put_profile(&profile)?;

    tracing::info!(
        user_id = %user_id,
        subscription_id = %record.id,
        plan_id = %record.plan_id,
        status = %record.status,
        "Checkout completed"
    );

    if let Some(replaced) = session.metadata.get("replaces_subscription") {
        if replaced != subscription_id {
            retire_replaced(state, provider, &user_id, replaced).await?;
        }
    }

    Ok(())
}

/// End the subscription a plan-change checkout replaced.
async fn retire_replaced(
    state: &AppState,
    provider: &dyn BillingProvider,
    user_id: &UserId,
    replaced_id: &str,
) -> Result<(), ApiError> {
    let existing = state.store.get_subscription(replaced_id)?;
    if existing.as_ref().is_some_and(|r| r.user_id != *user_id) {
        tracing::warn!(
            user_id = %user_id,
            subscription_id = %replaced_id,
            "Refusing to cancel a subscription owned by another user"
        );
        return Ok(());
    }
    if existing.as_ref().is_some_and(|r| r.ended_at.is_some()) {
        return Ok(());
    }

    let ended = provider.cancel_subscription_now(replaced_id).await?;
    tracing::info!(subscription_id = %replaced_id, "Replaced subscription canceled");

    if let Some(mut record) = existing {
        let ended_at = ended.snapshot()?.ended_at.unwrap_or_else(Utc::now);
        record.mark_deleted(ended_at);
        save(state, &record)?;
    }
    Ok(())
}

// =============================================================================
// invoice.paid
// =============================================================================

async fn invoice_paid(state: &AppState, invoice: &Invoice) -> Result<(), ApiError> {
    let Some(subscription_id) = invoice.subscription.as_deref() else {
        tracing::debug!(invoice_id = %invoice.id, "Invoice is not for a subscription");
        return Ok(());
    };
    let Some(mut record) = state.store.get_subscription(subscription_id)? else {
        tracing::warn!(
            invoice_id = %invoice.id,
            subscription_id = %subscription_id,
            "Invoice paid for unknown subscription; skipping"
        );
        return Ok(());
    };

    let provider = state.billing()?.as_ref();
    let subscription = provider.retrieve_subscription(subscription_id).await?;
    if !record.mirror(&subscription.snapshot()?) {
        tracing::warn!(subscription_id = %subscription_id, "Ignoring stale billing period");
    }
    if record.promote_scheduled_plan() {
        tracing::info!(subscription_id = %subscription_id, plan_id = %record.plan_id, "Scheduled plan now in force");
    }

    let loyalty = &state.config.pricing.loyalty;
    let charged = invoice.first_line_amount().unwrap_or(invoice.amount_paid);
    if record.loyalty_discount_due(charged, Utc::now(), loyalty) {
        match provider
            .find_price_by_lookup_key(&loyalty.discounted_lookup_key)
            .await?
        {
            Some(price) => {
                let item = subscription_item(&subscription)?;
                provider
                    .update_subscription(
                        subscription_id,
                        &SubscriptionUpdate::swap_price(&item.id, &price.id, Proration::None),
                    )
                    .await?;
                record.apply_loyalty_discount(price.unit_amount.unwrap_or_default(), loyalty);
                tracing::info!(
                    subscription_id = %subscription_id,
                    discount_amount_cents = record.discount_amount_cents,
                    "Loyalty discount applied"
                );
            }
            None => tracing::warn!(
                lookup_key = %loyalty.discounted_lookup_key,
                "Discounted price not found; loyalty discount skipped"
            ),
        }
    }

    save(state, &record)?;
    sync_profile_status(state, &record.user_id, record.status)
}

// =============================================================================
// invoice.payment_failed
// =============================================================================

fn payment_failed(state: &AppState, invoice: &Invoice) -> Result<(), ApiError> {
    let Some(mut record) = known_record(state, invoice.subscription.as_deref())? else {
        return Ok(());
    };

    record.mark_past_due();
    save(state, &record)?;
    tracing::info!(subscription_id = %record.id, "Subscription past due");
    sync_profile_status(state, &record.user_id, record.status)
}

// =============================================================================
// customer.subscription.updated / deleted
// =============================================================================

fn subscription_updated(state: &AppState, subscription: &Subscription) -> Result<(), ApiError> {
    let Some(mut record) = known_record(state, Some(&subscription.id))? else {
        return Ok(());
    };

    if !record.mirror(&subscription.snapshot()?) {
        tracing::warn!(subscription_id = %subscription.id, "Ignoring stale billing period");
    }
    record.promote_scheduled_plan();
    save(state, &record)?;
    sync_profile_status(state, &record.user_id, record.status)
}

fn subscription_deleted(state: &AppState, subscription: &Subscription) -> Result<(), ApiError> {
    let Some(mut record) = known_record(state, Some(&subscription.id))? else {
        return Ok(());
    };

    let ended_at = subscription.snapshot()?.ended_at.unwrap_or_else(Utc::now);
    record.mark_deleted(ended_at);
    save(state, &record)?;
    tracing::info!(subscription_id = %record.id, "Subscription canceled");
    sync_profile_status(state, &record.user_id, record.status)
}

fn known_record(
    state: &AppState,
    subscription_id: Option<&str>,
) -> Result<Option<SubscriptionRecord>, ApiError> {
    let Some(subscription_id) = subscription_id else {
        return Ok(None);
    };
    let record = state.store.get_subscription(subscription_id)?;
    if record.is_none() {
        tracing::warn!(subscription_id = %subscription_id, "Event for unknown subscription; skipping");
    }
    Ok(record)
}
