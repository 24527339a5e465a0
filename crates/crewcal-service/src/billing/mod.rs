//! Subscription billing.
//!
//! Two kinds of writers touch a subscription record:
//!
//! - [`webhooks`] reconciles provider events into the local mirror
//! - [`actions`] carries out user requests (checkout, plan change, cancel,
//!   reactivate) at the provider and mirrors the result
//!
//! Both read the record, mutate it through the transitions on
//! [`SubscriptionRecord`], and save it with the version they read. A write
//! that lost a race fails with a version conflict instead of overwriting.
//! User actions have already been accepted by the provider when they save, so
//! they re-apply their transition to the fresh record instead of failing.

pub mod actions;
pub mod webhooks;

use crewcal_core::{
    BillingFrequency, PlanDescriptor, PlanTier, SubscriptionRecord, SubscriptionStatus, UserId,
};

use crewcal_store::StoreError;

use crate::error::ApiError;
use crate::provider::BillingProvider;
use crate::state::AppState;
use crate::stripe::{StripeError, Subscription, SubscriptionItem};

/// The single item of a subscription.
pub(crate) fn subscription_item(subscription: &Subscription) -> Result<&SubscriptionItem, ApiError> {
    subscription.first_item().ok_or_else(|| {
        StripeError::Unexpected(format!("subscription {} has no items", subscription.id)).into()
    })
}

/// Work out which plan a provider subscription is on.
///
/// The price lookup key (`{tier}_{frequency}`) wins. Prices without one, such
/// as the loyalty price, fall back to the product's `plan_id` metadata and the
/// price's recurring interval.
pub(crate) async fn resolve_plan(
    provider: &dyn BillingProvider,
    subscription: &Subscription,
) -> Result<PlanDescriptor, ApiError> {
    let price = &subscription_item(subscription)?.price;

    if let Some((tier, frequency)) = price.lookup_key.as_deref().and_then(PlanTier::from_lookup_key) {
        return Ok(PlanDescriptor::for_tier(tier, frequency));
    }

    let product = provider.retrieve_product(&price.product).await?;
    let frequency = price
        .recurring
        .as_ref()
        .and_then(|r| BillingFrequency::from_interval(&r.interval))
        .unwrap_or_default();
    let plan_id = product.metadata.get("plan_id").cloned();

    Ok(match plan_id.as_deref().map(str::parse::<PlanTier>) {
        Some(Ok(tier)) => PlanDescriptor::for_tier(tier, frequency),
        _ => {
            tracing::warn!(
                subscription_id = %subscription.id,
                product_id = %product.id,
                "Product carries no known plan_id; using product name"
            );
            PlanDescriptor {
                plan_id: plan_id.unwrap_or(product.id),
                plan_name: product.name,
                frequency,
            }
        }
    })
}

/// Persist a record, rejecting stale writes.
pub(crate) fn save(state: &AppState, record: &SubscriptionRecord) -> Result<(), ApiError> {
    state.store.save_subscription(record)?;
    Ok(())
}

/// Saves a user action makes before giving up on concurrent writers.
const SAVE_ATTEMPTS: usize = 3;

/// Apply a transition the provider has already accepted and persist it.
///
/// If another writer saved the record in between, the stored record is read
/// again and `apply` replayed on it. The provider is not called again.
pub(crate) fn apply_and_save<F>(
    state: &AppState,
    mut record: SubscriptionRecord,
    apply: F,
) -> Result<SubscriptionRecord, ApiError>
where
    F: Fn(&mut SubscriptionRecord),
{
    apply(&mut record);
    let mut attempt = 1;
    loop {
        match state.store.save_subscription(&record) {
            Ok(_) => return Ok(record),
            Err(StoreError::VersionConflict {
                id,
                expected,
                found,
            }) if attempt < SAVE_ATTEMPTS => {
                tracing::debug!(
                    subscription_id = %id,
                    expected,
                    found,
                    attempt,
                    "Subscription changed concurrently; re-applying"
                );
                record = state
                    .store
                    .get_subscription(&id)?
                    .ok_or_else(|| ApiError::NotFound(format!("Subscription {id} not found")))?;
                apply(&mut record);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Mirror a subscription status onto the owner's profile, if it exists.
pub(crate) fn sync_profile_status(
    state: &AppState,
    user_id: &UserId,
    status: SubscriptionStatus,
) -> Result<(), ApiError> {
    match state.store.get_profile(user_id)? {
        Some(mut profile) => {
            profile.set_subscription_status(status);
            state.store.put_profile(&profile)?;
        }
        None => tracing::debug!(user_id = %user_id, "No profile to update"),
    }
    Ok(())
}
