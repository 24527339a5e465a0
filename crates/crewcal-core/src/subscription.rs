//! Subscription records and their state transitions.
//!
//! The payment provider owns the truth about a subscription. The local record
//! is a mirror that is rewritten from provider snapshots (webhooks, responses
//! to our own calls) plus a little state only we track: the loyalty discount
//! and a plan scheduled for the next period.
//!
//! ```text
//!            checkout completed
//!   none ───────────────────────▶ active ◀──────┐
//!                                  │  │ payment  │ invoice paid /
//!                                  │  │ failed   │ subscription updated
//!                                  │  ▼          │
//!                                  │ past_due ───┘
//!                                  │
//!              subscription deleted│ (from any state)
//!                                  ▼
//!                               canceled
//! ```
//!
//! `cancel_at_period_end` is a flag on `active`, set and cleared by the user.
//! The move to `canceled` is only ever observed through the provider.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::UserId;
use crate::pricing::{BillingFrequency, LoyaltyDiscount, PlanTier};

/// Subscription status, mirroring the provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid up.
    Active,
    /// Latest invoice failed; provider is retrying.
    PastDue,
    /// Ended.
    Canceled,
    /// In a trial period.
    Trialing,
    /// First payment not yet confirmed.
    Incomplete,
    /// First payment never confirmed.
    IncompleteExpired,
    /// Retries exhausted without ending the subscription.
    Unpaid,
    /// Collection paused.
    Paused,
}

impl SubscriptionStatus {
    /// Wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Trialing => "trialing",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "trialing" => Self::Trialing,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            other => return Err(CoreError::UnknownStatus(other.to_string())),
        })
    }
}

/// The provider's view of a subscription at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Provider subscription id.
    pub id: String,
    /// Provider customer id.
    pub customer_id: String,
    /// Status.
    pub status: SubscriptionStatus,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
    /// Whether the subscription ends at period end.
    pub cancel_at_period_end: bool,
    /// When the provider created the subscription.
    pub created_at: DateTime<Utc>,
    /// When the subscription ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
}

/// Which plan a subscription is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDescriptor {
    /// Plan identifier (a tier id for plans sold here).
    pub plan_id: String,
    /// Display name.
    pub plan_name: String,
    /// Billing frequency.
    pub frequency: BillingFrequency,
}

impl PlanDescriptor {
    /// Descriptor for one of our tiers.
    #[must_use]
    pub fn for_tier(tier: PlanTier, frequency: BillingFrequency) -> Self {
        let plan_name = match frequency {
            BillingFrequency::Monthly => format!("{} Plan", tier.display_name()),
            BillingFrequency::Yearly => format!("{} Plan (Yearly)", tier.display_name()),
        };
        Self {
            plan_id: tier.as_str().to_string(),
            plan_name,
            frequency,
        }
    }
}

/// A plan that replaces the current one once its period begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPlan {
    /// The plan that takes over.
    pub plan: PlanDescriptor,
    /// First instant the new plan is in force (the old period end).
    pub effective_at: DateTime<Utc>,
}

/// Local mirror of one provider subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Provider subscription id.
    pub id: String,
    /// Owning user.
    pub user_id: UserId,
    /// Provider customer id.
    pub customer_id: String,
    /// Status as last reported by the provider.
    pub status: SubscriptionStatus,
    /// Plan identifier.
    pub plan_id: String,
    /// Plan display name.
    pub plan_name: String,
    /// Billing frequency.
    pub frequency: BillingFrequency,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
    /// Whether the subscription ends at period end.
    pub cancel_at_period_end: bool,
    /// When the provider created the subscription.
    pub created_at: DateTime<Utc>,
    /// Whether the loyalty discount has been granted. Never reset.
    pub discount_applied: bool,
    /// Monthly amount (cents) taken off by the loyalty discount.
    pub discount_amount_cents: i64,
    /// Plan taking over at the next period, for downgrades.
    #[serde(default)]
    pub scheduled_plan: Option<ScheduledPlan>,
    /// When the subscription ended.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Write counter; the store rejects writes based on a stale version.
    #[serde(default)]
    pub version: u64,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// A new record from a completed checkout.
    #[must_use]
    pub fn from_checkout(
        user_id: UserId,
        snapshot: &SubscriptionSnapshot,
        plan: PlanDescriptor,
    ) -> Self {
        Self {
            id: snapshot.id.clone(),
            user_id,
            customer_id: snapshot.customer_id.clone(),
            status: snapshot.status,
            plan_id: plan.plan_id,
            plan_name: plan.plan_name,
            frequency: plan.frequency,
            current_period_start: snapshot.current_period_start,
            current_period_end: snapshot.current_period_end,
            cancel_at_period_end: snapshot.cancel_at_period_end,
            created_at: snapshot.created_at,
            discount_applied: false,
            discount_amount_cents: 0,
            scheduled_plan: None,
            ended_at: snapshot.ended_at,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Re-apply a completed checkout to an existing record.
    ///
    /// Everything provider-owned is overwritten; the loyalty discount is kept.
    pub fn refresh_from_checkout(&mut self, snapshot: &SubscriptionSnapshot, plan: PlanDescriptor) {
        self.customer_id.clone_from(&snapshot.customer_id);
        self.created_at = snapshot.created_at;
        self.set_plan(plan);
        self.mirror(snapshot);
    }

    /// Copy status, cancellation flag and period from a provider snapshot.
    ///
    /// A period ending earlier than the one already stored is ignored, so a
    /// late redelivery cannot roll the period back. Returns `false` when that
    /// happened.
    pub fn mirror(&mut self, snapshot: &SubscriptionSnapshot) -> bool {
        self.status = snapshot.status;
        self.cancel_at_period_end = snapshot.cancel_at_period_end;
        if snapshot.ended_at.is_some() {
            self.ended_at = snapshot.ended_at;
        }
        let accepted = snapshot.current_period_end >= self.current_period_end;
        if accepted {
            self.current_period_start = snapshot.current_period_start;
            self.current_period_end = snapshot.current_period_end;
        }
        self.touch();
        accepted
    }

    /// The latest invoice failed.
    pub fn mark_past_due(&mut self) {
        self.status = SubscriptionStatus::PastDue;
        self.touch();
    }

    /// The provider ended the subscription.
    pub fn mark_deleted(&mut self, ended_at: DateTime<Utc>) {
        self.status = SubscriptionStatus::Canceled;
        self.cancel_at_period_end = false;
        self.scheduled_plan = None;
        self.ended_at = Some(ended_at);
        self.touch();
    }

    /// Check the subscription is active before a user action.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` for any other status.
    pub fn ensure_active(&self, action: &'static str) -> Result<()> {
        if self.status == SubscriptionStatus::Active {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                status: self.status,
                action,
            })
        }
    }

    /// Schedule cancellation at period end. Status stays `active`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` unless the subscription is active.
    pub fn request_cancel(&mut self) -> Result<()> {
        self.ensure_active("cancel")?;
        self.cancel_at_period_end = true;
        self.touch();
        Ok(())
    }

    /// Undo a scheduled cancellation.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` unless active, and
    /// `CoreError::NotPendingCancellation` when no cancellation is scheduled.
    pub fn reactivate(&mut self) -> Result<()> {
        self.ensure_active("reactivate")?;
        if !self.cancel_at_period_end {
            return Err(CoreError::NotPendingCancellation);
        }
        self.cancel_at_period_end = false;
        self.touch();
        Ok(())
    }

    /// Switch plans immediately.
    ///
    /// The snapshot is the provider's answer to the price change and may start
    /// a new period (e.g. on a frequency change), so it is taken as is.
    pub fn apply_plan_change(&mut self, plan: PlanDescriptor, snapshot: &SubscriptionSnapshot) {
        self.set_plan(plan);
        self.scheduled_plan = None;
        self.status = snapshot.status;
        self.cancel_at_period_end = snapshot.cancel_at_period_end;
        self.current_period_start = snapshot.current_period_start;
        self.current_period_end = snapshot.current_period_end;
        self.touch();
    }

    /// Keep the current plan until period end, then switch to `plan`.
    pub fn schedule_plan(&mut self, plan: PlanDescriptor) {
        self.scheduled_plan = Some(ScheduledPlan {
            plan,
            effective_at: self.current_period_end,
        });
        self.cancel_at_period_end = false;
        self.touch();
    }

    /// Make a scheduled plan current once the period it was waiting for has begun.
    ///
    /// Returns `true` when a plan was promoted.
    pub fn promote_scheduled_plan(&mut self) -> bool {
        let due = self
            .scheduled_plan
            .as_ref()
            .is_some_and(|s| self.current_period_start >= s.effective_at);
        if !due {
            return false;
        }
        if let Some(scheduled) = self.scheduled_plan.take() {
            self.set_plan(scheduled.plan);
            self.touch();
        }
        true
    }

    /// Whole calendar months between creation and `now`.
    #[must_use]
    pub fn months_since_creation(&self, now: DateTime<Utc>) -> i32 {
        months_between(self.created_at, now)
    }

    /// Whether an invoice of `charged_cents` qualifies for the loyalty discount.
    #[must_use]
    pub fn loyalty_discount_due(
        &self,
        charged_cents: i64,
        now: DateTime<Utc>,
        loyalty: &LoyaltyDiscount,
    ) -> bool {
        self.frequency == BillingFrequency::Monthly
            && !self.discount_applied
            && self.months_since_creation(now) >= loyalty.min_months
            && charged_cents == loyalty.full_amount_cents
    }

    /// Record the loyalty discount. The amount is recomputed, not accumulated.
    pub fn apply_loyalty_discount(&mut self, discounted_cents: i64, loyalty: &LoyaltyDiscount) {
        self.discount_applied = true;
        self.discount_amount_cents = (loyalty.full_amount_cents - discounted_cents).max(0);
        self.touch();
    }

    /// Whether this record counts as the user's live subscription.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    fn set_plan(&mut self, plan: PlanDescriptor) {
        self.plan_id = plan.plan_id;
        self.plan_name = plan.plan_name;
        self.frequency = plan.frequency;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Calendar-month difference, ignoring the day of month.
#[must_use]
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let from_months = from.year() * 12 + month0(from);
    let to_months = to.year() * 12 + month0(to);
    to_months - from_months
}

fn month0(date: DateTime<Utc>) -> i32 {
    i32::try_from(date.month0()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn snapshot(start: DateTime<Utc>, end: DateTime<Utc>) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            id: "sub_123".into(),
            customer_id: "cus_123".into(),
            status: SubscriptionStatus::Active,
            current_period_start: start,
            current_period_end: end,
            cancel_at_period_end: false,
            created_at: at(2024, 1, 31),
            ended_at: None,
        }
    }

    fn record() -> SubscriptionRecord {
        SubscriptionRecord::from_checkout(
            UserId::generate(),
            &snapshot(at(2024, 1, 31), at(2024, 2, 29)),
            PlanDescriptor::for_tier(PlanTier::Growth, BillingFrequency::Monthly),
        )
    }

    #[test]
    fn checkout_creates_active_undiscounted_record() {
        let rec = record();
        assert_eq!(rec.status, SubscriptionStatus::Active);
        assert_eq!(rec.plan_id, "growth");
        assert_eq!(rec.plan_name, "Growth Plan");
        assert!(!rec.discount_applied);
        assert_eq!(rec.version, 0);
    }

    #[test]
    fn months_between_ignores_day_of_month() {
        assert_eq!(months_between(at(2024, 1, 31), at(2024, 5, 1)), 4);
        assert_eq!(months_between(at(2023, 11, 15), at(2024, 2, 14)), 3);
        assert_eq!(months_between(at(2024, 5, 1), at(2024, 5, 31)), 0);
    }

    #[test]
    fn loyalty_discount_requires_every_condition() {
        let loyalty = LoyaltyDiscount::default();
        let mut rec = record();
        let four_months = at(2024, 5, 2);

        assert!(rec.loyalty_discount_due(24_900, four_months, &loyalty));
        assert!(!rec.loyalty_discount_due(24_900, at(2024, 4, 30), &loyalty));
        assert!(!rec.loyalty_discount_due(9_900, four_months, &loyalty));

        rec.frequency = BillingFrequency::Yearly;
        assert!(!rec.loyalty_discount_due(24_900, four_months, &loyalty));
        rec.frequency = BillingFrequency::Monthly;

        rec.apply_loyalty_discount(9_900, &loyalty);
        assert_eq!(rec.discount_amount_cents, 15_000);
        assert!(!rec.loyalty_discount_due(24_900, four_months, &loyalty));

        // Applying again recomputes rather than adding up.
        rec.apply_loyalty_discount(9_900, &loyalty);
        assert_eq!(rec.discount_amount_cents, 15_000);
    }

    #[test]
    fn mirror_refuses_to_move_period_backwards() {
        let mut rec = record();
        let newer = snapshot(at(2024, 2, 29), at(2024, 3, 31));
        assert!(rec.mirror(&newer));
        assert_eq!(rec.current_period_end, at(2024, 3, 31));

        let mut stale = snapshot(at(2024, 1, 31), at(2024, 2, 29));
        stale.status = SubscriptionStatus::PastDue;
        assert!(!rec.mirror(&stale));
        assert_eq!(rec.current_period_end, at(2024, 3, 31));
        assert_eq!(rec.status, SubscriptionStatus::PastDue);
    }

    #[test]
    fn plan_change_may_restart_period() {
        let mut rec = record();
        rec.schedule_plan(PlanDescriptor::for_tier(
            PlanTier::Starter,
            BillingFrequency::Monthly,
        ));
        let restarted = snapshot(at(2024, 2, 10), at(2025, 2, 10));
        rec.apply_plan_change(
            PlanDescriptor::for_tier(PlanTier::Growth, BillingFrequency::Yearly),
            &restarted,
        );
        assert_eq!(rec.frequency, BillingFrequency::Yearly);
        assert_eq!(rec.current_period_start, at(2024, 2, 10));
        assert!(rec.scheduled_plan.is_none());
    }

    #[test]
    fn cancel_and_reactivate_only_from_active() {
        let mut rec = record();
        assert_eq!(rec.reactivate(), Err(CoreError::NotPendingCancellation));
        rec.request_cancel().unwrap();
        assert!(rec.cancel_at_period_end);
        assert_eq!(rec.status, SubscriptionStatus::Active);
        rec.reactivate().unwrap();
        assert!(!rec.cancel_at_period_end);

        rec.mark_past_due();
        assert!(matches!(
            rec.request_cancel(),
            Err(CoreError::InvalidTransition { action: "cancel", .. })
        ));
    }

    #[test]
    fn deletion_cancels_from_any_state() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Trialing,
        ] {
            let mut rec = record();
            rec.status = status;
            rec.cancel_at_period_end = true;
            rec.mark_deleted(at(2024, 3, 1));
            assert_eq!(rec.status, SubscriptionStatus::Canceled);
            assert!(!rec.cancel_at_period_end);
            assert_eq!(rec.ended_at, Some(at(2024, 3, 1)));
        }
    }

    #[test]
    fn scheduled_plan_takes_over_when_its_period_starts() {
        let mut rec = record();
        rec.schedule_plan(PlanDescriptor::for_tier(
            PlanTier::Starter,
            BillingFrequency::Monthly,
        ));
        assert!(!rec.promote_scheduled_plan());
        assert_eq!(rec.plan_id, "growth");

        rec.mirror(&snapshot(at(2024, 2, 29), at(2024, 3, 31)));
        assert!(rec.promote_scheduled_plan());
        assert_eq!(rec.plan_id, "starter");
        assert!(rec.scheduled_plan.is_none());
    }

    #[test]
    fn status_parses_provider_strings() {
        assert_eq!(
            "past_due".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::PastDue
        );
        assert!("bogus".parse::<SubscriptionStatus>().is_err());
    }
}
