//! User profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SystemAccountId, UserId};
use crate::subscription::SubscriptionStatus;

/// Per-user settings and billing links.
///
/// A profile is created the first time a user reaches the API, and a system
/// account is allocated for it at that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// The user.
    pub user_id: UserId,
    /// Email from the identity token, if present.
    pub email: Option<String>,
    /// The account owning this user's team members and departments.
    pub system_account_id: SystemAccountId,
    /// Payment-provider customer id, set on first checkout.
    pub stripe_customer_id: Option<String>,
    /// Status of the user's subscription as last reported by the provider.
    pub subscription_status: Option<SubscriptionStatus>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile bound to a newly allocated system account.
    #[must_use]
    pub fn new(user_id: UserId, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email,
            system_account_id: SystemAccountId::generate(),
            stripe_customer_id: None,
            subscription_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the provider customer and mirrored subscription status.
    pub fn link_billing(&mut self, customer_id: &str, status: SubscriptionStatus) {
        self.stripe_customer_id = Some(customer_id.to_string());
        self.subscription_status = Some(status);
        self.updated_at = Utc::now();
    }

    /// Mirror a subscription status change.
    pub fn set_subscription_status(&mut self, status: SubscriptionStatus) {
        self.subscription_status = Some(status);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_profile_has_no_billing_link() {
        let user_id = UserId::generate();
        let mut profile = Profile::new(user_id, Some("ada@example.com".into()));
        assert_eq!(profile.user_id, user_id);
        assert!(profile.stripe_customer_id.is_none());
        assert!(profile.subscription_status.is_none());

        let json = serde_json::to_value(&profile).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            [
                "created_at",
                "email",
                "stripe_customer_id",
                "subscription_status",
                "system_account_id",
                "updated_at",
                "user_id"
            ]
        );

        profile.link_billing("cus_1", SubscriptionStatus::Active);
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(profile.subscription_status, Some(SubscriptionStatus::Active));
    }
}
