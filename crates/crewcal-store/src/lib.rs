//! `RocksDB` storage layer for crewcal.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `subscriptions`: subscription mirrors, keyed by provider subscription id
//! - `subscriptions_by_user`: index for finding a user's subscriptions
//! - `profiles`: per-user profile, keyed by `user_id`
//! - `departments`: keyed by `system_account_id || department_id`
//! - `team_members`: keyed by `system_account_id || team_member_id`
//!
//! Subscription writes are compare-and-swap on the record's `version`: a
//! webhook and a user action racing on the same subscription cannot silently
//! overwrite each other.
//!
//! # Example
//!
//! ```no_run
//! use crewcal_core::{Profile, UserId};
//! use crewcal_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/crewcal-db").unwrap();
//!
//! let profile = Profile::new(UserId::generate(), None);
//! store.put_profile(&profile).unwrap();
//! let members = store.list_team_members(&profile.system_account_id).unwrap();
//! assert!(members.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use crewcal_core::{Department, Profile, SubscriptionRecord, SystemAccountId, TeamMember, UserId};

/// The storage trait defining all database operations.
pub trait Store: Send + Sync {
    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Get a subscription by provider id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, subscription_id: &str) -> Result<Option<SubscriptionRecord>>;

    /// Insert or update a subscription, maintaining the user index.
    ///
    /// `record.version` must equal the stored version (0 when absent). The
    /// stored copy gets the next version, which is returned.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::VersionConflict` if the stored record moved on.
    fn save_subscription(&self, record: &SubscriptionRecord) -> Result<u64>;

    /// All subscriptions a user has ever had.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_subscriptions_by_user(&self, user_id: &UserId) -> Result<Vec<SubscriptionRecord>>;

    /// The user's live subscription, newest first if several are active.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn active_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>> {
        Ok(self
            .list_subscriptions_by_user(user_id)?
            .into_iter()
            .filter(SubscriptionRecord::is_active)
            .max_by_key(|s| s.created_at))
    }

    /// The subscription to show the user: the active one, else the most recent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn current_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>> {
        let all = self.list_subscriptions_by_user(user_id)?;
        let active = all
            .iter()
            .filter(|s| s.is_active())
            .max_by_key(|s| s.created_at)
            .cloned();
        Ok(active.or_else(|| all.into_iter().max_by_key(|s| s.created_at)))
    }

    // =========================================================================
    // Profile Operations
    // =========================================================================

    /// Get a profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;

    /// Insert or replace a profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_profile(&self, profile: &Profile) -> Result<()>;

    // =========================================================================
    // Department Operations
    // =========================================================================

    /// Departments of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_departments(&self, account: &SystemAccountId) -> Result<Vec<Department>>;

    /// Insert departments in a single atomic batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is written then.
    fn insert_departments(&self, departments: &[Department]) -> Result<()>;

    // =========================================================================
    // Team Member Operations
    // =========================================================================

    /// Insert one team member.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_team_member(&self, member: &TeamMember) -> Result<()>;

    /// Team members of an account, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_team_members(&self, account: &SystemAccountId) -> Result<Vec<TeamMember>>;
}
