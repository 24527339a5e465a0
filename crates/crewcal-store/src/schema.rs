//! Column families used in `RocksDB` storage.

/// Column family names.
pub mod cf {
    /// Subscription records, keyed by provider subscription id.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Index: subscriptions by user, keyed by `user_id || subscription_id`.
    /// Value is empty.
    pub const SUBSCRIPTIONS_BY_USER: &str = "subscriptions_by_user";

    /// Profiles, keyed by `user_id`.
    pub const PROFILES: &str = "profiles";

    /// Departments, keyed by `system_account_id || department_id`.
    pub const DEPARTMENTS: &str = "departments";

    /// Team members, keyed by `system_account_id || team_member_id` (ULID).
    pub const TEAM_MEMBERS: &str = "team_members";
}

/// All column family names, for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::SUBSCRIPTIONS,
        cf::SUBSCRIPTIONS_BY_USER,
        cf::PROFILES,
        cf::DEPARTMENTS,
        cf::TEAM_MEMBERS,
    ]
}
