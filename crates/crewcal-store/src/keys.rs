//! Key encoding for `RocksDB` column families.

use crewcal_core::{Department, SystemAccountId, TeamMember, UserId};

/// Key of a subscription record.
#[must_use]
pub fn subscription_key(subscription_id: &str) -> Vec<u8> {
    subscription_id.as_bytes().to_vec()
}

/// User index key.
///
/// Format: `user_id (16 bytes) || subscription_id (utf-8)`
#[must_use]
pub fn user_subscription_key(user_id: &UserId, subscription_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + subscription_id.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(subscription_id.as_bytes());
    key
}

/// Prefix covering every index entry of a user.
#[must_use]
pub fn user_subscriptions_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Subscription id from a user index key, or `None` if the key is malformed.
#[must_use]
pub fn subscription_id_from_user_key(key: &[u8]) -> Option<&str> {
    key.get(16..).and_then(|rest| std::str::from_utf8(rest).ok())
}

/// Key of a profile.
#[must_use]
pub fn profile_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Prefix covering every record of a system account.
#[must_use]
pub fn account_prefix(account: &SystemAccountId) -> Vec<u8> {
    account.as_bytes().to_vec()
}

/// Department key: `system_account_id (16) || department_id (16)`.
#[must_use]
pub fn department_key(department: &Department) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(department.system_account_id.as_bytes());
    key.extend_from_slice(department.id.as_bytes());
    key
}

/// Team member key: `system_account_id (16) || team_member_id (16)`.
///
/// ULIDs sort by time, so a prefix scan yields members in creation order.
#[must_use]
pub fn team_member_key(member: &TeamMember) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(member.system_account_id.as_bytes());
    key.extend_from_slice(&member.id.to_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_subscription_key_layout() {
        let user_id = UserId::generate();
        let key = user_subscription_key(&user_id, "sub_123");
        assert_eq!(&key[..16], user_id.as_bytes());
        assert!(key.starts_with(&user_subscriptions_prefix(&user_id)));
        assert_eq!(subscription_id_from_user_key(&key), Some("sub_123"));
    }

    #[test]
    fn malformed_index_key_yields_none() {
        assert_eq!(subscription_id_from_user_key(&[1, 2, 3]), None);
        assert_eq!(subscription_id_from_user_key(&[0xff; 20]), None);
    }

    #[test]
    fn department_key_is_scoped_by_account() {
        let account = SystemAccountId::generate();
        let department = Department::new(account, "Sales");
        let key = department_key(&department);
        assert_eq!(key.len(), 32);
        assert!(key.starts_with(&account_prefix(&account)));
    }
}
