//! `RocksDB` storage implementation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crewcal_core::{Department, Profile, SubscriptionRecord, SystemAccountId, TeamMember, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serialises subscription read-check-write cycles.
    subscription_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            subscription_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect every `(key, value)` under `prefix` in key order.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn get_subscription(&self, subscription_id: &str) -> Result<Option<SubscriptionRecord>> {
        self.get_value(cf::SUBSCRIPTIONS, &keys::subscription_key(subscription_id))
    }

    fn save_subscription(&self, record: &SubscriptionRecord) -> Result<u64> {
        let _guard = self
            .subscription_lock
            .lock()
            .map_err(|_| StoreError::Database("subscription lock poisoned".into()))?;

        let found = self
            .get_subscription(&record.id)?
            .map_or(0, |stored| stored.version);
        if found != record.version {
            return Err(StoreError::VersionConflict {
                id: record.id.clone(),
                expected: record.version,
                found,
            });
        }

        let mut stored = record.clone();
        stored.version = found + 1;

        let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
        let cf_by_user = self.cf(cf::SUBSCRIPTIONS_BY_USER)?;
        let value = Self::serialize(&stored)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_subs, keys::subscription_key(&stored.id), &value);
        batch.put_cf(
            &cf_by_user,
            keys::user_subscription_key(&stored.user_id, &stored.id),
            b"",
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            subscription_id = %stored.id,
            version = stored.version,
            status = %stored.status,
            "Subscription saved"
        );

        Ok(stored.version)
    }

    fn list_subscriptions_by_user(&self, user_id: &UserId) -> Result<Vec<SubscriptionRecord>> {
        let prefix = keys::user_subscriptions_prefix(user_id);
        let mut records = Vec::new();

        for (key, _) in self.scan_prefix(cf::SUBSCRIPTIONS_BY_USER, &prefix)? {
            let Some(subscription_id) = keys::subscription_id_from_user_key(&key) else {
                tracing::warn!(key_len = key.len(), "Skipping malformed subscription index key");
                continue;
            };
            if let Some(record) = self.get_subscription(subscription_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }

    // =========================================================================
    // Profile Operations
    // =========================================================================

    fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        self.get_value(cf::PROFILES, &keys::profile_key(user_id))
    }

    fn put_profile(&self, profile: &Profile) -> Result<()> {
        let cf = self.cf(cf::PROFILES)?;
        let value = Self::serialize(profile)?;

        self.db
            .put_cf(&cf, keys::profile_key(&profile.user_id), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Department Operations
    // =========================================================================

    fn list_departments(&self, account: &SystemAccountId) -> Result<Vec<Department>> {
        self.scan_prefix(cf::DEPARTMENTS, &keys::account_prefix(account))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn insert_departments(&self, departments: &[Department]) -> Result<()> {
        if departments.is_empty() {
            return Ok(());
        }

        let cf = self.cf(cf::DEPARTMENTS)?;
        let mut batch = WriteBatch::default();
        for department in departments {
            batch.put_cf(&cf, keys::department_key(department), Self::serialize(department)?);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Team Member Operations
    // =========================================================================

    fn insert_team_member(&self, member: &TeamMember) -> Result<()> {
        let cf = self.cf(cf::TEAM_MEMBERS)?;
        let value = Self::serialize(member)?;

        self.db
            .put_cf(&cf, keys::team_member_key(member), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_team_members(&self, account: &SystemAccountId) -> Result<Vec<TeamMember>> {
        self.scan_prefix(cf::TEAM_MEMBERS, &keys::account_prefix(account))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use crewcal_core::{
        BillingFrequency, ImportedMember, PlanDescriptor, PlanTier, SubscriptionSnapshot,
        SubscriptionStatus,
    };
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn subscription(user_id: UserId, id: &str, created_day: u32) -> SubscriptionRecord {
        let created = Utc.with_ymd_and_hms(2024, 1, created_day, 0, 0, 0).unwrap();
        SubscriptionRecord::from_checkout(
            user_id,
            &SubscriptionSnapshot {
                id: id.into(),
                customer_id: "cus_1".into(),
                status: SubscriptionStatus::Active,
                current_period_start: created,
                current_period_end: Utc.with_ymd_and_hms(2024, 2, created_day, 0, 0, 0).unwrap(),
                cancel_at_period_end: false,
                created_at: created,
                ended_at: None,
            },
            PlanDescriptor::for_tier(PlanTier::Growth, BillingFrequency::Monthly),
        )
    }

    fn member(account: SystemAccountId, name: &str) -> TeamMember {
        TeamMember::from_import(
            account,
            &ImportedMember {
                name: name.into(),
                email: format!("{name}@example.com"),
                department: Some("Sales".into()),
                gender: crewcal_core::Gender::Other,
                active: true,
                birthday: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            },
        )
    }

    #[test]
    fn subscription_save_bumps_version() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let mut record = subscription(user_id, "sub_1", 1);

        record.version = store.save_subscription(&record).unwrap();
        assert_eq!(record.version, 1);

        record.request_cancel().unwrap();
        record.version = store.save_subscription(&record).unwrap();
        assert_eq!(record.version, 2);

        let stored = store.get_subscription("sub_1").unwrap().unwrap();
        assert!(stored.cancel_at_period_end);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn stale_write_is_rejected() {
        let (store, _dir) = create_test_store();
        let record = subscription(UserId::generate(), "sub_1", 1);
        store.save_subscription(&record).unwrap();

        let mut first = store.get_subscription("sub_1").unwrap().unwrap();
        let mut second = first.clone();

        first.mark_past_due();
        store.save_subscription(&first).unwrap();

        second.request_cancel().unwrap();
        let result = store.save_subscription(&second);
        assert!(matches!(
            result,
            Err(StoreError::VersionConflict {
                expected: 1,
                found: 2,
                ..
            })
        ));

        let stored = store.get_subscription("sub_1").unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::PastDue);
        assert!(!stored.cancel_at_period_end);
    }

    #[test]
    fn active_subscription_prefers_newest_active() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let mut old = subscription(user_id, "sub_old", 1);
        old.mark_deleted(Utc::now());
        store.save_subscription(&old).unwrap();
        store.save_subscription(&subscription(user_id, "sub_new", 15)).unwrap();
        store
            .save_subscription(&subscription(UserId::generate(), "sub_other", 20))
            .unwrap();

        assert_eq!(store.list_subscriptions_by_user(&user_id).unwrap().len(), 2);
        let active = store.active_subscription(&user_id).unwrap().unwrap();
        assert_eq!(active.id, "sub_new");
    }

    #[test]
    fn current_subscription_falls_back_to_latest_ended() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let mut ended = subscription(user_id, "sub_1", 1);
        ended.mark_deleted(Utc::now());
        store.save_subscription(&ended).unwrap();

        assert!(store.active_subscription(&user_id).unwrap().is_none());
        let current = store.current_subscription(&user_id).unwrap().unwrap();
        assert_eq!(current.status, SubscriptionStatus::Canceled);
    }

    #[test]
    fn profile_roundtrip() {
        let (store, _dir) = create_test_store();
        let mut profile = Profile::new(UserId::generate(), Some("a@example.com".into()));
        store.put_profile(&profile).unwrap();

        profile.link_billing("cus_9", SubscriptionStatus::Active);
        store.put_profile(&profile).unwrap();

        let stored = store.get_profile(&profile.user_id).unwrap().unwrap();
        assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_9"));
        assert_eq!(stored.system_account_id, profile.system_account_id);
    }

    #[test]
    fn departments_are_scoped_per_account() {
        let (store, _dir) = create_test_store();
        let account = SystemAccountId::generate();
        let other = SystemAccountId::generate();

        store
            .insert_departments(&[Department::new(account, "Sales"), Department::new(account, "Ops")])
            .unwrap();
        store.insert_departments(&[Department::new(other, "Legal")]).unwrap();
        store.insert_departments(&[]).unwrap();

        let mut names: Vec<_> = store
            .list_departments(&account)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Ops", "Sales"]);
    }

    #[test]
    fn team_members_list_in_insertion_order() {
        let (store, _dir) = create_test_store();
        let account = SystemAccountId::generate();

        store.insert_team_member(&member(account, "first")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.insert_team_member(&member(account, "second")).unwrap();
        store
            .insert_team_member(&member(SystemAccountId::generate(), "elsewhere"))
            .unwrap();

        let members = store.list_team_members(&account).unwrap();
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
