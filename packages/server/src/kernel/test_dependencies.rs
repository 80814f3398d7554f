// TestDependencies - mock implementations for testing
//
// Provides in-memory services that can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BaseNotifier, BaseRecordStore, ProofSubmission, ServerDeps};
use crate::common::UserId;
use crate::config::SubscriptionConfig;
use crate::domains::subscription::models::{DraftRecord, SubscriptionStatus, UserRecord};

// =============================================================================
// Mock Record Store
// =============================================================================

/// In-memory store with the same compare-and-set semantics as the Postgres one.
pub struct MockRecordStore {
    records: Mutex<HashMap<UserId, UserRecord>>,
    fail_reads: Mutex<bool>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_reads: Mutex::new(false),
        }
    }

    /// Seed a record
    pub fn with_record(self, record: UserRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&self, record: UserRecord) {
        self.records.lock().unwrap().insert(record.user_id, record);
    }

    /// Current stored copy of a record
    pub fn record(&self, user_id: UserId) -> Option<UserRecord> {
        self.records.lock().unwrap().get(&user_id).cloned()
    }

    pub fn status(&self, user_id: UserId) -> Option<SubscriptionStatus> {
        self.record(user_id).map(|r| r.status)
    }

    /// Make every `get` fail, simulating a store outage
    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    fn check_reads(&self) -> Result<()> {
        if *self.fail_reads.lock().unwrap() {
            return Err(anyhow!("mock store unavailable"));
        }
        Ok(())
    }
}

impl Default for MockRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRecordStore for MockRecordStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        self.check_reads()?;
        Ok(self.record(user_id))
    }

    async fn start_draft(
        &self,
        draft: &DraftRecord,
        resettable: &[SubscriptionStatus],
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&draft.user_id) {
            None => {
                let record = draft.clone().into_record(now);
                records.insert(draft.user_id, record.clone());
                Ok(Some(record))
            }
            Some(existing) if resettable.contains(&existing.status) => {
                existing.display_name = draft.display_name.clone();
                existing.email = draft.email.clone();
                existing.birthday = draft.birthday;
                existing.status = SubscriptionStatus::PendingPayment;
                existing.expires_at = None;
                Ok(Some(existing.clone()))
            }
            Some(_) => Ok(None),
        }
    }

    async fn compare_and_set(
        &self,
        user_id: UserId,
        expected: SubscriptionStatus,
        expected_expires_at: Option<DateTime<Utc>>,
        next: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<UserRecord>> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&user_id) {
            Some(record)
                if record.status == expected && record.expires_at == expected_expires_at =>
            {
                record.status = next;
                record.expires_at = expires_at;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_expiring_by(&self, threshold: DateTime<Utc>) -> Result<Vec<(UserId, DateTime<Utc>)>> {
        let records = self.records.lock().unwrap();
        let mut found: Vec<_> = records
            .values()
            .filter(|r| r.status == SubscriptionStatus::Active)
            .filter_map(|r| r.expires_at.map(|at| (r.user_id, at)))
            .filter(|(_, at)| *at <= threshold)
            .collect();
        found.sort_by_key(|(_, at)| *at);
        Ok(found)
    }

    async fn find_expired_before(&self, now: DateTime<Utc>) -> Result<Vec<(UserId, String)>> {
        let records = self.records.lock().unwrap();
        let mut found: Vec<_> = records
            .values()
            .filter(|r| r.status == SubscriptionStatus::Active)
            .filter(|r| r.expires_at.is_some_and(|at| at < now))
            .map(|r| (r.user_id, r.display_name.clone()))
            .collect();
        found.sort();
        Ok(found)
    }

    async fn find_birthdays(&self, month: u32, day: u32) -> Result<Vec<(UserId, String)>> {
        let records = self.records.lock().unwrap();
        let mut found: Vec<_> = records
            .values()
            .filter(|r| r.birthday.month() == month && r.birthday.day() == day)
            .map(|r| (r.user_id, r.display_name.clone()))
            .collect();
        found.sort();
        Ok(found)
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

pub struct MockNotifier {
    messages: Mutex<Vec<(UserId, String)>>,
    proofs: Mutex<Vec<ProofSubmission>>,
    revoked: Mutex<Vec<UserId>>,
    invites: Mutex<Vec<Duration>>,
    failing_users: Mutex<HashSet<UserId>>,
    fail_forwards: Mutex<bool>,
    fail_revocations: Mutex<bool>,
    fail_invites: Mutex<bool>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            proofs: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            invites: Mutex::new(Vec::new()),
            failing_users: Mutex::new(HashSet::new()),
            fail_forwards: Mutex::new(false),
            fail_revocations: Mutex::new(false),
            fail_invites: Mutex::new(false),
        }
    }

    /// Deliveries to `user_id` will fail
    pub fn fail_deliveries_to(&self, user_id: UserId) {
        self.failing_users.lock().unwrap().insert(user_id);
    }

    pub fn set_fail_forwards(&self, fail: bool) {
        *self.fail_forwards.lock().unwrap() = fail;
    }

    pub fn set_fail_revocations(&self, fail: bool) {
        *self.fail_revocations.lock().unwrap() = fail;
    }

    pub fn set_fail_invites(&self, fail: bool) {
        *self.fail_invites.lock().unwrap() = fail;
    }

    /// All successfully delivered messages
    pub fn messages(&self) -> Vec<(UserId, String)> {
        self.messages.lock().unwrap().clone()
    }

    /// Messages delivered to one user
    pub fn messages_to(&self, user_id: UserId) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn proofs(&self) -> Vec<ProofSubmission> {
        self.proofs.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<UserId> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn invites(&self) -> Vec<Duration> {
        self.invites.lock().unwrap().clone()
    }

    fn check_delivery(&self, user_id: UserId) -> Result<()> {
        if self.failing_users.lock().unwrap().contains(&user_id) {
            return Err(anyhow!("mock delivery to {} failed", user_id));
        }
        Ok(())
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn send_message(&self, user_id: UserId, text: &str) -> Result<()> {
        self.check_delivery(user_id)?;
        self.messages
            .lock()
            .unwrap()
            .push((user_id, text.to_string()));
        Ok(())
    }

    async fn forward_proof_to_admin(&self, proof: &ProofSubmission) -> Result<()> {
        if *self.fail_forwards.lock().unwrap() {
            return Err(anyhow!("mock forward for {} failed", proof.user_id));
        }
        self.proofs.lock().unwrap().push(proof.clone());
        Ok(())
    }

    async fn revoke_group_access(&self, user_id: UserId) -> Result<()> {
        if *self.fail_revocations.lock().unwrap() {
            return Err(anyhow!("mock revocation for {} failed", user_id));
        }
        self.revoked.lock().unwrap().push(user_id);
        Ok(())
    }

    async fn create_single_use_invite(&self, ttl: Duration) -> Result<String> {
        if *self.fail_invites.lock().unwrap() {
            return Err(anyhow!("mock invite creation failed"));
        }
        let mut invites = self.invites.lock().unwrap();
        invites.push(ttl);
        Ok(format!("https://t.me/+invite{}", invites.len()))
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub const TEST_ADMIN_ID: UserId = UserId::new(1);
pub const TEST_GROUP_ID: i64 = -100_200;

/// A subscriber fixture with the given status and expiry
pub fn subscriber(
    user_id: i64,
    status: SubscriptionStatus,
    expires_at: Option<DateTime<Utc>>,
) -> UserRecord {
    UserRecord {
        user_id: UserId::new(user_id),
        display_name: format!("user_{}", user_id),
        email: format!("user{}@example.com", user_id),
        birthday: chrono::NaiveDate::from_ymd_opt(1990, 2, 1).unwrap_or_default(),
        status,
        registered_at: Utc::now() - chrono::Duration::days(60),
        expires_at,
    }
}

pub struct TestDependencies {
    pub store: Arc<MockRecordStore>,
    pub notifier: Arc<MockNotifier>,
    pub config: SubscriptionConfig,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MockRecordStore::new()),
            notifier: Arc::new(MockNotifier::new()),
            config: SubscriptionConfig::builder()
                .admin_id(TEST_ADMIN_ID)
                .group_id(TEST_GROUP_ID)
                .payment_info("PIX test-key")
                .renewal_payment_info("PIX renewal-key")
                .build(),
        }
    }

    /// Set a mock record store
    pub fn mock_store(mut self, store: MockRecordStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Override the subscription rules
    pub fn config(mut self, config: SubscriptionConfig) -> Self {
        self.config = config;
        self
    }

    /// Convert into ServerDeps, keeping handles to the mocks for assertions
    pub fn into_deps(self) -> (ServerDeps, Arc<MockRecordStore>, Arc<MockNotifier>) {
        let deps = ServerDeps::new(self.store.clone(), self.notifier.clone(), self.config);
        (deps, self.store, self.notifier)
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
