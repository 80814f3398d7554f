// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Transition rules live in domains::subscription; stores and notifiers just move data.
//
// Naming convention: Base* for trait names (e.g., BaseRecordStore, BaseNotifier)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::common::UserId;
use crate::domains::approval::DecisionKind;
use crate::domains::subscription::models::{DraftRecord, SubscriptionStatus, UserRecord};

// =============================================================================
// Record Store Trait (Infrastructure - durable subscriber records)
// =============================================================================

#[async_trait]
pub trait BaseRecordStore: Send + Sync {
    /// Read one record
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    /// Insert a draft, or reset an existing record whose status is in `resettable`.
    /// Returns `None` (and writes nothing) when the existing record is not resettable.
    async fn start_draft(
        &self,
        draft: &DraftRecord,
        resettable: &[SubscriptionStatus],
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>>;

    /// Atomic read-modify-write: set status and expiry only if the stored status is
    /// `expected` and the stored expiry is still `expected_expires_at`.
    /// Returns `None` when the stored record differs (or is missing).
    async fn compare_and_set(
        &self,
        user_id: UserId,
        expected: SubscriptionStatus,
        expected_expires_at: Option<DateTime<Utc>>,
        next: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<UserRecord>>;

    /// Active records expiring on or before `threshold`
    async fn find_expiring_by(&self, threshold: DateTime<Utc>) -> Result<Vec<(UserId, DateTime<Utc>)>>;

    /// Active records whose expiry is before `now`
    async fn find_expired_before(&self, now: DateTime<Utc>) -> Result<Vec<(UserId, String)>>;

    /// Records of any status born on `month`/`day`
    async fn find_birthdays(&self, month: u32, day: u32) -> Result<Vec<(UserId, String)>>;
}

// =============================================================================
// Notifier Trait (Infrastructure - chat delivery and group membership)
// =============================================================================

/// A payment proof to hand to the administrator for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSubmission {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub kind: DecisionKind,
    /// Chat message holding the proof image, forwarded as-is.
    pub message_id: i64,
}

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Send a text message to a user
    async fn send_message(&self, user_id: UserId, text: &str) -> Result<()>;

    /// Forward a proof to the administrator together with approve/reject controls
    async fn forward_proof_to_admin(&self, proof: &ProofSubmission) -> Result<()>;

    /// Remove a user from the managed group (they may rejoin with a new invite)
    async fn revoke_group_access(&self, user_id: UserId) -> Result<()>;

    /// Create a group invite valid for one join within `ttl`; returns the link
    async fn create_single_use_invite(&self, ttl: Duration) -> Result<String>;
}
