//! Server dependencies for activities (using traits for testability)
//!
//! This module provides the central dependency container used by all domain activities.
//! All external services use trait abstractions to enable testing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use telegram::{ReplyMarkup, TelegramService};

use crate::common::{HasAuthContext, UserId};
use crate::config::SubscriptionConfig;
use crate::domains::approval::{AdminDecision, DecisionAction, DecisionKind};
use crate::domains::registration::RegistrationSessions;
use crate::domains::subscription::machines::SubscriptionMachine;
use crate::domains::subscription::models::{DraftRecord, SubscriptionStatus, UserRecord};
use crate::kernel::{BaseNotifier, BaseRecordStore, ProofSubmission, TimerRegistry};

// =============================================================================
// PgRecordStore (implements BaseRecordStore over the subscribers table)
// =============================================================================

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseRecordStore for PgRecordStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        UserRecord::find_by_id(user_id, &self.pool).await
    }

    async fn start_draft(
        &self,
        draft: &DraftRecord,
        resettable: &[SubscriptionStatus],
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>> {
        UserRecord::start_draft(draft, resettable, now, &self.pool).await
    }

    async fn compare_and_set(
        &self,
        user_id: UserId,
        expected: SubscriptionStatus,
        expected_expires_at: Option<DateTime<Utc>>,
        next: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<UserRecord>> {
        UserRecord::compare_and_set(
            user_id,
            expected,
            expected_expires_at,
            next,
            expires_at,
            &self.pool,
        )
        .await
    }

    async fn find_expiring_by(&self, threshold: DateTime<Utc>) -> Result<Vec<(UserId, DateTime<Utc>)>> {
        UserRecord::find_expiring_by(threshold, &self.pool).await
    }

    async fn find_expired_before(&self, now: DateTime<Utc>) -> Result<Vec<(UserId, String)>> {
        UserRecord::find_expired_before(now, &self.pool).await
    }

    async fn find_birthdays(&self, month: u32, day: u32) -> Result<Vec<(UserId, String)>> {
        UserRecord::find_birthdays(month, day, &self.pool).await
    }
}

// =============================================================================
// TelegramAdapter (implements BaseNotifier trait)
// =============================================================================

/// Wrapper around TelegramService that implements BaseNotifier trait
pub struct TelegramAdapter {
    service: Arc<TelegramService>,
    admin_id: UserId,
    group_id: i64,
}

impl TelegramAdapter {
    pub fn new(service: Arc<TelegramService>, admin_id: UserId, group_id: i64) -> Self {
        Self {
            service,
            admin_id,
            group_id,
        }
    }

    fn decision_buttons(proof: &ProofSubmission) -> ReplyMarkup {
        let label = match proof.kind {
            DecisionKind::New => "NEW MEMBER",
            DecisionKind::Renewal => "RENEWAL",
        };
        let button = |action: DecisionAction, text: &str| {
            (
                format!("{} {}", text, label),
                AdminDecision::new(action, proof.kind, proof.user_id).encode(),
            )
        };
        ReplyMarkup::inline(vec![vec![
            button(DecisionAction::Approve, "✅ Approve"),
            button(DecisionAction::Reject, "❌ Reject"),
        ]])
    }
}

#[async_trait]
impl BaseNotifier for TelegramAdapter {
    async fn send_message(&self, user_id: UserId, text: &str) -> Result<()> {
        self.service
            .send_message(user_id.as_i64(), text, None)
            .await
            .map(|_| ())
            .with_context(|| format!("sending message to {}", user_id))
    }

    async fn forward_proof_to_admin(&self, proof: &ProofSubmission) -> Result<()> {
        let admin = self.admin_id.as_i64();
        let header = match proof.kind {
            DecisionKind::New => "New ACCESS request:",
            DecisionKind::Renewal => "New RENEWAL request:",
        };
        let details = format!(
            "{}\n\nUser: {} (ID: {})\nEmail: {}\nAwaiting your review.",
            header, proof.display_name, proof.user_id, proof.email
        );

        self.service
            .send_message(admin, &details, None)
            .await
            .context("sending proof header to admin")?;
        self.service
            .forward_message(admin, proof.user_id.as_i64(), proof.message_id)
            .await
            .context("forwarding proof to admin")?;
        self.service
            .send_message(admin, "Choose an action:", Some(&Self::decision_buttons(proof)))
            .await
            .context("sending decision buttons to admin")?;
        Ok(())
    }

    async fn revoke_group_access(&self, user_id: UserId) -> Result<()> {
        // ban + unban removes the member without blocking a future rejoin
        self.service
            .ban_chat_member(self.group_id, user_id.as_i64())
            .await
            .with_context(|| format!("removing {} from group", user_id))?;
        self.service
            .unban_chat_member(self.group_id, user_id.as_i64())
            .await
            .with_context(|| format!("lifting ban for {}", user_id))?;
        Ok(())
    }

    async fn create_single_use_invite(&self, ttl: Duration) -> Result<String> {
        let expire_date = Utc::now().timestamp() + ttl.as_secs() as i64;
        let link = self
            .service
            .create_chat_invite_link(self.group_id, 1, expire_date)
            .await
            .context("creating single-use invite link")?;
        Ok(link.invite_link)
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to activities (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseRecordStore>,
    pub notifier: Arc<dyn BaseNotifier>,
    /// Abandonment follow-ups, keyed by user
    pub timers: Arc<TimerRegistry<UserId>>,
    /// In-flight registration dialogues
    pub sessions: Arc<RegistrationSessions>,
    pub config: Arc<SubscriptionConfig>,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseRecordStore>,
        notifier: Arc<dyn BaseNotifier>,
        config: SubscriptionConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            timers: Arc::new(TimerRegistry::new()),
            sessions: Arc::new(RegistrationSessions::new()),
            config: Arc::new(config),
        }
    }

    pub fn machine(&self) -> SubscriptionMachine {
        SubscriptionMachine::new(self.config.subscription_days)
    }
}

impl HasAuthContext for ServerDeps {
    fn admin_id(&self) -> UserId {
        self.config.admin_id
    }
}
