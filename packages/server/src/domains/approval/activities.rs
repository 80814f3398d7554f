//! Admin decision handling
//!
//! One decision at a time: authorize, parse, apply the transition, then tell
//! the subscriber. Anything that fails before the commit leaves the record
//! untouched so the admin can press the button again.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info};

use crate::common::{Actor, SubscriptionError, UserId};
use crate::domains::approval::decision::{AdminDecision, DecisionAction, DecisionKind};
use crate::domains::subscription::activities::{
    cancel_abandonment_timer, commit, remove_from_group, transition,
};
use crate::domains::subscription::machines::Trigger;
use crate::domains::subscription::messages::{self, format_date};
use crate::domains::subscription::models::{SubscriptionStatus, UserRecord};
use crate::kernel::ServerDeps;

/// How long a new member's group invite stays usable.
pub const INVITE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A committed decision, plus anything the admin has to follow up on.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub decision: AdminDecision,
    pub record: UserRecord,
    pub invite_link: Option<String>,
    /// Set when the subscriber could not be told about the decision.
    pub notification_error: Option<String>,
}

impl DecisionOutcome {
    /// Text shown to the admin in place of the decision buttons.
    pub fn summary(&self) -> String {
        let user_id = self.decision.user_id;
        let mut text = match (self.decision.action, self.decision.kind) {
            (DecisionAction::Approve, DecisionKind::New) => {
                format!("✅ NEW MEMBER {} APPROVED.", user_id)
            }
            (DecisionAction::Approve, DecisionKind::Renewal) => format!(
                "✅ RENEWAL of {} APPROVED. Valid until {}.",
                user_id,
                self.record
                    .expires_at
                    .map(format_date)
                    .unwrap_or_else(|| "-".to_string())
            ),
            (DecisionAction::Reject, DecisionKind::New) => {
                format!("❌ NEW MEMBER {} REJECTED.", user_id)
            }
            (DecisionAction::Reject, DecisionKind::Renewal) => format!(
                "❌ RENEWAL of {} REJECTED. Status now: {}.",
                user_id, self.record.status
            ),
        };

        if let Some(err) = &self.notification_error {
            text.push_str(&format!("\n\n⚠️ Could not notify the user: {}", err));
            if let Some(link) = &self.invite_link {
                text.push_str(&format!("\nSend them this invite yourself: {}", link));
            }
        }
        text
    }
}

/// Admin-facing text for a decision that was not applied.
pub fn describe_failure(payload: &str, err: &SubscriptionError) -> String {
    match err {
        SubscriptionError::PermissionDenied(_) => "Action not allowed.".to_string(),
        SubscriptionError::Validation(_) => format!("ERROR: malformed decision {:?}.", payload),
        SubscriptionError::StateConflict {
            user_id, current, ..
        } => format!(
            "Already processed: user {} is {}.",
            user_id,
            current.map(SubscriptionStatus::as_str).unwrap_or("not registered")
        ),
        SubscriptionError::Store(_) | SubscriptionError::Delivery(_) => format!(
            "ERROR while processing {:?}: {}. Nothing was saved, try again.",
            payload, err
        ),
    }
}

/// Apply an admin decision received as a callback payload.
pub async fn handle_decision(
    sender: UserId,
    payload: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<DecisionOutcome, SubscriptionError> {
    Actor::new(sender).require_admin(deps)?;
    let decision: AdminDecision = payload.parse()?;
    let user_id = decision.user_id;
    let trigger = Trigger::from_decision(decision.action, decision.kind);

    info!(user_id = %user_id, decision = %decision, "Admin decision received");

    let (record, invite_link) = match trigger {
        Trigger::ApproveNew => {
            let (record, link) = approve_new_member(user_id, now, deps).await?;
            (record, Some(link))
        }
        _ => (transition(user_id, trigger, now, deps).await?, None),
    };

    if trigger == Trigger::RejectRenewal && record.status == SubscriptionStatus::Expired {
        remove_from_group(user_id, deps).await;
    }

    let message = match trigger {
        Trigger::ApproveNew => messages::welcome(
            deps.config.subscription_days,
            invite_link.as_deref().unwrap_or_default(),
        ),
        Trigger::ApproveRenewal => messages::renewal_confirmed(record.expires_at),
        Trigger::RejectNew => messages::new_member_rejected(),
        _ => messages::renewal_rejected(),
    };

    let notification_error = match deps.notifier.send_message(user_id, &message).await {
        Ok(()) => None,
        Err(e) => {
            error!(user_id = %user_id, decision = %decision, error = %e, "Decision committed but user was not notified");
            Some(e.to_string())
        }
    };

    Ok(DecisionOutcome {
        decision,
        record,
        invite_link,
        notification_error,
    })
}

/// The invite is created before the commit; if it cannot be created the
/// record stays in review.
async fn approve_new_member(
    user_id: UserId,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<(UserRecord, String), SubscriptionError> {
    let current = deps
        .store
        .get(user_id)
        .await
        .map_err(SubscriptionError::store)?;
    let planned = deps
        .machine()
        .decide(user_id, current.as_ref(), Trigger::ApproveNew, now)?;

    let link = deps
        .notifier
        .create_single_use_invite(INVITE_TTL)
        .await
        .map_err(SubscriptionError::delivery)?;

    let record = commit(user_id, Trigger::ApproveNew, &planned, deps).await?;
    cancel_abandonment_timer(user_id, deps);

    Ok((record, link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{
        subscriber, MockNotifier, MockRecordStore, TEST_ADMIN_ID,
    };
    use crate::kernel::TestDependencies;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    const USER: i64 = 80;

    fn deps_with(
        status: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> (ServerDeps, Arc<MockRecordStore>, Arc<MockNotifier>) {
        TestDependencies::new()
            .mock_store(MockRecordStore::new().with_record(subscriber(USER, status, expires_at)))
            .into_deps()
    }

    fn user() -> UserId {
        UserId::new(USER)
    }

    #[tokio::test]
    async fn test_non_admin_cannot_decide() {
        let (deps, store, notifier) = deps_with(SubscriptionStatus::PendingApprovalNew, None);

        let err = handle_decision(user(), "approve:new:80", Utc::now(), &deps)
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::PermissionDenied(_)));
        assert_eq!(describe_failure("approve:new:80", &err), "Action not allowed.");
        assert_eq!(store.status(user()), Some(SubscriptionStatus::PendingApprovalNew));
        assert!(notifier.invites().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_changes_nothing() {
        let (deps, store, _) = deps_with(SubscriptionStatus::PendingApprovalNew, None);

        let err = handle_decision(TEST_ADMIN_ID, "aprovar_novo_80", Utc::now(), &deps)
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Validation(_)));
        assert_eq!(store.status(user()), Some(SubscriptionStatus::PendingApprovalNew));
    }

    #[tokio::test]
    async fn test_approve_new_activates_and_sends_invite() {
        let (deps, store, notifier) = deps_with(SubscriptionStatus::PendingApprovalNew, None);
        let now = Utc::now();
        deps.timers.arm(user(), INVITE_TTL, async {});

        let outcome = handle_decision(TEST_ADMIN_ID, "approve:new:80", now, &deps)
            .await
            .unwrap();

        let record = store.record(user()).unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.expires_at, Some(now + ChronoDuration::days(30)));
        assert_eq!(notifier.invites(), vec![INVITE_TTL]);
        assert_eq!(outcome.invite_link.as_deref(), Some("https://t.me/+invite1"));
        assert!(notifier.messages_to(user())[0].contains("https://t.me/+invite1"));
        assert!(!deps.timers.is_armed(user()));
        assert_eq!(outcome.summary(), "✅ NEW MEMBER 80 APPROVED.");
    }

    #[tokio::test]
    async fn test_invite_failure_persists_nothing_and_can_be_retried() {
        let (deps, store, notifier) = deps_with(SubscriptionStatus::PendingApprovalNew, None);
        notifier.set_fail_invites(true);

        let err = handle_decision(TEST_ADMIN_ID, "approve:new:80", Utc::now(), &deps)
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Delivery(_)));
        assert!(describe_failure("approve:new:80", &err).contains("try again"));
        assert_eq!(store.status(user()), Some(SubscriptionStatus::PendingApprovalNew));
        assert!(notifier.messages().is_empty());

        notifier.set_fail_invites(false);
        handle_decision(TEST_ADMIN_ID, "approve:new:80", Utc::now(), &deps)
            .await
            .unwrap();
        assert_eq!(store.status(user()), Some(SubscriptionStatus::Active));
    }

    #[tokio::test]
    async fn test_welcome_failure_is_reported_with_link() {
        let (deps, store, notifier) = deps_with(SubscriptionStatus::PendingApprovalNew, None);
        notifier.fail_deliveries_to(user());

        let outcome = handle_decision(TEST_ADMIN_ID, "approve:new:80", Utc::now(), &deps)
            .await
            .unwrap();

        assert_eq!(store.status(user()), Some(SubscriptionStatus::Active));
        assert!(outcome.notification_error.is_some());
        let summary = outcome.summary();
        assert!(summary.contains("Could not notify"));
        assert!(summary.contains("https://t.me/+invite1"));
    }

    #[tokio::test]
    async fn test_approve_renewal_extends_from_future_expiry() {
        let now = Utc::now();
        let previous = now + ChronoDuration::days(5);
        let (deps, store, notifier) =
            deps_with(SubscriptionStatus::PendingApprovalRenewal, Some(previous));

        let outcome = handle_decision(TEST_ADMIN_ID, "approve:renewal:80", now, &deps)
            .await
            .unwrap();

        let expected = previous + ChronoDuration::days(30);
        assert_eq!(store.record(user()).unwrap().expires_at, Some(expected));
        assert_eq!(outcome.record.status, SubscriptionStatus::Active);
        assert!(notifier.messages_to(user())[0].contains(&format_date(expected)));
        assert!(notifier.invites().is_empty());
    }

    #[tokio::test]
    async fn test_reject_new_member() {
        let (deps, store, notifier) = deps_with(SubscriptionStatus::PendingApprovalNew, None);

        let outcome = handle_decision(TEST_ADMIN_ID, "reject:new:80", Utc::now(), &deps)
            .await
            .unwrap();

        assert_eq!(store.status(user()), Some(SubscriptionStatus::Rejected));
        assert_eq!(notifier.messages_to(user()).len(), 1);
        assert_eq!(outcome.summary(), "❌ NEW MEMBER 80 REJECTED.");
    }

    #[tokio::test]
    async fn test_rejected_renewal_with_future_expiry_stays_active() {
        let now = Utc::now();
        let previous = now + ChronoDuration::days(5);
        let (deps, store, notifier) =
            deps_with(SubscriptionStatus::PendingApprovalRenewal, Some(previous));

        handle_decision(TEST_ADMIN_ID, "reject:renewal:80", now, &deps)
            .await
            .unwrap();

        let record = store.record(user()).unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.expires_at, Some(previous));
        assert!(notifier.revoked().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_renewal_after_expiry_expires_and_removes() {
        let now = Utc::now();
        let (deps, store, notifier) = deps_with(
            SubscriptionStatus::PendingApprovalRenewal,
            Some(now - ChronoDuration::days(2)),
        );

        let outcome = handle_decision(TEST_ADMIN_ID, "reject:renewal:80", now, &deps)
            .await
            .unwrap();

        assert_eq!(store.status(user()), Some(SubscriptionStatus::Expired));
        assert_eq!(notifier.revoked(), vec![user()]);
        assert!(outcome.summary().contains("expired"));
    }

    #[tokio::test]
    async fn test_duplicate_decision_is_a_conflict() {
        let (deps, store, notifier) = deps_with(SubscriptionStatus::PendingApprovalNew, None);

        handle_decision(TEST_ADMIN_ID, "approve:new:80", Utc::now(), &deps)
            .await
            .unwrap();
        let before = store.record(user());

        let err = handle_decision(TEST_ADMIN_ID, "approve:new:80", Utc::now(), &deps)
            .await
            .unwrap_err();

        assert!(err.is_state_conflict());
        assert_eq!(store.record(user()), before);
        assert_eq!(notifier.invites().len(), 1);
        assert_eq!(notifier.messages_to(user()).len(), 1);
        assert_eq!(
            describe_failure("approve:new:80", &err),
            "Already processed: user 80 is active."
        );
    }

    #[tokio::test]
    async fn test_decision_for_unknown_user_is_a_conflict() {
        let (deps, _, _) = TestDependencies::new().into_deps();

        let err = handle_decision(TEST_ADMIN_ID, "reject:new:999", Utc::now(), &deps)
            .await
            .unwrap_err();

        assert_eq!(
            describe_failure("reject:new:999", &err),
            "Already processed: user 999 is not registered."
        );
    }
}
