//! Registration activities - entry, dialogue input and cancellation

use chrono::{DateTime, Utc};
use tracing::info;

use crate::common::{SubscriptionError, UserId};
use crate::domains::registration::dialogue::{Dialogue, DialogueReply};
use crate::domains::subscription::activities::{start_draft, transition};
use crate::domains::subscription::machines::Trigger;
use crate::domains::subscription::models::{SubscriptionStatus, UserRecord};
use crate::kernel::ServerDeps;

/// Result of `/start` or `/acesso`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    DialogueOpened,
    AlreadyActive { expires_at: Option<DateTime<Utc>> },
    UnderReview,
    AwaitingPayment,
    AwaitingRenewalPayment,
    MustRenew,
}

/// Result of one text message sent while a dialogue may be open.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// No live dialogue for this user; the text is not registration input.
    NoDialogue,
    Reply(DialogueReply),
    Committed(UserRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    DraftRejected,
    DialogueDiscarded,
    NothingToCancel,
}

/// Decide what a registration entry command does for this user.
pub async fn begin_registration(
    user_id: UserId,
    display_name: &str,
    deps: &ServerDeps,
) -> Result<EntryOutcome, SubscriptionError> {
    let record = deps
        .store
        .get(user_id)
        .await
        .map_err(SubscriptionError::store)?;

    let outcome = match record.as_ref().map(|r| r.status) {
        Some(SubscriptionStatus::Active) => EntryOutcome::AlreadyActive {
            expires_at: record.and_then(|r| r.expires_at),
        },
        Some(SubscriptionStatus::PendingApprovalNew | SubscriptionStatus::PendingApprovalRenewal) => {
            EntryOutcome::UnderReview
        }
        Some(SubscriptionStatus::PendingPayment) => EntryOutcome::AwaitingPayment,
        Some(SubscriptionStatus::PendingRenewal) => EntryOutcome::AwaitingRenewalPayment,
        Some(SubscriptionStatus::Expired) => EntryOutcome::MustRenew,
        None | Some(SubscriptionStatus::Rejected) => {
            info!(user_id = %user_id, "Starting registration dialogue");
            deps.sessions.put(Dialogue::new(user_id, display_name));
            EntryOutcome::DialogueOpened
        }
    };

    Ok(outcome)
}

/// Feed a text message to the user's dialogue; commits the draft on confirmation.
pub async fn handle_registration_input(
    user_id: UserId,
    text: &str,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<InputOutcome, SubscriptionError> {
    let Some(mut dialogue) = deps.sessions.take(user_id) else {
        return Ok(InputOutcome::NoDialogue);
    };

    match dialogue.advance(text) {
        DialogueReply::Confirmed(draft) => {
            // the dialogue ends here whether or not the draft is stored
            let record = start_draft(draft, now, deps).await?;
            Ok(InputOutcome::Committed(record))
        }
        reply => {
            deps.sessions.put(dialogue);
            Ok(InputOutcome::Reply(reply))
        }
    }
}

/// `/cancelar`: drop any dialogue and reject a draft still waiting for payment.
pub async fn cancel_registration(
    user_id: UserId,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<CancelOutcome, SubscriptionError> {
    let discarded = deps.sessions.discard(user_id);

    match transition(user_id, Trigger::UserCancelled, now, deps).await {
        Ok(_) => {
            info!(user_id = %user_id, "User cancelled pending registration");
            Ok(CancelOutcome::DraftRejected)
        }
        Err(e) if e.is_state_conflict() => Ok(if discarded {
            CancelOutcome::DialogueDiscarded
        } else {
            CancelOutcome::NothingToCancel
        }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::registration::dialogue::{CONFIRM_NO, CONFIRM_YES};
    use crate::kernel::test_dependencies::{subscriber, MockRecordStore};
    use crate::kernel::TestDependencies;
    use chrono::Duration;

    fn deps_with(record: UserRecord) -> ServerDeps {
        let (deps, _, _) = TestDependencies::new()
            .mock_store(MockRecordStore::new().with_record(record))
            .into_deps();
        deps
    }

    #[tokio::test]
    async fn test_entry_depends_on_status() {
        let now = Utc::now();
        let expires = Some(now + Duration::days(9));
        let cases = [
            (
                subscriber(70, SubscriptionStatus::Active, expires),
                EntryOutcome::AlreadyActive { expires_at: expires },
            ),
            (
                subscriber(70, SubscriptionStatus::PendingApprovalNew, None),
                EntryOutcome::UnderReview,
            ),
            (
                subscriber(70, SubscriptionStatus::PendingApprovalRenewal, expires),
                EntryOutcome::UnderReview,
            ),
            (
                subscriber(70, SubscriptionStatus::PendingPayment, None),
                EntryOutcome::AwaitingPayment,
            ),
            (
                subscriber(70, SubscriptionStatus::PendingRenewal, expires),
                EntryOutcome::AwaitingRenewalPayment,
            ),
            (
                subscriber(70, SubscriptionStatus::Expired, Some(now - Duration::days(1))),
                EntryOutcome::MustRenew,
            ),
            (
                subscriber(70, SubscriptionStatus::Rejected, None),
                EntryOutcome::DialogueOpened,
            ),
        ];

        for (record, expected) in cases {
            let deps = deps_with(record);
            let outcome = begin_registration(UserId::new(70), "user_70", &deps).await.unwrap();
            assert_eq!(outcome, expected);
            assert_eq!(
                deps.sessions.is_open(UserId::new(70)),
                expected == EntryOutcome::DialogueOpened
            );
        }
    }

    #[tokio::test]
    async fn test_registration_to_approval_queue() {
        let (deps, store, notifier) = TestDependencies::new().into_deps();
        let user = UserId::new(71);
        let now = Utc::now();

        assert_eq!(
            begin_registration(user, "bia", &deps).await.unwrap(),
            EntryOutcome::DialogueOpened
        );
        for input in ["a@b.com", "01/02/1990"] {
            assert!(matches!(
                handle_registration_input(user, input, now, &deps).await.unwrap(),
                InputOutcome::Reply(_)
            ));
        }

        let record = match handle_registration_input(user, CONFIRM_YES, now, &deps)
            .await
            .unwrap()
        {
            InputOutcome::Committed(record) => record,
            other => panic!("expected commit, got {:?}", other),
        };
        assert_eq!(record.status, SubscriptionStatus::PendingPayment);
        assert_eq!(record.expires_at, None);
        assert_eq!(record.display_name, "bia");
        assert!(!deps.sessions.is_open(user));
        assert!(deps.timers.is_armed(user));

        crate::domains::subscription::activities::submit_proof(user, 900, now, &deps)
            .await
            .unwrap();
        assert_eq!(store.status(user), Some(SubscriptionStatus::PendingApprovalNew));
        assert_eq!(notifier.proofs().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_keeps_dialogue_open() {
        let (deps, store, _) = TestDependencies::new().into_deps();
        let user = UserId::new(72);
        let now = Utc::now();

        begin_registration(user, "caio", &deps).await.unwrap();
        handle_registration_input(user, "c@d.com", now, &deps).await.unwrap();
        handle_registration_input(user, "03/04/1995", now, &deps).await.unwrap();

        let outcome = handle_registration_input(user, CONFIRM_NO, now, &deps)
            .await
            .unwrap();

        assert_eq!(outcome, InputOutcome::Reply(DialogueReply::Restarted));
        assert!(deps.sessions.is_open(user));
        assert_eq!(store.status(user), None);
    }

    #[tokio::test]
    async fn test_text_without_dialogue_is_not_registration_input() {
        let (deps, _, _) = TestDependencies::new().into_deps();

        let outcome = handle_registration_input(UserId::new(73), "hello", Utc::now(), &deps)
            .await
            .unwrap();

        assert_eq!(outcome, InputOutcome::NoDialogue);
    }

    #[tokio::test]
    async fn test_cancel_rejects_pending_payment_and_stops_timer() {
        let (deps, store, _) = TestDependencies::new().into_deps();
        let user = UserId::new(74);
        let now = Utc::now();

        begin_registration(user, "duda", &deps).await.unwrap();
        for input in ["e@f.com", "05/06/1999", CONFIRM_YES] {
            handle_registration_input(user, input, now, &deps).await.unwrap();
        }

        let outcome = cancel_registration(user, now, &deps).await.unwrap();

        assert_eq!(outcome, CancelOutcome::DraftRejected);
        assert_eq!(store.status(user), Some(SubscriptionStatus::Rejected));
        assert!(!deps.timers.is_armed(user));
    }

    #[tokio::test]
    async fn test_cancel_mid_dialogue_commits_nothing() {
        let (deps, store, _) = TestDependencies::new().into_deps();
        let user = UserId::new(75);

        begin_registration(user, "edu", &deps).await.unwrap();
        handle_registration_input(user, "g@h.com", Utc::now(), &deps)
            .await
            .unwrap();

        let outcome = cancel_registration(user, Utc::now(), &deps).await.unwrap();

        assert_eq!(outcome, CancelOutcome::DialogueDiscarded);
        assert!(!deps.sessions.is_open(user));
        assert_eq!(store.status(user), None);
    }

    #[tokio::test]
    async fn test_cancel_leaves_active_member_alone() {
        let expires = Some(Utc::now() + Duration::days(3));
        let deps = deps_with(subscriber(76, SubscriptionStatus::Active, expires));

        let outcome = cancel_registration(UserId::new(76), Utc::now(), &deps)
            .await
            .unwrap();

        assert_eq!(outcome, CancelOutcome::NothingToCancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_dialogue_commits_nothing() {
        let (deps, store, _) = TestDependencies::new().into_deps();
        let user = UserId::new(77);

        begin_registration(user, "fabi", &deps).await.unwrap();
        handle_registration_input(user, "i@j.com", Utc::now(), &deps)
            .await
            .unwrap();
        tokio::time::advance(std::time::Duration::from_secs(2 * 60 * 60)).await;

        let outcome = handle_registration_input(user, "07/08/1990", Utc::now(), &deps)
            .await
            .unwrap();

        assert_eq!(outcome, InputOutcome::NoDialogue);
        assert_eq!(store.status(user), None);
    }
}
