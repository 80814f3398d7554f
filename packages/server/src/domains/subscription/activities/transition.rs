//! Apply state machine decisions to the record store

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::common::{SubscriptionError, UserId};
use crate::domains::subscription::activities::abandonment::{
    arm_abandonment_timer, cancel_abandonment_timer,
};
use crate::domains::subscription::machines::{SubscriptionMachine, Transition, Trigger};
use crate::domains::subscription::models::{DraftRecord, SubscriptionStatus, UserRecord};
use crate::kernel::ServerDeps;

/// Read the record, decide, and commit with one compare-and-set.
///
/// A status or expiry that changed between the read and the write is a
/// `StateConflict`, exactly like a disallowed trigger.
pub async fn transition(
    user_id: UserId,
    trigger: Trigger,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<UserRecord, SubscriptionError> {
    let current = deps
        .store
        .get(user_id)
        .await
        .map_err(SubscriptionError::store)?;
    let planned = deps.machine().decide(user_id, current.as_ref(), trigger, now)?;

    commit(user_id, trigger, &planned, deps).await
}

/// Commit a transition decided earlier by the caller.
///
/// Used when work has to happen between deciding and committing (the invite
/// link on new-member approval).
pub async fn commit(
    user_id: UserId,
    trigger: Trigger,
    planned: &Transition,
    deps: &ServerDeps,
) -> Result<UserRecord, SubscriptionError> {
    // records are only created through start_draft
    let Some(expected) = planned.from else {
        return Err(SubscriptionError::StateConflict {
            user_id,
            current: None,
            trigger,
        });
    };

    let updated = deps
        .store
        .compare_and_set(
            user_id,
            expected,
            planned.previous_expires_at,
            planned.to,
            planned.expires_at,
        )
        .await
        .map_err(SubscriptionError::store)?;

    match updated {
        Some(record) => {
            if expected == SubscriptionStatus::PendingPayment {
                cancel_abandonment_timer(user_id, deps);
            }
            info!(
                user_id = %user_id,
                trigger = %trigger,
                from = %expected,
                to = %record.status,
                "Subscription transition applied"
            );
            Ok(record)
        }
        None => Err(lost_race(user_id, trigger, deps).await),
    }
}

/// Insert a fresh draft (or reset a rejected/expired record) and arm the
/// abandonment follow-up.
pub async fn start_draft(
    draft: DraftRecord,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<UserRecord, SubscriptionError> {
    let user_id = draft.user_id;
    let current = deps
        .store
        .get(user_id)
        .await
        .map_err(SubscriptionError::store)?;
    deps.machine()
        .decide(user_id, current.as_ref(), Trigger::StartRegistration, now)?;

    let record = deps
        .store
        .start_draft(&draft, &SubscriptionMachine::DRAFT_RESETTABLE, now)
        .await
        .map_err(SubscriptionError::store)?;

    let Some(record) = record else {
        return Err(lost_race(user_id, Trigger::StartRegistration, deps).await);
    };

    arm_abandonment_timer(user_id, deps);
    info!(user_id = %user_id, "Draft registration saved");
    Ok(record)
}

async fn lost_race(user_id: UserId, trigger: Trigger, deps: &ServerDeps) -> SubscriptionError {
    let current = match deps.store.get(user_id).await {
        Ok(record) => record.map(|r| r.status),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Could not re-read record after conflict");
            None
        }
    };
    warn!(
        user_id = %user_id,
        trigger = %trigger,
        current = ?current,
        "Record changed before commit"
    );
    SubscriptionError::StateConflict {
        user_id,
        current,
        trigger,
    }
}
