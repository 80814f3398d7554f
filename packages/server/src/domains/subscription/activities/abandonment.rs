//! Abandoned-payment follow-up
//!
//! A draft that never receives a proof gets one reminder 24 hours later.

use std::time::Duration;
use tracing::{debug, error, info};

use crate::common::{SubscriptionError, UserId};
use crate::domains::subscription::messages;
use crate::domains::subscription::models::SubscriptionStatus;
use crate::kernel::ServerDeps;

pub const ABANDONMENT_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Schedule the reminder for `user_id`, replacing any pending one.
pub fn arm_abandonment_timer(user_id: UserId, deps: &ServerDeps) {
    let fire_deps = deps.clone();
    deps.timers.arm(user_id, ABANDONMENT_DELAY, async move {
        if let Err(e) = send_abandonment_reminder(user_id, &fire_deps).await {
            error!(user_id = %user_id, task = "abandonment", error = %e, "Abandonment follow-up failed");
        }
    });
    debug!(user_id = %user_id, "Abandonment timer armed");
}

pub fn cancel_abandonment_timer(user_id: UserId, deps: &ServerDeps) -> bool {
    let cancelled = deps.timers.cancel(user_id);
    if cancelled {
        debug!(user_id = %user_id, "Abandonment timer cancelled");
    }
    cancelled
}

/// Timer body. Sends the reminder only if the user is still waiting to pay;
/// the abort in `cancel_abandonment_timer` can lose to a timer that already woke.
///
/// Returns whether a reminder was sent.
pub async fn send_abandonment_reminder(
    user_id: UserId,
    deps: &ServerDeps,
) -> Result<bool, SubscriptionError> {
    let record = deps
        .store
        .get(user_id)
        .await
        .map_err(SubscriptionError::store)?;

    if record.map(|r| r.status) != Some(SubscriptionStatus::PendingPayment) {
        debug!(user_id = %user_id, "User left pending payment, skipping reminder");
        return Ok(false);
    }

    deps.notifier
        .send_message(user_id, &messages::abandonment_reminder(&deps.config.payment_info))
        .await
        .map_err(SubscriptionError::delivery)?;

    info!(user_id = %user_id, "Abandonment reminder sent");
    Ok(true)
}
