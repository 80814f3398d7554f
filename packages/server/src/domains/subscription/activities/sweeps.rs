//! Daily reconciliation sweeps
//!
//! Each sweep queries the store once, then handles candidates one by one.
//! A failure for one subscriber is logged and the loop moves on; the next
//! daily run picks up whatever was missed.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::common::{SubscriptionError, UserId};
use crate::domains::subscription::activities::transition::transition;
use crate::domains::subscription::machines::Trigger;
use crate::domains::subscription::messages;
use crate::kernel::ServerDeps;

/// Outcome counts for one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates: usize,
    pub succeeded: usize,
    /// Candidates the sweep looked at and deliberately left alone
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates, {} succeeded, {} skipped, {} failed",
            self.candidates, self.succeeded, self.skipped, self.failed
        )
    }
}

/// Whole days left until `expires_at`, rounded down.
pub fn remaining_whole_days(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().div_euclid(86_400)
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Greet every subscriber born on today's month and day, whatever their status.
pub async fn greet_birthdays(
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<SweepReport, SubscriptionError> {
    let today = now.date_naive();
    let mut celebrants = deps
        .store
        .find_birthdays(today.month(), today.day())
        .await
        .map_err(SubscriptionError::store)?;

    // 29 February birthdays are celebrated on the 28th in common years
    if today.month() == 2 && today.day() == 28 && !is_leap_year(today.year()) {
        let leap_day = deps
            .store
            .find_birthdays(2, 29)
            .await
            .map_err(SubscriptionError::store)?;
        celebrants.extend(leap_day);
    }

    let mut report = SweepReport {
        candidates: celebrants.len(),
        ..Default::default()
    };

    for (user_id, display_name) in celebrants {
        match deps
            .notifier
            .send_message(user_id, &messages::birthday_greeting(&display_name))
            .await
        {
            Ok(()) => {
                debug!(user_id = %user_id, "Birthday greeting sent");
                report.succeeded += 1;
            }
            Err(e) => {
                error!(user_id = %user_id, task = "birthday_greeting", error = %e, "Failed to send birthday greeting");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Warn active subscribers whose remaining whole days equal the configured
/// lead time exactly.
pub async fn send_renewal_warnings(
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<SweepReport, SubscriptionError> {
    let warning_days = deps.config.renewal_warning_days;
    let threshold = now + Duration::days(warning_days + 1);

    let expiring = deps
        .store
        .find_expiring_by(threshold)
        .await
        .map_err(SubscriptionError::store)?;

    let mut report = SweepReport {
        candidates: expiring.len(),
        ..Default::default()
    };

    for (user_id, expires_at) in expiring {
        let remaining = remaining_whole_days(expires_at, now);
        if remaining != warning_days {
            report.skipped += 1;
            continue;
        }

        match deps
            .notifier
            .send_message(user_id, &messages::renewal_warning(remaining))
            .await
        {
            Ok(()) => {
                info!(user_id = %user_id, remaining_days = remaining, "Renewal warning sent");
                report.succeeded += 1;
            }
            Err(e) => {
                error!(user_id = %user_id, task = "renewal_warning", error = %e, "Failed to send renewal warning");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Expire active subscriptions whose expiry has passed, remove the members
/// from the group and tell them.
///
/// The status moves first: a member renewed while the sweep was running keeps
/// both the status and the group seat. Removal or notice failures are logged
/// and do not roll the status back.
pub async fn expire_lapsed_subscriptions(
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<SweepReport, SubscriptionError> {
    let lapsed = deps
        .store
        .find_expired_before(now)
        .await
        .map_err(SubscriptionError::store)?;

    let mut report = SweepReport {
        candidates: lapsed.len(),
        ..Default::default()
    };

    for (user_id, display_name) in lapsed {
        match transition(user_id, Trigger::ExpirySweep, now, deps).await {
            Ok(_) => {}
            Err(e) if e.is_state_conflict() => {
                debug!(user_id = %user_id, "Record changed since query, not expiring");
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(user_id = %user_id, task = "expiry_sweep", error = %e, "Failed to expire subscription");
                report.failed += 1;
                continue;
            }
        }

        warn!(user_id = %user_id, display_name = %display_name, "Removing expired member");
        remove_from_group(user_id, deps).await;

        if let Err(e) = deps
            .notifier
            .send_message(user_id, &messages::subscription_expired())
            .await
        {
            error!(user_id = %user_id, task = "expiry_sweep", error = %e, "Failed to send expiry notice");
        }

        report.succeeded += 1;
    }

    Ok(report)
}

/// Best-effort group removal; the caller has already committed the status.
pub(crate) async fn remove_from_group(user_id: UserId, deps: &ServerDeps) {
    if let Err(e) = deps.notifier.revoke_group_access(user_id).await {
        error!(user_id = %user_id, error = %e, "Failed to remove member from group");
    }
}
