use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::common::{SubscriptionError, UserId};
use crate::domains::approval::{DecisionAction, DecisionKind};
use crate::domains::subscription::models::{SubscriptionStatus, UserRecord};

/// Something that asks a subscriber record to change status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    StartRegistration,
    ProofSubmitted,
    ApproveNew,
    RejectNew,
    RequestRenewal,
    ApproveRenewal,
    RejectRenewal,
    ExpirySweep,
    UserCancelled,
}

impl Trigger {
    pub fn from_decision(action: DecisionAction, kind: DecisionKind) -> Self {
        match (action, kind) {
            (DecisionAction::Approve, DecisionKind::New) => Self::ApproveNew,
            (DecisionAction::Reject, DecisionKind::New) => Self::RejectNew,
            (DecisionAction::Approve, DecisionKind::Renewal) => Self::ApproveRenewal,
            (DecisionAction::Reject, DecisionKind::Renewal) => Self::RejectRenewal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartRegistration => "start_registration",
            Self::ProofSubmitted => "proof_submitted",
            Self::ApproveNew => "approve_new",
            Self::RejectNew => "reject_new",
            Self::RequestRenewal => "request_renewal",
            Self::ApproveRenewal => "approve_renewal",
            Self::RejectRenewal => "reject_renewal",
            Self::ExpirySweep => "expiry_sweep",
            Self::UserCancelled => "user_cancelled",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decided status change, ready to be applied with compare-and-set on
/// `from` and `previous_expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Option<SubscriptionStatus>,
    pub previous_expires_at: Option<DateTime<Utc>>,
    pub to: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Subscription state machine - pure decision logic
///
/// Knows the transition table and expiry arithmetic; performs no I/O.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionMachine {
    subscription_days: i64,
}

impl SubscriptionMachine {
    /// Statuses an existing record may be reset from when a new draft starts.
    pub const DRAFT_RESETTABLE: [SubscriptionStatus; 2] =
        [SubscriptionStatus::Rejected, SubscriptionStatus::Expired];

    pub fn new(subscription_days: i64) -> Self {
        Self { subscription_days }
    }

    fn term(&self) -> Duration {
        Duration::days(self.subscription_days)
    }

    pub fn decide(
        &self,
        user_id: UserId,
        current: Option<&UserRecord>,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Result<Transition, SubscriptionError> {
        use SubscriptionStatus::*;

        let from = current.map(|record| record.status);
        let expires = current.and_then(|record| record.expires_at);

        let (to, expires_at) = match (trigger, from) {
            (Trigger::StartRegistration, None | Some(Rejected) | Some(Expired)) => {
                (PendingPayment, None)
            }
            (Trigger::ProofSubmitted, Some(PendingPayment)) => (PendingApprovalNew, None),
            (Trigger::ProofSubmitted, Some(PendingRenewal)) => (PendingApprovalRenewal, expires),
            (Trigger::ApproveNew, Some(PendingApprovalNew)) => (Active, Some(now + self.term())),
            (Trigger::RejectNew, Some(PendingApprovalNew)) => (Rejected, None),
            (Trigger::RequestRenewal, Some(Active | Expired | PendingRenewal)) => {
                (PendingRenewal, expires)
            }
            (Trigger::ApproveRenewal, Some(PendingApprovalRenewal)) => {
                // never shorten a subscription that is still running
                let base = expires.map_or(now, |previous| previous.max(now));
                (Active, Some(base + self.term()))
            }
            (Trigger::RejectRenewal, Some(PendingApprovalRenewal)) => match expires {
                Some(previous) if previous > now => (Active, expires),
                _ => (Expired, expires),
            },
            (Trigger::ExpirySweep, Some(Active)) if expires.is_some_and(|at| at < now) => {
                (Expired, expires)
            }
            (Trigger::UserCancelled, Some(PendingPayment)) => (Rejected, None),
            _ => {
                return Err(SubscriptionError::StateConflict {
                    user_id,
                    current: from,
                    trigger,
                })
            }
        };

        Ok(Transition {
            from,
            previous_expires_at: expires,
            to,
            expires_at: if to.clears_expiry() { None } else { expires_at },
        })
    }
}
