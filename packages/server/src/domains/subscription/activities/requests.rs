//! Subscriber-initiated requests: payment proofs and renewals

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::common::{SubscriptionError, UserId};
use crate::domains::approval::DecisionKind;
use crate::domains::subscription::activities::transition::transition;
use crate::domains::subscription::machines::Trigger;
use crate::domains::subscription::models::{SubscriptionStatus, UserRecord};
use crate::kernel::{ProofSubmission, ServerDeps};

/// What happened to a submitted proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofReceipt {
    pub kind: DecisionKind,
    /// False when the status moved but the admin never got the proof.
    pub forwarded: bool,
}

/// Accept a payment proof from a subscriber.
///
/// The status moves first; the proof is forwarded afterwards so the admin
/// never sees buttons for a request the record does not reflect.
pub async fn submit_proof(
    user_id: UserId,
    message_id: i64,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<ProofReceipt, SubscriptionError> {
    let record = transition(user_id, Trigger::ProofSubmitted, now, deps).await?;

    let kind = match record.status {
        SubscriptionStatus::PendingApprovalRenewal => DecisionKind::Renewal,
        _ => DecisionKind::New,
    };

    let proof = ProofSubmission {
        user_id,
        display_name: record.display_name,
        email: record.email,
        kind,
        message_id,
    };

    let forwarded = match deps.notifier.forward_proof_to_admin(&proof).await {
        Ok(()) => {
            info!(user_id = %user_id, kind = kind.as_str(), "Proof forwarded to admin");
            true
        }
        Err(e) => {
            error!(user_id = %user_id, kind = kind.as_str(), error = %e, "Failed to forward proof to admin");
            false
        }
    };

    Ok(ProofReceipt { kind, forwarded })
}

/// Move an active or expired member into renewal.
pub async fn request_renewal(
    user_id: UserId,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<UserRecord, SubscriptionError> {
    transition(user_id, Trigger::RequestRenewal, now, deps).await
}
