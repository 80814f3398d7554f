use thiserror::Error;

use crate::common::UserId;
use crate::domains::subscription::machines::Trigger;
use crate::domains::subscription::models::SubscriptionStatus;

/// Errors raised by subscription operations.
///
/// `Validation` and `PermissionDenied` are shown to whoever sent the input.
/// `Store` and `Delivery` wrap I/O failures; sweeps log and skip them, admin
/// decisions hand them back to the admin.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Cannot apply {trigger} to user {user_id} in status {}", describe_status(.current))]
    StateConflict {
        user_id: UserId,
        current: Option<SubscriptionStatus>,
        trigger: Trigger,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Delivery error: {0}")]
    Delivery(#[source] anyhow::Error),
}

fn describe_status(status: &Option<SubscriptionStatus>) -> &'static str {
    status.map(SubscriptionStatus::as_str).unwrap_or("none")
}

impl SubscriptionError {
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Self::Store(err.into())
    }

    pub fn delivery(err: impl Into<anyhow::Error>) -> Self {
        Self::Delivery(err.into())
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::StateConflict { .. })
    }
}
