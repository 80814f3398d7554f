//! Admin decisions travel as button callback data: `"{action}:{kind}:{user_id}"`.

use std::fmt;
use std::str::FromStr;

use crate::common::{SubscriptionError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl DecisionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Whether the proof under review is for a first subscription or a renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    New,
    Renewal,
}

impl DecisionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Renewal => "renewal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminDecision {
    pub action: DecisionAction,
    pub kind: DecisionKind,
    pub user_id: UserId,
}

impl AdminDecision {
    pub fn new(action: DecisionAction, kind: DecisionKind, user_id: UserId) -> Self {
        Self {
            action,
            kind,
            user_id,
        }
    }

    /// Callback payload for this decision.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AdminDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.action.as_str(),
            self.kind.as_str(),
            self.user_id
        )
    }
}

impl FromStr for AdminDecision {
    type Err = SubscriptionError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            SubscriptionError::Validation(format!("malformed decision {:?}: {}", payload, reason))
        };

        let mut parts = payload.split(':');
        let (Some(action), Some(kind), Some(user_id), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected action:kind:user_id"));
        };

        let action = match action {
            "approve" => DecisionAction::Approve,
            "reject" => DecisionAction::Reject,
            _ => return Err(invalid("unknown action")),
        };
        let kind = match kind {
            "new" => DecisionKind::New,
            "renewal" => DecisionKind::Renewal,
            _ => return Err(invalid("unknown kind")),
        };
        let user_id = user_id
            .parse::<UserId>()
            .map_err(|_| invalid("user id is not a number"))?;

        Ok(Self::new(action, kind, user_id))
    }
}
