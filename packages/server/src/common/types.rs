// Common types used across multiple domains and layers

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Chat-platform user identifier.
///
/// Opaque to the domain: it is the primary key of a subscriber record and the
/// address notifications are delivered to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_parses_negative_ids() {
        // group and channel ids are negative on the chat platform
        let id: UserId = "-1001234".parse().unwrap();
        assert_eq!(id.as_i64(), -1001234);
        assert_eq!(id.to_string(), "-1001234");
    }

    #[test]
    fn test_user_id_rejects_garbage() {
        assert!("12a".parse::<UserId>().is_err());
    }
}
