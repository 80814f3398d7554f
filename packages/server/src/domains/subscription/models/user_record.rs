use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;

use crate::common::UserId;

/// Where a subscriber is in the membership lifecycle.
///
/// "No record" is modelled as `Option<SubscriptionStatus>::None`, never as a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    PendingPayment,
    PendingApprovalNew,
    Active,
    Rejected,
    PendingRenewal,
    PendingApprovalRenewal,
    Expired,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 7] = [
        Self::PendingPayment,
        Self::PendingApprovalNew,
        Self::Active,
        Self::Rejected,
        Self::PendingRenewal,
        Self::PendingApprovalRenewal,
        Self::Expired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::PendingApprovalNew => "pending_approval_new",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::PendingRenewal => "pending_renewal",
            Self::PendingApprovalRenewal => "pending_approval_renewal",
            Self::Expired => "expired",
        }
    }

    /// Statuses in which `expires_at` must be null.
    pub fn clears_expiry(self) -> bool {
        matches!(
            self,
            Self::PendingPayment | Self::PendingApprovalNew | Self::Rejected
        )
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow!("unknown subscription status: {}", s))
    }
}

/// One subscriber. Never deleted: rejected and expired records stay for history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub birthday: NaiveDate,
    pub status: SubscriptionStatus,
    pub registered_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Fields collected by the registration dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub birthday: NaiveDate,
}

impl DraftRecord {
    /// The record a brand-new draft becomes.
    pub fn into_record(self, now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            user_id: self.user_id,
            display_name: self.display_name,
            email: self.email,
            birthday: self.birthday,
            status: SubscriptionStatus::PendingPayment,
            registered_at: now,
            expires_at: None,
        }
    }
}

/// Raw row from the `subscribers` table; status is stored as text.
#[derive(sqlx::FromRow, Debug, Clone)]
struct SubscriberRow {
    user_id: i64,
    display_name: String,
    email: String,
    birthday: NaiveDate,
    status: String,
    registered_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<SubscriberRow> for UserRecord {
    type Error = anyhow::Error;

    fn try_from(row: SubscriberRow) -> Result<Self> {
        Ok(Self {
            user_id: UserId::new(row.user_id),
            display_name: row.display_name,
            email: row.email,
            birthday: row.birthday,
            status: row.status.parse()?,
            registered_at: row.registered_at,
            expires_at: row.expires_at,
        })
    }
}

fn into_record(row: Option<SubscriberRow>) -> Result<Option<UserRecord>> {
    row.map(UserRecord::try_from).transpose()
}

impl UserRecord {
    /// Find subscriber by user ID
    pub async fn find_by_id(user_id: UserId, pool: &PgPool) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, SubscriberRow>("SELECT * FROM subscribers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        into_record(row)
    }

    /// Insert a draft, or reset an existing record back to draft.
    ///
    /// The reset only happens when the stored status is one of `resettable`;
    /// otherwise nothing is written and `None` is returned. `registered_at`
    /// keeps its first value.
    pub async fn start_draft(
        draft: &DraftRecord,
        resettable: &[SubscriptionStatus],
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let resettable: Vec<&str> = resettable.iter().map(|s| s.as_str()).collect();

        let row = sqlx::query_as::<_, SubscriberRow>(
            "INSERT INTO subscribers (
                user_id,
                display_name,
                email,
                birthday,
                status,
                registered_at,
                expires_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, NULL)
             ON CONFLICT (user_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                email = EXCLUDED.email,
                birthday = EXCLUDED.birthday,
                status = EXCLUDED.status,
                expires_at = NULL
             WHERE subscribers.status = ANY($7)
             RETURNING *",
        )
        .bind(draft.user_id)
        .bind(&draft.display_name)
        .bind(&draft.email)
        .bind(draft.birthday)
        .bind(SubscriptionStatus::PendingPayment.as_str())
        .bind(now)
        .bind(&resettable)
        .fetch_optional(pool)
        .await?;
        into_record(row)
    }

    /// Move `user_id` from `expected` to `next`, atomically.
    ///
    /// Returns `None` when the stored status or expiry no longer match what the
    /// caller read.
    pub async fn compare_and_set(
        user_id: UserId,
        expected: SubscriptionStatus,
        expected_expires_at: Option<DateTime<Utc>>,
        next: SubscriptionStatus,
        expires_at: Option<DateTime<Utc>>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let row = sqlx::query_as::<_, SubscriberRow>(
            "UPDATE subscribers
             SET status = $3, expires_at = $4
             WHERE user_id = $1
               AND status = $2
               AND expires_at IS NOT DISTINCT FROM $5
             RETURNING *",
        )
        .bind(user_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(expires_at)
        .bind(expected_expires_at)
        .fetch_optional(pool)
        .await?;
        into_record(row)
    }

    /// Active subscribers whose expiry is on or before `threshold`.
    pub async fn find_expiring_by(
        threshold: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Vec<(UserId, DateTime<Utc>)>> {
        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "SELECT user_id, expires_at
             FROM subscribers
             WHERE status = 'active' AND expires_at <= $1
             ORDER BY expires_at",
        )
        .bind(threshold)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, expires_at)| (UserId::new(id), expires_at))
            .collect())
    }

    /// Active subscribers whose expiry has already passed.
    pub async fn find_expired_before(
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Vec<(UserId, String)>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT user_id, display_name
             FROM subscribers
             WHERE status = 'active' AND expires_at < $1
             ORDER BY expires_at",
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| (UserId::new(id), name))
            .collect())
    }

    /// Subscribers of any status whose birthday falls on `month`/`day`.
    pub async fn find_birthdays(month: u32, day: u32, pool: &PgPool) -> Result<Vec<(UserId, String)>> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT user_id, display_name
             FROM subscribers
             WHERE EXTRACT(MONTH FROM birthday) = $1
               AND EXTRACT(DAY FROM birthday) = $2",
        )
        .bind(month as i32)
        .bind(day as i32)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| (UserId::new(id), name))
            .collect())
    }
}
