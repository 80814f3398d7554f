//! Record fixtures. Tests share one database, so every test takes fresh user ids.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use membership_core::common::UserId;
use membership_core::domains::subscription::{DraftRecord, SubscriptionStatus};
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};

static NEXT_USER_ID: AtomicI64 = AtomicI64::new(5_000_000);

pub fn fresh_user_id() -> UserId {
    UserId::new(NEXT_USER_ID.fetch_add(1, Ordering::SeqCst))
}

/// A whole-second instant; Postgres stores microseconds, so avoid `Utc::now()` in equality checks.
pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn draft(user_id: UserId, birthday: NaiveDate) -> DraftRecord {
    DraftRecord {
        user_id,
        display_name: format!("user_{}", user_id),
        email: format!("{}@example.com", user_id),
        birthday,
    }
}

/// Write a record in any state directly, bypassing the lifecycle rules.
pub async fn insert_subscriber(
    pool: &PgPool,
    user_id: UserId,
    birthday: NaiveDate,
    status: SubscriptionStatus,
    registered_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
) {
    sqlx::query(
        "INSERT INTO subscribers (user_id, display_name, email, birthday, status, registered_at, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(user_id)
    .bind(format!("user_{}", user_id))
    .bind(format!("{}@example.com", user_id))
    .bind(birthday)
    .bind(status.as_str())
    .bind(registered_at)
    .bind(expires_at)
    .execute(pool)
    .await
    .expect("Failed to insert subscriber");
}
