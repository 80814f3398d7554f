use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use typed_builder::TypedBuilder;

use crate::common::UserId;

const DEFAULT_PAYMENT_INFO: &str = "PIX: your-key@pix.com\nAmount: R$ 50,00";
const DEFAULT_RENEWAL_PAYMENT_INFO: &str = "PIX: your-key@pix.com\nRenewal amount: R$ 40,00";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub telegram_token: String,
    pub port: u16,
    pub subscription: SubscriptionConfig,
}

/// Membership rules shared by every component. Immutable once loaded.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SubscriptionConfig {
    pub admin_id: UserId,
    pub group_id: i64,
    #[builder(default = 30)]
    pub subscription_days: i64,
    #[builder(default = 3)]
    pub renewal_warning_days: i64,
    #[builder(default = DEFAULT_PAYMENT_INFO.to_string(), setter(into))]
    pub payment_info: String,
    #[builder(default = DEFAULT_RENEWAL_PAYMENT_INFO.to_string(), setter(into))]
    pub renewal_payment_info: String,
    #[builder(default)]
    pub schedule: DailySchedule,
}

/// Time of day (UTC) each daily task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub birthday_greeting: NaiveTime,
    pub renewal_warning: NaiveTime,
    pub expiry_sweep: NaiveTime,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            birthday_greeting: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            renewal_warning: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or_default(),
            expiry_sweep: NaiveTime::from_hms_opt(1, 0, 0).unwrap_or_default(),
        }
    }
}

impl DailySchedule {
    /// Six-field cron expression firing once a day at `time`.
    pub fn cron_expression(time: NaiveTime) -> String {
        format!("0 {} {} * * *", time.minute(), time.hour())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = DailySchedule::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            telegram_token: env::var("TELEGRAM_TOKEN").context("TELEGRAM_TOKEN must be set")?,
            port: parse_or("PORT", 8080)?,
            subscription: SubscriptionConfig {
                admin_id: env::var("ADMIN_ID")
                    .context("ADMIN_ID must be set")?
                    .parse()
                    .context("ADMIN_ID must be a numeric user id")?,
                group_id: env::var("GROUP_ID")
                    .context("GROUP_ID must be set")?
                    .parse()
                    .context("GROUP_ID must be a numeric chat id")?,
                subscription_days: parse_or("SUBSCRIPTION_DAYS", 30)?,
                renewal_warning_days: parse_or("RENEWAL_WARNING_DAYS", 3)?,
                payment_info: env::var("PAYMENT_INFO")
                    .unwrap_or_else(|_| DEFAULT_PAYMENT_INFO.to_string()),
                renewal_payment_info: env::var("RENEWAL_PAYMENT_INFO")
                    .unwrap_or_else(|_| DEFAULT_RENEWAL_PAYMENT_INFO.to_string()),
                schedule: DailySchedule {
                    birthday_greeting: time_or("BIRTHDAY_RUN_AT", defaults.birthday_greeting)?,
                    renewal_warning: time_or("RENEWAL_WARNING_RUN_AT", defaults.renewal_warning)?,
                    expiry_sweep: time_or("EXPIRY_SWEEP_RUN_AT", defaults.expiry_sweep)?,
                },
            },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}

fn time_or(key: &str, default: NaiveTime) -> Result<NaiveTime> {
    match env::var(key) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .with_context(|| format!("{} must be formatted HH:MM", key)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cron_expression_for_daily_time() {
        let time = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(DailySchedule::cron_expression(time), "0 30 9 * * *");
    }

    #[test]
    fn test_builder_defaults() {
        let config = SubscriptionConfig::builder()
            .admin_id(UserId::new(1))
            .group_id(-100)
            .build();

        assert_eq!(config.subscription_days, 30);
        assert_eq!(config.renewal_warning_days, 3);
        assert_eq!(
            config.schedule.expiry_sweep,
            NaiveTime::from_hms_opt(1, 0, 0).unwrap()
        );
    }
}
