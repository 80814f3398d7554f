//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Three daily sweeps, each at its configured time of day (UTC):
//! - Birthday greeting
//! - Renewal warning
//! - Expiry sweep
//!
//! # Architecture
//!
//! ```text
//! Scheduler (daily)
//!     │
//!     └─► sweep(now, deps)
//!             └─► For each candidate → notify / transition
//!                     └─► per-user failures logged, loop continues
//! ```

use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use std::future::Future;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::common::SubscriptionError;
use crate::config::DailySchedule;
use crate::domains::subscription::activities::{
    expire_lapsed_subscriptions, greet_birthdays, send_renewal_warnings, SweepReport,
};
use crate::kernel::ServerDeps;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: ServerDeps) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let schedule = deps.config.schedule;

    scheduler
        .add(daily_job(
            "birthday_greeting",
            schedule.birthday_greeting,
            deps.clone(),
            |now, deps| async move { greet_birthdays(now, &deps).await },
        )?)
        .await?;

    scheduler
        .add(daily_job(
            "renewal_warning",
            schedule.renewal_warning,
            deps.clone(),
            |now, deps| async move { send_renewal_warnings(now, &deps).await },
        )?)
        .await?;

    scheduler
        .add(daily_job(
            "expiry_sweep",
            schedule.expiry_sweep,
            deps,
            |now, deps| async move { expire_lapsed_subscriptions(now, &deps).await },
        )?)
        .await?;

    scheduler.start().await?;

    tracing::info!(
        birthday_greeting = %schedule.birthday_greeting,
        renewal_warning = %schedule.renewal_warning,
        expiry_sweep = %schedule.expiry_sweep,
        "Scheduled tasks started (daily, UTC)"
    );
    Ok(scheduler)
}

/// Build a job that runs `sweep` once a day at `at` and logs its report.
fn daily_job<F, Fut>(task: &'static str, at: NaiveTime, deps: ServerDeps, sweep: F) -> Result<Job>
where
    F: Fn(DateTime<Utc>, ServerDeps) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<SweepReport, SubscriptionError>> + Send + 'static,
{
    let cron = DailySchedule::cron_expression(at);
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let run = sweep(Utc::now(), deps.clone());
        Box::pin(async move {
            tracing::info!(task, "Running scheduled task");
            match run.await {
                Ok(report) => tracing::info!(task, %report, "Scheduled task finished"),
                Err(e) => tracing::error!(task, error = %e, "Scheduled task failed"),
            }
        })
    })?;
    Ok(job)
}
