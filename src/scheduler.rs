//! Cron-driven background sync.

use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::sync::SyncService;

/// Parse a cron expression (seconds field first).
pub fn parse_schedule(expression: &str) -> anyhow::Result<Schedule> {
    Schedule::from_str(expression).with_context(|| format!("invalid cron expression '{expression}'"))
}

/// Next fire time strictly after `after`.
pub fn next_run(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// Run `sync_all` on every tick of `expression` until the task is aborted.
///
/// A tick that lands while a sync is running is skipped by the sync guard.
pub fn spawn(sync: SyncService, expression: &str) -> anyhow::Result<JoinHandle<()>> {
    let schedule = parse_schedule(expression)?;
    info!(cron = %expression, "Sync scheduler started");

    Ok(tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_run(&schedule, now) else {
                warn!("Cron schedule has no upcoming runs, scheduler stopping");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "Next scheduled sync");
            tokio::time::sleep(wait).await;

            let report = sync.sync_all().await;
            if report.success {
                info!(
                    countries_updated = report.countries_updated,
                    duration_ms = report.duration_ms,
                    "Scheduled sync completed"
                );
            } else {
                error!(error = ?report.error, "Scheduled sync did not complete");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_daily_schedule() {
        let schedule = parse_schedule("0 0 3 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            next_run(&schedule, after),
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 3, 0, 0).unwrap())
        );

        let before = Utc.with_ymd_and_hms(2024, 5, 1, 2, 59, 59).unwrap();
        assert_eq!(
            next_run(&schedule, before),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_expression() {
        let err = parse_schedule("every day").unwrap_err();
        assert!(err.to_string().contains("every day"));
    }
}
