//! The maintenance jobs. Each is one bulk statement and safe to re-run.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::MAX_RETENTION_DAYS;
use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverdueReport {
    pub updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: usize,
}

/// Mark every live, unfinished task due before `now` as overdue.
pub fn sweep_overdue(db: &Database, now: DateTime<Utc>) -> Result<OverdueReport> {
    let updated = db.mark_overdue_tasks(now.timestamp_millis())?;
    Ok(OverdueReport { updated })
}

/// Purge archived tasks not updated within `retention_days` of `now`.
pub fn cleanup_archived(
    db: &Database,
    now: DateTime<Utc>,
    retention_days: i64,
) -> Result<CleanupReport> {
    let cutoff = retention_cutoff(now, retention_days)?;
    let deleted = db.purge_archived_tasks(cutoff)?;
    Ok(CleanupReport { deleted })
}

/// Epoch milliseconds `days` before `now`.
pub fn retention_cutoff(now: DateTime<Utc>, days: i64) -> Result<i64> {
    if !(0..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(anyhow!(
            "retention of {} days is outside 0..={}",
            days,
            MAX_RETENTION_DAYS
        ));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .map(|cutoff| cutoff.timestamp_millis())
        .ok_or_else(|| anyhow!("retention of {} days reaches before the calendar", days))
}
