//! In-process timers for the maintenance jobs.
//!
//! The overdue sweep runs on a fixed interval; the archive cleanup follows a
//! cron expression evaluated in UTC. A failed run is logged and the loop waits
//! for the next tick. Ticks missed while a run is in progress are skipped.

pub mod jobs;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::db::Database;

/// Handle for stopping the job loops.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal both loops to stop and wait for them. An in-flight run finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Scheduler stopped");
    }
}

/// Spawn the overdue sweep and archive cleanup loops.
pub fn start(db: Database, config: &SchedulerConfig) -> Result<SchedulerHandle> {
    let schedule = Schedule::from_str(&config.cleanup_schedule)
        .with_context(|| format!("invalid cleanup schedule {:?}", config.cleanup_schedule))?;
    let interval = Duration::from_secs(config.overdue_interval_secs.max(1));
    let retention_days = config.retention_days;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let overdue = tokio::spawn(run_overdue_loop(db.clone(), interval, shutdown_rx.clone()));
    let cleanup = tokio::spawn(run_cleanup_loop(db, schedule, retention_days, shutdown_rx));

    info!(
        overdue_interval_secs = interval.as_secs(),
        cleanup_schedule = %config.cleanup_schedule,
        retention_days,
        "Scheduler started"
    );

    Ok(SchedulerHandle {
        shutdown_tx,
        tasks: vec![overdue, cleanup],
    })
}

/// Next cron fire strictly after `after`.
pub fn next_fire(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

async fn run_overdue_loop(db: Database, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let db = db.clone();
                let result =
                    tokio::task::spawn_blocking(move || jobs::sweep_overdue(&db, Utc::now())).await;
                match result {
                    Ok(Ok(report)) if report.updated > 0 => {
                        info!(updated = report.updated, "Overdue sweep marked tasks");
                    }
                    Ok(Ok(_)) => debug!("Overdue sweep found nothing to mark"),
                    Ok(Err(e)) => error!("Overdue sweep failed: {:#}", e),
                    Err(e) => error!("Overdue sweep task panicked: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn run_cleanup_loop(
    db: Database,
    schedule: Schedule,
    retention_days: i64,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let Some(next) = next_fire(&schedule, Utc::now()) else {
            error!("Cleanup schedule has no upcoming fire time, stopping cleanup loop");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(next = %next, "Archive cleanup scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let db = db.clone();
                let result = tokio::task::spawn_blocking(move || {
                    jobs::cleanup_archived(&db, Utc::now(), retention_days)
                })
                .await;
                match result {
                    Ok(Ok(report)) => info!(deleted = report.deleted, retention_days, "Archive cleanup finished"),
                    Ok(Err(e)) => error!("Archive cleanup failed: {:#}", e),
                    Err(e) => error!("Archive cleanup task panicked: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
