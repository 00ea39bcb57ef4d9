//! Bulk maintenance statements used by the scheduled jobs.
//!
//! Each operation is a single statement so it is atomic and safe to re-run.

use super::Database;
use anyhow::Result;
use rusqlite::params;

impl Database {
    /// Flip live tasks past their due date to `overdue`.
    ///
    /// Completed and already-overdue tasks are left alone. `updated_at` is not
    /// touched so a sweep never delays archive cleanup.
    pub fn mark_overdue_tasks(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE tasks SET status = 'overdue'
                 WHERE due_date < ?1
                   AND status NOT IN ('completed', 'overdue')
                   AND deleted_at IS NULL",
                params![now],
            )?;
            Ok(updated)
        })
    }

    /// Permanently remove archived tasks last updated before `cutoff`.
    ///
    /// Assignments and tag links cascade; children lose their parent link.
    pub fn purge_archived_tasks(&self, cutoff: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE is_archived = 1 AND updated_at < ?1",
                params![cutoff],
            )?;
            Ok(deleted)
        })
    }
}
