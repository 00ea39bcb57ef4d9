//! Task assignment records.

use super::{Database, now_ms};
use crate::types::Assignment;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Result of an idempotent assignment insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    Created(Assignment),
    AlreadyAssigned(Assignment),
}

impl AssignOutcome {
    pub fn assignment(&self) -> &Assignment {
        match self {
            AssignOutcome::Created(a) | AssignOutcome::AlreadyAssigned(a) => a,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, AssignOutcome::Created(_))
    }
}

fn parse_assignment_row(row: &Row) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        task_id: row.get("task_id")?,
        assigned_by: row.get("assigned_by")?,
        assigned_at: row.get("assigned_at")?,
    })
}

fn find_assignment_internal(
    conn: &Connection,
    user_id: i64,
    task_id: i64,
) -> Result<Option<Assignment>> {
    let found = conn
        .query_row(
            "SELECT id, user_id, task_id, assigned_by, assigned_at FROM task_assignments
             WHERE user_id = ?1 AND task_id = ?2",
            params![user_id, task_id],
            parse_assignment_row,
        )
        .optional()?;
    Ok(found)
}

/// Ids of users assigned to a task, in assignment order.
pub(crate) fn assignees_for_task(conn: &Connection, task_id: i64) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM task_assignments WHERE task_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

impl Database {
    /// Find the assignment of `user_id` to `task_id`, if any.
    pub fn find_assignment(&self, user_id: i64, task_id: i64) -> Result<Option<Assignment>> {
        self.with_conn(|conn| find_assignment_internal(conn, user_id, task_id))
    }

    /// Record an assignment unless the pair already exists.
    ///
    /// The `UNIQUE (user_id, task_id)` constraint with `ON CONFLICT DO NOTHING`
    /// turns a racing duplicate into `AlreadyAssigned` rather than a second row.
    pub fn assign_user(&self, user_id: i64, task_id: i64, assigned_by: i64) -> Result<AssignOutcome> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO task_assignments (user_id, task_id, assigned_by, assigned_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, task_id) DO NOTHING",
                params![user_id, task_id, assigned_by, now_ms()],
            )?;

            let assignment = find_assignment_internal(conn, user_id, task_id)?.ok_or_else(|| {
                anyhow!("assignment of user {} to task {} missing", user_id, task_id)
            })?;

            if inserted > 0 {
                Ok(AssignOutcome::Created(assignment))
            } else {
                Ok(AssignOutcome::AlreadyAssigned(assignment))
            }
        })
    }

    /// All assignments for a task.
    pub fn list_assignments(&self, task_id: i64) -> Result<Vec<Assignment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, task_id, assigned_by, assigned_at FROM task_assignments
                 WHERE task_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![task_id], parse_assignment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
