//! Task CRUD, listing and parent-chain checks.

use super::assignments::assignees_for_task;
use super::tags::{sync_task_tags, tags_for_task};
use super::{Database, now_ms, page_bounds};
use crate::error::ApiError;
use crate::types::{NewTask, TagRef, Task, TaskFilter, TaskPatch};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;

const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.status, t.priority, t.due_date, \
     t.estimated_hours, t.actual_hours, t.created_by, t.parent_task_id, t.metadata, \
     t.created_at, t.updated_at, t.is_archived, t.deleted_at";

/// Parse a task row. Tags and assignees are filled in by [`hydrate`].
pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let metadata_json: Option<String> = row.get("metadata")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: status.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        priority: priority.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?,
        due_date: row.get("due_date")?,
        estimated_hours: row.get("estimated_hours")?,
        actual_hours: row.get("actual_hours")?,
        created_by: row.get("created_by")?,
        assigned_to: Vec::new(),
        tags: Vec::new(),
        parent_task: row.get("parent_task_id")?,
        metadata: metadata_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| serde_json::json!({})),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_archived: row.get("is_archived")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn hydrate(conn: &Connection, mut task: Task) -> Result<Task> {
    task.tags = tags_for_task(conn, task.id)?;
    task.assigned_to = assignees_for_task(conn, task.id)?;
    Ok(task)
}

/// Fetch a live (not soft-deleted) task.
pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1 AND t.deleted_at IS NULL"),
            params![task_id],
            parse_task_row,
        )
        .optional()?;
    task.map(|t| hydrate(conn, t)).transpose()
}

/// Check whether making `parent_id` the parent of `task_id` would close a loop.
///
/// Walks the ancestor chain of `parent_id`; reaching `task_id` means a cycle.
pub(crate) fn would_create_cycle(conn: &Connection, task_id: i64, parent_id: i64) -> Result<bool> {
    let mut visited: HashSet<i64> = HashSet::new();
    let mut current = Some(parent_id);

    while let Some(id) = current {
        if id == task_id {
            return Ok(true);
        }
        if !visited.insert(id) {
            // Pre-existing loop that does not include task_id
            return Ok(false);
        }
        current = conn
            .query_row(
                "SELECT parent_task_id FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
    }

    Ok(false)
}

/// Validate a proposed parent link.
fn check_parent(conn: &Connection, task_id: Option<i64>, parent_id: i64) -> Result<()> {
    if get_task_internal(conn, parent_id)?.is_none() {
        return Err(ApiError::invalid_value(
            "parent_task",
            format!("Invalid pk \"{}\" - object does not exist.", parent_id),
        )
        .into());
    }
    if let Some(task_id) = task_id
        && would_create_cycle(conn, task_id, parent_id)?
    {
        return Err(ApiError::parent_cycle(task_id, parent_id).into());
    }
    Ok(())
}

impl Database {
    /// Create a task owned by `created_by`. Unknown tag names are added to the catalog.
    pub fn create_task(&self, created_by: i64, new_task: &NewTask) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(parent_id) = new_task.parent_task {
                check_parent(&tx, None, parent_id)?;
            }

            let now = now_ms();
            tx.execute(
                "INSERT INTO tasks (title, description, status, priority, due_date, estimated_hours,
                                    actual_hours, created_by, parent_task_id, metadata,
                                    created_at, updated_at, is_archived)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?12)",
                params![
                    new_task.title,
                    new_task.description,
                    new_task.status.as_str(),
                    new_task.priority.as_str(),
                    new_task.due_date,
                    new_task.estimated_hours,
                    new_task.actual_hours,
                    created_by,
                    new_task.parent_task,
                    new_task.metadata.to_string(),
                    now,
                    new_task.is_archived,
                ],
            )?;
            let task_id = tx.last_insert_rowid();
            sync_task_tags(&tx, task_id, &new_task.tags)?;

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| anyhow!("task {} vanished after insert", task_id))?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Get a live task by id.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Apply a partial update and bump `updated_at`.
    pub fn update_task(&self, task_id: i64, patch: &TaskPatch) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if get_task_internal(&tx, task_id)?.is_none() {
                return Err(ApiError::task_not_found(task_id).into());
            }
            if let Some(Some(parent_id)) = patch.parent_task {
                check_parent(&tx, Some(task_id), parent_id)?;
            }

            let mut sets: Vec<String> = Vec::new();
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref title) = patch.title {
                sets.push(format!("title = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(title.clone()));
            }
            if let Some(ref description) = patch.description {
                sets.push(format!("description = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(description.clone()));
            }
            if let Some(status) = patch.status {
                sets.push(format!("status = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(status.as_str()));
            }
            if let Some(priority) = patch.priority {
                sets.push(format!("priority = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(priority.as_str()));
            }
            if let Some(due_date) = patch.due_date {
                sets.push(format!("due_date = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(due_date));
            }
            if let Some(hours) = patch.estimated_hours {
                sets.push(format!("estimated_hours = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(hours));
            }
            if let Some(hours) = patch.actual_hours {
                sets.push(format!("actual_hours = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(hours));
            }
            if let Some(parent) = patch.parent_task {
                sets.push(format!("parent_task_id = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(parent));
            }
            if let Some(ref metadata) = patch.metadata {
                sets.push(format!("metadata = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(metadata.to_string()));
            }
            if let Some(archived) = patch.is_archived {
                sets.push(format!("is_archived = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(archived));
            }

            sets.push(format!("updated_at = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(now_ms()));

            let sql = format!(
                "UPDATE tasks SET {} WHERE id = ?{}",
                sets.join(", "),
                params_vec.len() + 1
            );
            params_vec.push(Box::new(task_id));

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();
            tx.execute(&sql, params_refs.as_slice())?;

            if let Some(ref tags) = patch.tags {
                sync_task_tags(&tx, task_id, tags)?;
            }

            let task = get_task_internal(&tx, task_id)?
                .ok_or_else(|| anyhow::Error::from(ApiError::task_not_found(task_id)))?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Tombstone a task: it disappears from every read path and is archived so
    /// the cleanup job purges it once it ages past retention.
    pub fn soft_delete_task(&self, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let now = now_ms();
            let changed = conn.execute(
                "UPDATE tasks SET deleted_at = ?1, is_archived = 1, updated_at = ?1
                 WHERE id = ?2 AND deleted_at IS NULL",
                params![now, task_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// List live tasks matching the filter, ordered by id.
    /// Returns the requested page and the total number of matches.
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<(Vec<Task>, u64)> {
        self.with_conn(|conn| {
            let mut where_sql = String::from(" WHERE t.deleted_at IS NULL");
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(user_id) = filter.visible_to {
                let n = params_vec.len() + 1;
                where_sql.push_str(&format!(
                    " AND (t.created_by = ?{n} OR EXISTS (SELECT 1 FROM task_assignments a
                        WHERE a.task_id = t.id AND a.user_id = ?{n}))"
                ));
                params_vec.push(Box::new(user_id));
            }

            if let Some(status) = filter.status {
                where_sql.push_str(&format!(" AND t.status = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(status.as_str()));
            }

            if let Some(priority) = filter.priority {
                where_sql.push_str(&format!(" AND t.priority = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(priority.as_str()));
            }

            if let Some(created_by) = filter.created_by {
                where_sql.push_str(&format!(" AND t.created_by = ?{}", params_vec.len() + 1));
                params_vec.push(Box::new(created_by));
            }

            if let Some(assignee) = filter.assigned_to {
                where_sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM task_assignments a WHERE a.task_id = t.id AND a.user_id = ?{})",
                    params_vec.len() + 1
                ));
                params_vec.push(Box::new(assignee));
            }

            match filter.tag {
                Some(TagRef::Id(tag_id)) => {
                    where_sql.push_str(&format!(
                        " AND EXISTS (SELECT 1 FROM task_tags tt WHERE tt.task_id = t.id AND tt.tag_id = ?{})",
                        params_vec.len() + 1
                    ));
                    params_vec.push(Box::new(tag_id));
                }
                Some(TagRef::Name(ref name)) => {
                    where_sql.push_str(&format!(
                        " AND EXISTS (SELECT 1 FROM task_tags tt JOIN tags g ON g.id = tt.tag_id
                            WHERE tt.task_id = t.id AND g.name = ?{})",
                        params_vec.len() + 1
                    ));
                    params_vec.push(Box::new(name.clone()));
                }
                None => {}
            }

            // Each term must hit title or priority
            for term in filter.search.iter().filter(|t| !t.is_empty()) {
                let n = params_vec.len() + 1;
                where_sql.push_str(&format!(
                    " AND (t.title LIKE '%' || ?{n} || '%' ESCAPE '\\' OR t.priority LIKE '%' || ?{n} || '%' ESCAPE '\\')"
                ));
                params_vec.push(Box::new(escape_like(term)));
            }

            let count_sql = format!("SELECT COUNT(*) FROM tasks t{}", where_sql);
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();
            let total: i64 = conn.query_row(&count_sql, params_refs.as_slice(), |row| row.get(0))?;
            let total = total.max(0) as u64;

            // Pages past the end are reported by the caller; skip the query
            let Some((limit, offset)) = page_bounds(filter.page, filter.page_size, total) else {
                return Ok((Vec::new(), total));
            };

            let n = params_vec.len();
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks t{} ORDER BY t.id LIMIT ?{} OFFSET ?{}",
                where_sql,
                n + 1,
                n + 2
            );
            params_vec.push(Box::new(limit));
            params_vec.push(Box::new(offset));
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_refs.as_slice(), parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let tasks = rows
                .into_iter()
                .map(|t| hydrate(conn, t))
                .collect::<Result<Vec<_>>>()?;

            Ok((tasks, total as u64))
        })
    }
}

/// Escape LIKE wildcards so search terms match literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like("50%_done"), "50\\%\\_done");
        assert_eq!(escape_like("plain"), "plain");
    }
}
