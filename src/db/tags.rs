//! Tag catalog and task/tag links.

use super::Database;
use crate::types::Tag;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Maximum tag name length.
pub const TAG_NAME_MAX: usize = 50;

/// Return the id of the named tag, adding it to the catalog if missing.
pub(crate) fn get_or_create_tag(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
    Ok(conn.last_insert_rowid())
}

/// Replace all tag links of a task.
pub(crate) fn sync_task_tags(conn: &Connection, task_id: i64, names: &[String]) -> Result<()> {
    conn.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    for name in names {
        let tag_id = get_or_create_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task_id, tag_id],
        )?;
    }
    Ok(())
}

/// Tag names linked to a task, alphabetical.
pub(crate) fn tags_for_task(conn: &Connection, task_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT g.name FROM task_tags tt JOIN tags g ON g.id = tt.tag_id
         WHERE tt.task_id = ?1 ORDER BY g.name",
    )?;
    let names = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

impl Database {
    /// All tags ordered by name.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
            let tags = stmt
                .query_map([], |row| {
                    Ok(Tag {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }
}
