//! Database layer for taskhub.

pub mod assignments;
pub mod maintenance;
pub mod tags;
pub mod tasks;
pub mod tokens;
pub mod users;

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let report = embedded::migrations::runner().run(&mut *conn)?;
        for migration in report.applied_migrations() {
            tracing::info!(
                version = migration.version(),
                name = migration.name(),
                "Applied migration"
            );
        }
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `LIMIT` and `OFFSET` for a 1-based page of `page_size` rows.
///
/// `None` when the page starts at or past `total` (or its offset does not fit
/// in SQLite's integer range); there is nothing to fetch.
pub(crate) fn page_bounds(page: u64, page_size: u64, total: u64) -> Option<(i64, i64)> {
    let offset = page.saturating_sub(1).checked_mul(page_size)?;
    if offset >= total {
        return None;
    }
    Some((i64::try_from(page_size).ok()?, i64::try_from(offset).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_stop_at_the_last_row() {
        assert_eq!(page_bounds(1, 10, 25), Some((10, 0)));
        assert_eq!(page_bounds(3, 10, 25), Some((10, 20)));
        assert_eq!(page_bounds(4, 10, 25), None);
        assert_eq!(page_bounds(1, 10, 0), None);
    }

    #[test]
    fn page_bounds_survive_huge_pages() {
        assert_eq!(page_bounds(u64::MAX, 30, 5), None);
        assert_eq!(page_bounds(2_000_000_000_000_000_000, 10, 5), None);
        assert_eq!(page_bounds(1_000_000_000_000_000_000, 10, u64::MAX), None);
    }
}
