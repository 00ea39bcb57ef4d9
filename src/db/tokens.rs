//! Refresh-token blacklist.

use super::{Database, now_ms};
use anyhow::Result;
use rusqlite::params;

impl Database {
    /// Revoke a refresh token. Revoking twice is a no-op.
    pub fn blacklist_token(&self, jti: &str, user_id: i64, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO token_blacklist (jti, user_id, expires_at, blacklisted_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![jti, user_id, expires_at, now_ms()],
            )?;
            Ok(())
        })
    }

    pub fn is_token_blacklisted(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM token_blacklist WHERE jti = ?1",
                params![jti],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Drop blacklist rows for tokens that have expired anyway.
    pub fn flush_expired_tokens(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM token_blacklist WHERE expires_at <= ?1",
                params![now],
            )?;
            Ok(removed)
        })
    }
}
