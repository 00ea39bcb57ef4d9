//! Account storage.

use super::{Database, now_ms, page_bounds};
use crate::error::ApiError;
use crate::types::{NewUser, User, UserUpdate};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str =
    "id, username, email, nickname, is_staff, is_superuser, is_active, date_joined, last_login";

pub fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        nickname: row.get("nickname")?,
        is_staff: row.get("is_staff")?,
        is_superuser: row.get("is_superuser")?,
        is_active: row.get("is_active")?,
        date_joined: row.get("date_joined")?,
        last_login: row.get("last_login")?,
    })
}

/// Fetch an active user by id.
pub(crate) fn get_user_internal(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND is_active = 1"),
            params![user_id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

fn username_taken(conn: &Connection, username: &str, except_id: Option<i64>) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1 AND id IS NOT ?2",
        params![username, except_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn duplicate_username() -> ApiError {
    ApiError::invalid_value("username", "A user with that username already exists.")
}

impl Database {
    /// Create an account. Fails with a validation error when the username is taken.
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        self.with_conn(|conn| {
            if username_taken(conn, &new_user.username, None)? {
                return Err(duplicate_username().into());
            }

            let now = now_ms();
            conn.execute(
                "INSERT INTO users (username, email, nickname, password_hash, is_staff, is_superuser, is_active, date_joined)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                params![
                    new_user.username,
                    new_user.email,
                    new_user.nickname,
                    new_user.password_hash,
                    new_user.is_staff || new_user.is_superuser,
                    new_user.is_superuser,
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            Ok(User {
                id,
                username: new_user.username.clone(),
                email: new_user.email.clone(),
                nickname: new_user.nickname.clone(),
                is_staff: new_user.is_staff || new_user.is_superuser,
                is_superuser: new_user.is_superuser,
                is_active: true,
                date_joined: now,
                last_login: None,
            })
        })
    }

    /// Get an active user by id.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Look up an active user and their password hash for login.
    pub fn get_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    &format!(
                        "SELECT {USER_COLUMNS}, password_hash FROM users
                         WHERE username = ?1 AND is_active = 1"
                    ),
                    params![username],
                    |row| Ok((parse_user_row(row)?, row.get::<_, String>("password_hash")?)),
                )
                .optional()?;
            Ok(found)
        })
    }

    /// List active users ordered by id. Returns the page and the total count.
    pub fn list_users(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64)> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE is_active = 1",
                [],
                |row| row.get(0),
            )?;

            let total = total.max(0) as u64;

            let Some((limit, offset)) = page_bounds(page, page_size, total) else {
                return Ok((Vec::new(), total));
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1
                 ORDER BY id LIMIT ?1 OFFSET ?2"
            ))?;
            let users = stmt
                .query_map(params![limit, offset], parse_user_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok((users, total))
        })
    }

    /// Replace the editable profile fields of an active user.
    pub fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<User> {
        self.with_conn(|conn| {
            if get_user_internal(conn, user_id)?.is_none() {
                return Err(ApiError::user_not_found(user_id).into());
            }
            if username_taken(conn, &update.username, Some(user_id))? {
                return Err(duplicate_username().into());
            }

            conn.execute(
                "UPDATE users SET username = ?1, email = ?2, nickname = ?3 WHERE id = ?4",
                params![update.username, update.email, update.nickname, user_id],
            )?;
            if let Some(ref hash) = update.password_hash {
                conn.execute(
                    "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                    params![hash, user_id],
                )?;
            }

            get_user_internal(conn, user_id)?
                .ok_or_else(|| anyhow::Error::from(ApiError::user_not_found(user_id)))
        })
    }

    /// Stamp a successful login.
    pub fn record_login(&self, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login = ?1 WHERE id = ?2",
                params![now_ms(), user_id],
            )?;
            Ok(())
        })
    }

    /// Soft-delete an account. Returns false if no active account matched.
    pub fn deactivate_user(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_active = 0 WHERE username = ?1 AND is_active = 1",
                params![username],
            )?;
            Ok(changed > 0)
        })
    }
}
