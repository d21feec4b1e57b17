//! User accounts.

use super::Database;
use crate::types::User;
use anyhow::Result;
use chrono::NaiveDateTime;
use rusqlite::{ErrorCode, OptionalExtension, Row, params};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Create a user. Returns `None` when the email is already registered.
    pub fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        now: NaiveDateTime,
    ) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
                params![email, password_hash, now],
            );
            match inserted {
                Ok(_) => Ok(Some(User {
                    id: conn.last_insert_rowid(),
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                    created_at: now,
                })),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT * FROM users WHERE id = ?1",
                    params![id],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT * FROM users WHERE email = ?1",
                    params![email],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }
}
