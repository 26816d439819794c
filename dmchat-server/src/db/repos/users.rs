//! User repository
//!
//! - create: INSERT with ON CONFLICT DO NOTHING (taken usernames are not errors)
//! - search: case-insensitive substring match, self excluded

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::models::{SearchQuery, Username};

/// Maximum rows returned by a user search
pub const SEARCH_LIMIT: i64 = 10;

/// User record from database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user for search results
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },
}

/// User repository
pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. Returns `None` if the username is already taken.
    pub async fn create(
        &self,
        username: &Username,
        password_hash: &str,
    ) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username.as_str())
        .bind(password_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Look up a user by exact username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Case-insensitive substring search over usernames, excluding `exclude_id`.
    ///
    /// Ordered by username, capped at [`SEARCH_LIMIT`] rows.
    pub async fn search(
        &self,
        query: &SearchQuery,
        exclude_id: i64,
    ) -> Result<Vec<UserSummary>, DbError> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT id, username
            FROM users
            WHERE username ILIKE $1 AND id <> $2
            ORDER BY username ASC
            LIMIT $3
            "#,
        )
        .bind(query.ilike_pattern())
        .bind(exclude_id)
        .bind(SEARCH_LIMIT)
        .fetch_all(self.pool)
        .await?;

        Ok(users)
    }
}
