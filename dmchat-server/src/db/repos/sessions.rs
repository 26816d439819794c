//! Login session repository
//!
//! Sessions are server-side rows keyed by a random UUID that the browser
//! holds in a cookie. Expired rows are ignored on lookup and purged lazily.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::DbError;

/// The logged-in user behind a session
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionUser {
    pub session_id: Uuid,
    pub user_id: i64,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Session repository
pub struct SessionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Start a new session for `user_id` lasting `ttl`.
    pub async fn create(&self, user_id: i64, ttl: Duration) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        let expires_at = Utc::now() + ttl;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        Ok(id)
    }

    /// Resolve an unexpired session to its user.
    pub async fn get_active(&self, id: Uuid) -> Result<Option<SessionUser>, DbError> {
        let session = sqlx::query_as::<_, SessionUser>(
            r#"
            SELECT s.id AS session_id, s.user_id, u.username, s.expires_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.id = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(session)
    }

    /// End a session. Deleting an unknown id is not an error.
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Remove expired sessions, returning how many were deleted.
    pub async fn purge_expired(&self) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
