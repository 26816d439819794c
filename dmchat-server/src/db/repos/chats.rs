//! Chat repository
//!
//! A direct-message chat has exactly two members. `find_or_create_dm` is
//! idempotent: repeated calls for the same pair (in either order) return the
//! same chat id, and concurrent calls cannot create duplicates because DM
//! chats carry a unique `dm_key`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::DbError;

/// Title stored on newly created DM chats
const DM_TITLE: &str = "Chat";

/// A chat as listed on the home page
#[derive(Debug, Clone, FromRow)]
pub struct ChatSummary {
    pub id: i64,
    pub other_username: String,
    pub last_activity: DateTime<Utc>,
}

/// Result of [`ChatRepo::find_or_create_dm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmChat {
    pub id: i64,
    pub created: bool,
}

/// Canonical key for the DM between two users, independent of argument order.
pub fn dm_key(a: i64, b: i64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

/// Chat repository
pub struct ChatRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Two-member chats `user_id` belongs to, most recently active first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<ChatSummary>, DbError> {
        let chats = sqlx::query_as::<_, ChatSummary>(
            r#"
            SELECT
                c.id,
                u.username AS other_username,
                COALESCE(c.updated_at, c.created_at) AS last_activity
            FROM chats c
            JOIN chat_members cm_self ON cm_self.chat_id = c.id AND cm_self.user_id = $1
            JOIN chat_members cm_other ON cm_other.chat_id = c.id AND cm_other.user_id <> $1
            JOIN users u ON u.id = cm_other.user_id
            WHERE (SELECT COUNT(*) FROM chat_members WHERE chat_id = c.id) = 2
            ORDER BY COALESCE(c.updated_at, c.created_at) DESC, c.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(chats)
    }

    /// Existing two-member chat containing both users, if any.
    pub async fn find_dm(&self, a: i64, b: i64) -> Result<Option<i64>, DbError> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT c.id
            FROM chats c
            JOIN chat_members cm1 ON cm1.chat_id = c.id AND cm1.user_id = $1
            JOIN chat_members cm2 ON cm2.chat_id = c.id AND cm2.user_id = $2
            WHERE (SELECT COUNT(*) FROM chat_members WHERE chat_id = c.id) = 2
            ORDER BY c.id
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Return the DM chat between `a` and `b`, creating it if needed.
    ///
    /// Creation inserts the chat and both memberships in one transaction.
    /// Either way the chat's `updated_at` is bumped so it sorts first on
    /// the home page. Callers must reject `a == b`.
    pub async fn find_or_create_dm(&self, a: i64, b: i64) -> Result<DmChat, DbError> {
        debug_assert_ne!(a, b, "a DM needs two distinct users");

        if let Some(id) = self.find_dm(a, b).await? {
            self.touch(id).await?;
            return Ok(DmChat { id, created: false });
        }

        let key = dm_key(a, b);
        let mut tx = self.pool.begin().await?;

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO chats (title, dm_key, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (dm_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(DM_TITLE)
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        let chat = match inserted {
            Some(id) => {
                sqlx::query(
                    r#"
                    INSERT INTO chat_members (chat_id, user_id)
                    VALUES ($1, $2), ($1, $3)
                    "#,
                )
                .bind(id)
                .bind(a)
                .bind(b)
                .execute(&mut *tx)
                .await?;

                DmChat { id, created: true }
            }
            None => {
                // Lost a race with a concurrent request for the same pair.
                let id: i64 = sqlx::query_scalar(
                    "UPDATE chats SET updated_at = NOW() WHERE dm_key = $1 RETURNING id",
                )
                .bind(&key)
                .fetch_one(&mut *tx)
                .await?;

                DmChat { id, created: false }
            }
        };

        tx.commit().await?;
        Ok(chat)
    }

    /// Mark a chat as just active.
    pub async fn touch(&self, chat_id: i64) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE chats SET updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "chat",
                id: chat_id.to_string(),
            });
        }
        Ok(())
    }

    /// Whether `user_id` is a member of `chat_id`.
    pub async fn is_member(&self, chat_id: i64, user_id: i64) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM chat_members WHERE chat_id = $1 AND user_id = $2)",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Username of some member of `chat_id` other than `user_id`.
    pub async fn other_member(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<Option<String>, DbError> {
        let username: Option<String> = sqlx::query_scalar(
            r#"
            SELECT u.username
            FROM chat_members cm
            JOIN users u ON u.id = cm.user_id
            WHERE cm.chat_id = $1 AND cm.user_id <> $2
            ORDER BY cm.joined_at, u.id
            LIMIT 1
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(username)
    }
}
