//! Message repository
//!
//! Posting a message also bumps the chat's `updated_at` so the home page
//! orders conversations by latest activity.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::models::MessageBody;
use super::DbError;

/// Message record from database
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Message joined with its author's username, for display
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Message repository
pub struct MessageRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> MessageRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add a message to a chat and bump the chat's activity time (atomic).
    pub async fn create(
        &self,
        chat_id: i64,
        user_id: i64,
        body: &MessageBody,
    ) -> Result<Message, DbError> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (chat_id, user_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, chat_id, user_id, body, created_at
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(body.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE chats SET updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// All messages in a chat, oldest first.
    ///
    /// Ties on `created_at` are broken by id so order is stable.
    pub async fn list_for_chat(&self, chat_id: i64) -> Result<Vec<ChatMessage>, DbError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT m.id, u.username AS author, m.body, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.chat_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(self.pool)
        .await?;

        Ok(messages)
    }
}
