use crate::error::AppError;
use crate::models::{Chat, ChatSide, Message, Page, Pagination};
use crate::store::{ChatStore, LastMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

/// Postgres-backed store. Queries are plain `sqlx::query` against the
/// embedded migrations' schema; the unique (creator_id, influencer_id)
/// index backs the idempotent-create invariant.
#[derive(Clone)]
pub struct PgChatStore {
    db: Pool<Postgres>,
}

impl PgChatStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

fn unread_column(side: ChatSide) -> &'static str {
    match side {
        ChatSide::Creator => "unread_by_creator",
        ChatSide::Influencer => "unread_by_influencer",
    }
}

fn blocked_column(side: ChatSide) -> &'static str {
    match side {
        ChatSide::Creator => "blocked_by_creator",
        ChatSide::Influencer => "blocked_by_influencer",
    }
}

fn user_column(side: ChatSide) -> &'static str {
    match side {
        ChatSide::Creator => "creator_user_id",
        ChatSide::Influencer => "influencer_user_id",
    }
}

fn row_to_chat(row: &sqlx::postgres::PgRow) -> Chat {
    Chat {
        chat_id: row.get("chat_id"),
        creator_id: row.get("creator_id"),
        influencer_id: row.get("influencer_id"),
        creator_user_id: row.get("creator_user_id"),
        influencer_user_id: row.get("influencer_user_id"),
        unread_by_creator: row.get("unread_by_creator"),
        unread_by_influencer: row.get("unread_by_influencer"),
        blocked_by_creator: row.get("blocked_by_creator"),
        blocked_by_influencer: row.get("blocked_by_influencer"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        message_id: row.get("message_id"),
        chat_id: row.get("chat_id"),
        author_id: row.get("author_id"),
        author_user_id: row.get("author_user_id"),
        text: row.get("text"),
        blocked_by_recipient: row.get("blocked_by_recipient"),
        is_complete_message: row.get("is_complete_message"),
        created_at: row.get("created_at"),
    }
}

const CHAT_COLUMNS: &str = "chat_id, creator_id, influencer_id, creator_user_id, \
     influencer_user_id, unread_by_creator, unread_by_influencer, \
     blocked_by_creator, blocked_by_influencer, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "message_id, chat_id, author_id, author_user_id, text, \
     blocked_by_recipient, is_complete_message, created_at";

#[async_trait]
impl ChatStore for PgChatStore {
    async fn find_chat_by_pair(
        &self,
        creator_id: &str,
        influencer_id: &str,
    ) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE creator_id = $1 AND influencer_id = $2"
        ))
        .bind(creator_id)
        .bind(influencer_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_chat))
    }

    async fn insert_chat(&self, chat: &Chat) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO chats (chat_id, creator_id, influencer_id, creator_user_id, \
             influencer_user_id, unread_by_creator, unread_by_influencer, \
             blocked_by_creator, blocked_by_influencer, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&chat.chat_id)
        .bind(&chat.creator_id)
        .bind(&chat.influencer_id)
        .bind(&chat.creator_user_id)
        .bind(&chat.influencer_user_id)
        .bind(chat.unread_by_creator)
        .bind(chat.unread_by_influencer)
        .bind(chat.blocked_by_creator)
        .bind(chat.blocked_by_influencer)
        .bind(chat.created_at)
        .bind(chat.updated_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_chat(&self, id_or_chat_id: &str) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE chat_id = $1"
        ))
        .bind(id_or_chat_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_chat))
    }

    async fn list_chats_for_user(
        &self,
        user_id: &str,
        side: ChatSide,
        pagination: &Pagination,
    ) -> Result<Page<Chat>, AppError> {
        let column = user_column(side);
        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM chats WHERE {column} = $1"))
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE {column} = $1 \
             ORDER BY updated_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(pagination.limit.max(1) as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        let docs = rows.iter().map(row_to_chat).collect();
        Ok(Page::new(docs, total as u64, pagination))
    }

    async fn last_messages(&self, chat_ids: &[String]) -> Result<Vec<LastMessage>, AppError> {
        if chat_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT DISTINCT ON (chat_id) chat_id, text, created_at \
             FROM messages \
             WHERE chat_id = ANY($1) AND blocked_by_recipient = FALSE \
             ORDER BY chat_id, created_at DESC",
        )
        .bind(chat_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chat_id: String = row.get("chat_id");
                let text: String = row.get("text");
                let created_at: DateTime<Utc> = row.get("created_at");
                LastMessage {
                    chat_id,
                    text,
                    created_at,
                }
            })
            .collect())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO messages (message_id, chat_id, author_id, author_user_id, text, \
             blocked_by_recipient, is_complete_message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&message.message_id)
        .bind(&message.chat_id)
        .bind(&message.author_id)
        .bind(&message.author_user_id)
        .bind(&message.text)
        .bind(message.blocked_by_recipient)
        .bind(message.is_complete_message)
        .bind(message.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        chat_id: &str,
        pagination: &Pagination,
    ) -> Result<Page<Message>, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE chat_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(chat_id)
        .bind(pagination.limit.max(1) as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.db)
        .await?;

        let docs = rows.iter().map(row_to_message).collect();
        Ok(Page::new(docs, total as u64, pagination))
    }

    async fn increment_unread(&self, chat_id: &str, side: ChatSide) -> Result<(), AppError> {
        let column = unread_column(side);
        sqlx::query(&format!(
            "UPDATE chats SET {column} = {column} + 1, updated_at = NOW() WHERE chat_id = $1"
        ))
        .bind(chat_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn reset_unread(&self, chat_id: &str, side: ChatSide) -> Result<(), AppError> {
        let column = unread_column(side);
        sqlx::query(&format!(
            "UPDATE chats SET {column} = 0, updated_at = NOW() WHERE chat_id = $1"
        ))
        .bind(chat_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn set_blocked(
        &self,
        chat_id: &str,
        side: ChatSide,
        blocked: bool,
    ) -> Result<(), AppError> {
        let column = blocked_column(side);
        sqlx::query(&format!(
            "UPDATE chats SET {column} = $2, updated_at = NOW() WHERE chat_id = $1"
        ))
        .bind(chat_id)
        .bind(blocked)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        author_user_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE chat_id = $1 AND message_id = $2 AND author_user_id = $3",
        )
        .bind(chat_id)
        .bind(message_id)
        .bind(author_user_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
