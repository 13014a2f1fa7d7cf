use crate::error::AppError;
use crate::models::{Chat, ChatSide, Message, Page, Pagination};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
pub mod postgres;

pub use memory::MemoryChatStore;
pub use postgres::PgChatStore;

/// Newest non-recipient-blocked message of one chat, as returned by the
/// bulk projection query behind the chat listings.
#[derive(Debug, Clone)]
pub struct LastMessage {
    pub chat_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Abstract document store for chats and messages. The domain service is
/// written against this seam; production uses Postgres, tests run against
/// the in-memory store.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_chat_by_pair(
        &self,
        creator_id: &str,
        influencer_id: &str,
    ) -> Result<Option<Chat>, AppError>;

    async fn insert_chat(&self, chat: &Chat) -> Result<(), AppError>;

    /// Resolve by internal id or public chat id.
    async fn find_chat(&self, id_or_chat_id: &str) -> Result<Option<Chat>, AppError>;

    /// Chats where the given user holds the given side, newest first.
    async fn list_chats_for_user(
        &self,
        user_id: &str,
        side: ChatSide,
        pagination: &Pagination,
    ) -> Result<Page<Chat>, AppError>;

    /// Bulk last-message lookup across a page of chat ids; one row per
    /// chat that has at least one non-recipient-blocked message.
    async fn last_messages(&self, chat_ids: &[String]) -> Result<Vec<LastMessage>, AppError>;

    async fn insert_message(&self, message: &Message) -> Result<(), AppError>;

    async fn list_messages(
        &self,
        chat_id: &str,
        pagination: &Pagination,
    ) -> Result<Page<Message>, AppError>;

    /// Atomic unread increment for one side of a chat.
    async fn increment_unread(&self, chat_id: &str, side: ChatSide) -> Result<(), AppError>;

    async fn reset_unread(&self, chat_id: &str, side: ChatSide) -> Result<(), AppError>;

    async fn set_blocked(
        &self,
        chat_id: &str,
        side: ChatSide,
        blocked: bool,
    ) -> Result<(), AppError>;

    /// Delete a message iff it belongs to the stated chat and was authored
    /// by the given user. Returns whether a row was removed.
    async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        author_user_id: &str,
    ) -> Result<bool, AppError>;
}
