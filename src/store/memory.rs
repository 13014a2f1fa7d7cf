use crate::error::AppError;
use crate::models::{Chat, ChatSide, Message, Page, Pagination};
use crate::store::{ChatStore, LastMessage};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store used by the test suite. Mirrors the Postgres
/// implementation's semantics, including newest-first ordering and the
/// recipient-blocked filter on the last-message projection.
#[derive(Default, Clone)]
pub struct MemoryChatStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    chats: Vec<Chat>,
    messages: Vec<Message>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: &[T], pagination: &Pagination) -> Page<T> {
    let total = items.len() as u64;
    let offset = pagination.offset() as usize;
    let limit = pagination.limit.max(1) as usize;
    let docs = items.iter().skip(offset).take(limit).cloned().collect();
    Page::new(docs, total, pagination)
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn find_chat_by_pair(
        &self,
        creator_id: &str,
        influencer_id: &str,
    ) -> Result<Option<Chat>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .chats
            .iter()
            .find(|c| c.creator_id == creator_id && c.influencer_id == influencer_id)
            .cloned())
    }

    async fn insert_chat(&self, chat: &Chat) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if inner
            .chats
            .iter()
            .any(|c| c.creator_id == chat.creator_id && c.influencer_id == chat.influencer_id)
        {
            return Err(AppError::Internal);
        }
        inner.chats.push(chat.clone());
        Ok(())
    }

    async fn find_chat(&self, id_or_chat_id: &str) -> Result<Option<Chat>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .chats
            .iter()
            .find(|c| c.chat_id == id_or_chat_id)
            .cloned())
    }

    async fn list_chats_for_user(
        &self,
        user_id: &str,
        side: ChatSide,
        pagination: &Pagination,
    ) -> Result<Page<Chat>, AppError> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Chat> = inner
            .chats
            .iter()
            .filter(|c| c.user_id_for(side) == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(paginate(&matching, pagination))
    }

    async fn last_messages(&self, chat_ids: &[String]) -> Result<Vec<LastMessage>, AppError> {
        let inner = self.inner.read().await;
        let mut newest: HashMap<&str, &Message> = HashMap::new();
        for message in &inner.messages {
            if message.blocked_by_recipient {
                continue;
            }
            if !chat_ids.iter().any(|id| id == &message.chat_id) {
                continue;
            }
            let entry = newest.entry(message.chat_id.as_str()).or_insert(message);
            if message.created_at > entry.created_at {
                *entry = message;
            }
        }
        Ok(newest
            .into_values()
            .map(|m| LastMessage {
                chat_id: m.chat_id.clone(),
                text: m.text.clone(),
                created_at: m.created_at,
            })
            .collect())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(
        &self,
        chat_id: &str,
        pagination: &Pagination,
    ) -> Result<Page<Message>, AppError> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(&matching, pagination))
    }

    async fn increment_unread(&self, chat_id: &str, side: ChatSide) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let chat = inner
            .chats
            .iter_mut()
            .find(|c| c.chat_id == chat_id)
            .ok_or(AppError::NotFound)?;
        match side {
            ChatSide::Creator => chat.unread_by_creator += 1,
            ChatSide::Influencer => chat.unread_by_influencer += 1,
        }
        chat.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_unread(&self, chat_id: &str, side: ChatSide) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let chat = inner
            .chats
            .iter_mut()
            .find(|c| c.chat_id == chat_id)
            .ok_or(AppError::NotFound)?;
        match side {
            ChatSide::Creator => chat.unread_by_creator = 0,
            ChatSide::Influencer => chat.unread_by_influencer = 0,
        }
        chat.updated_at = Utc::now();
        Ok(())
    }

    async fn set_blocked(
        &self,
        chat_id: &str,
        side: ChatSide,
        blocked: bool,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let chat = inner
            .chats
            .iter_mut()
            .find(|c| c.chat_id == chat_id)
            .ok_or(AppError::NotFound)?;
        match side {
            ChatSide::Creator => chat.blocked_by_creator = blocked,
            ChatSide::Influencer => chat.blocked_by_influencer = blocked,
        }
        chat.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        author_user_id: &str,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let before = inner.messages.len();
        inner.messages.retain(|m| {
            !(m.chat_id == chat_id
                && m.message_id == message_id
                && m.author_user_id == author_user_id)
        });
        Ok(inner.messages.len() < before)
    }
}
