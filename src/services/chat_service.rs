use crate::error::AppError;
use crate::events::{DomainEvent, EventBus};
use crate::models::{Chat, ChatListRow, ChatSide, Message, Page, Pagination};
use crate::store::ChatStore;
use std::collections::HashMap;
use std::sync::Arc;

/// Owns the chat/message state machine: creation, membership validation,
/// blocking, unread accounting, read-receipt clearing, deletion. Publishes
/// domain events on the bus; never touches live connections.
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    events: EventBus,
}

impl ChatService {
    pub fn new(store: Arc<dyn ChatStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Idempotent: returns the existing chat for the pair if one exists,
    /// otherwise creates one with counters zeroed and flags false.
    pub async fn create_chat(
        &self,
        creator_id: String,
        creator_user_id: String,
        influencer_id: String,
        influencer_user_id: String,
    ) -> Result<Chat, AppError> {
        if let Some(existing) = self
            .store
            .find_chat_by_pair(&creator_id, &influencer_id)
            .await?
        {
            return Ok(existing);
        }

        let chat = Chat::new(creator_id, creator_user_id, influencer_id, influencer_user_id);
        match self.store.insert_chat(&chat).await {
            Ok(()) => {
                tracing::info!(chat_id = %chat.chat_id, "chat created");
                Ok(chat)
            }
            // Lost a create race: the unique pair index rejected the
            // insert, so the winner's row is the chat for this pair.
            Err(e) => {
                if let Some(existing) = self
                    .store
                    .find_chat_by_pair(&chat.creator_id, &chat.influencer_id)
                    .await?
                {
                    return Ok(existing);
                }
                Err(e)
            }
        }
    }

    pub async fn get_chat(&self, id_or_chat_id: &str) -> Result<Chat, AppError> {
        self.store
            .find_chat(id_or_chat_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Membership gate used by every user-attributed operation.
    pub async fn get_my_chat(&self, id_or_chat_id: &str, user_id: &str) -> Result<Chat, AppError> {
        let chat = self.get_chat(id_or_chat_id).await?;
        if chat.member_side(user_id).is_none() {
            return Err(AppError::Forbidden);
        }
        Ok(chat)
    }

    /// Role-scoped chat page with the last-message projection merged in.
    /// One bulk query fetches the newest non-recipient-blocked message per
    /// chat instead of one round trip per row.
    pub async fn list_chats_for_user(
        &self,
        user_id: &str,
        side: ChatSide,
        pagination: &Pagination,
    ) -> Result<Page<ChatListRow>, AppError> {
        let page = self
            .store
            .list_chats_for_user(user_id, side, pagination)
            .await?;

        let chat_ids: Vec<String> = page.docs.iter().map(|c| c.chat_id.clone()).collect();
        let last_messages = self.store.last_messages(&chat_ids).await?;
        let mut by_chat: HashMap<String, (String, chrono::DateTime<chrono::Utc>)> = last_messages
            .into_iter()
            .map(|m| (m.chat_id, (m.text, m.created_at)))
            .collect();

        Ok(page.map(|chat| {
            let last = by_chat.remove(&chat.chat_id);
            ChatListRow {
                chat,
                last_message: last.as_ref().map(|(text, _)| text.clone()),
                last_message_time: last.map(|(_, at)| at),
            }
        }))
    }

    /// Persists a message and increments the recipient side's unread
    /// counter. Author side, recipient block snapshot and recipient
    /// counter all derive from the same branch on the author's party id.
    pub async fn save_message(
        &self,
        chat_id: &str,
        author_id: &str,
        text: &str,
        caller_user_id: &str,
    ) -> Result<(Message, Chat), AppError> {
        if text.is_empty() {
            return Err(AppError::BadRequest("text must not be empty".into()));
        }

        let chat = self.get_my_chat(chat_id, caller_user_id).await?;
        let author_side = chat
            .party_side(author_id)
            .ok_or_else(|| AppError::BadRequest("author is not a party to this chat".into()))?;
        let recipient_side = author_side.other();

        let message = Message::new(
            chat.chat_id.clone(),
            author_id.to_string(),
            chat.user_id_for(author_side).to_string(),
            text.to_string(),
            chat.blocked_for(recipient_side),
        );

        self.store.insert_message(&message).await?;
        self.store
            .increment_unread(&chat.chat_id, recipient_side)
            .await?;

        self.events.publish(DomainEvent::MessageCreated {
            author_user_id: message.author_user_id.clone(),
            message: message.clone(),
            chat: chat.clone(),
        });

        Ok((message, chat))
    }

    /// Clears the caller's unread counter; no-op when already zero.
    pub async fn read_all_messages(&self, chat_id: &str, user_id: &str) -> Result<Chat, AppError> {
        let chat = self.get_my_chat(chat_id, user_id).await?;
        // Membership was just asserted, so the side is always present.
        if let Some(side) = chat.member_side(user_id) {
            if chat.unread_for(side) > 0 {
                self.store.reset_unread(&chat.chat_id, side).await?;
            }
        }
        Ok(chat)
    }

    /// Sets the caller's own block flag; a party restricts itself as
    /// sender, never the counterparty.
    pub async fn set_blocked(
        &self,
        chat_id: &str,
        user_id: &str,
        blocked: bool,
    ) -> Result<Chat, AppError> {
        let chat = self.get_my_chat(chat_id, user_id).await?;
        if let Some(side) = chat.member_side(user_id) {
            self.store.set_blocked(&chat.chat_id, side, blocked).await?;
        }
        self.get_chat(&chat.chat_id).await
    }

    pub async fn list_messages(
        &self,
        chat_id: &str,
        pagination: &Pagination,
    ) -> Result<Page<Message>, AppError> {
        self.store.list_messages(chat_id, pagination).await
    }

    /// Removes a message iff it belongs to the stated chat and the caller
    /// authored it, then publishes the deletion for the push path.
    pub async fn delete_message(
        &self,
        chat_id: &str,
        message_id: &str,
        caller_user_id: &str,
    ) -> Result<(), AppError> {
        let chat = self.get_my_chat(chat_id, caller_user_id).await?;
        let removed = self
            .store
            .delete_message(&chat.chat_id, message_id, caller_user_id)
            .await?;
        if !removed {
            return Err(AppError::NotFound);
        }

        self.events.publish(DomainEvent::MessageDeleted {
            user_id: caller_user_id.to_string(),
            chat_id: chat.chat_id,
        });
        Ok(())
    }
}
