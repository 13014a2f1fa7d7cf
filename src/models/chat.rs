use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two fixed parties of a chat. Party ids are distinct from the
/// user ids behind them; both are carried on the chat row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSide {
    Creator,
    Influencer,
}

impl ChatSide {
    pub fn other(self) -> ChatSide {
        match self {
            ChatSide::Creator => ChatSide::Influencer,
            ChatSide::Influencer => ChatSide::Creator,
        }
    }
}

/// A conversation between exactly two fixed parties. At most one chat
/// exists per (creator_id, influencer_id) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub chat_id: String,
    pub creator_id: String,
    pub influencer_id: String,
    pub creator_user_id: String,
    pub influencer_user_id: String,
    pub unread_by_creator: i64,
    pub unread_by_influencer: i64,
    pub blocked_by_creator: bool,
    pub blocked_by_influencer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(
        creator_id: String,
        creator_user_id: String,
        influencer_id: String,
        influencer_user_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            chat_id: Uuid::new_v4().to_string(),
            creator_id,
            influencer_id,
            creator_user_id,
            influencer_user_id,
            unread_by_creator: 0,
            unread_by_influencer: 0,
            blocked_by_creator: false,
            blocked_by_influencer: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Which side a user id belongs to, if the user is a member at all.
    pub fn member_side(&self, user_id: &str) -> Option<ChatSide> {
        if self.creator_user_id == user_id {
            Some(ChatSide::Creator)
        } else if self.influencer_user_id == user_id {
            Some(ChatSide::Influencer)
        } else {
            None
        }
    }

    /// Which side a party id belongs to.
    pub fn party_side(&self, party_id: &str) -> Option<ChatSide> {
        if self.creator_id == party_id {
            Some(ChatSide::Creator)
        } else if self.influencer_id == party_id {
            Some(ChatSide::Influencer)
        } else {
            None
        }
    }

    pub fn user_id_for(&self, side: ChatSide) -> &str {
        match side {
            ChatSide::Creator => &self.creator_user_id,
            ChatSide::Influencer => &self.influencer_user_id,
        }
    }

    pub fn blocked_for(&self, side: ChatSide) -> bool {
        match side {
            ChatSide::Creator => self.blocked_by_creator,
            ChatSide::Influencer => self.blocked_by_influencer,
        }
    }

    pub fn unread_for(&self, side: ChatSide) -> i64 {
        match side {
            ChatSide::Creator => self.unread_by_creator,
            ChatSide::Influencer => self.unread_by_influencer,
        }
    }
}

/// Chat listing row with the most recent non-recipient-blocked message
/// merged in (bulk-fetched, one query for the whole page).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListRow {
    #[serde(flatten)]
    pub chat: Chat,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> Chat {
        Chat::new("c1".into(), "u1".into(), "i1".into(), "u2".into())
    }

    #[test]
    fn member_side_resolution() {
        let chat = chat();
        assert_eq!(chat.member_side("u1"), Some(ChatSide::Creator));
        assert_eq!(chat.member_side("u2"), Some(ChatSide::Influencer));
        assert_eq!(chat.member_side("u3"), None);
    }

    #[test]
    fn party_side_resolution() {
        let chat = chat();
        assert_eq!(chat.party_side("c1"), Some(ChatSide::Creator));
        assert_eq!(chat.party_side("i1"), Some(ChatSide::Influencer));
        assert_eq!(chat.party_side("x"), None);
    }

    #[test]
    fn new_chat_starts_clean() {
        let chat = chat();
        assert_eq!(chat.unread_by_creator, 0);
        assert_eq!(chat.unread_by_influencer, 0);
        assert!(!chat.blocked_by_creator);
        assert!(!chat.blocked_by_influencer);
        assert!(!chat.chat_id.is_empty());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(chat()).unwrap();
        assert!(value.get("creatorUserId").is_some());
        assert!(value.get("unreadByInfluencer").is_some());
    }
}
