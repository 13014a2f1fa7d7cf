use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of conversation content. `blocked_by_recipient` is a snapshot
/// of the recipient's block flag at send time; it is never updated when
/// the flag changes later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub chat_id: String,
    pub author_id: String,
    pub author_user_id: String,
    pub text: String,
    pub blocked_by_recipient: bool,
    pub is_complete_message: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        chat_id: String,
        author_id: String,
        author_user_id: String,
        text: String,
        blocked_by_recipient: bool,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            chat_id,
            author_id,
            author_user_id,
            text,
            blocked_by_recipient,
            is_complete_message: false,
            created_at: Utc::now(),
        }
    }
}
