use serde::{Deserialize, Serialize};

/// Client-to-server events. Wire format both directions is
/// `{"event": "...", "data": {...}}` with camelCase payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "onChatJoin", rename_all = "camelCase")]
    ChatJoin { chat_id: String },
    #[serde(rename = "onChatLeave", rename_all = "camelCase")]
    ChatLeave { chat_id: String },
    #[serde(rename = "onTypingStart", rename_all = "camelCase")]
    TypingStart { chat_id: String },
    #[serde(rename = "onTypingStop", rename_all = "camelCase")]
    TypingStop { chat_id: String },
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected { message: String },
    #[serde(rename = "connection_error")]
    ConnectionError { message: String },
    /// Per-operation failure (e.g. joining a chat the caller is not a
    /// member of); the connection stays open.
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "userJoin")]
    UserJoin { text: String },
    #[serde(rename = "userLeave")]
    UserLeave { text: String },
    #[serde(rename = "onTypingStart")]
    TypingStart,
    #[serde(rename = "onTypingStop")]
    TypingStop,
    #[serde(rename = "onMessage")]
    Message { text: String },
    #[serde(rename = "onMessageDelete", rename_all = "camelCase")]
    MessageDelete { user_id: String, chat_id: String },
}
