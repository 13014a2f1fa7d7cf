use crate::error::AppError;
use crate::models::{Identity, Message, Page, Pagination};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: String,
    pub author_id: String,
    pub text: String,
}

/// Persists the message; the domain event published by the service drives
/// the WebSocket push, not this handler.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let (message, _chat) = state
        .chats
        .save_message(&body.chat_id, &body.author_id, &body.text, &identity.user_id)
        .await?;
    Ok(Json(message))
}

pub async fn list_chat_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Message>>, AppError> {
    // Listing is attributed to the caller; gate it like every other
    // per-user chat operation.
    state.chats.get_my_chat(&chat_id, &identity.user_id).await?;
    let page = state.chats.list_messages(&chat_id, &pagination).await?;
    Ok(Json(page))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((chat_id, message_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .chats
        .delete_message(&chat_id, &message_id, &identity.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
