use crate::error::AppError;
use crate::models::{Chat, ChatListRow, ChatSide, Identity, Page, Pagination};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub creator_id: String,
    pub creator_user_id: String,
    pub influencer_id: String,
    pub influencer_user_id: String,
}

/// Chats where the caller holds the creator side (i.e. the influencer
/// counterparties the caller talks to).
pub async fn list_influencers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ChatListRow>>, AppError> {
    let page = state
        .chats
        .list_chats_for_user(&identity.user_id, ChatSide::Creator, &pagination)
        .await?;
    Ok(Json(page))
}

/// Chats where the caller holds the influencer side.
pub async fn list_creators(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ChatListRow>>, AppError> {
    let page = state
        .chats
        .list_chats_for_user(&identity.user_id, ChatSide::Influencer, &pagination)
        .await?;
    Ok(Json(page))
}

pub async fn find_or_create_chat(
    State(state): State<AppState>,
    Json(body): Json<CreateChatRequest>,
) -> Result<Json<Chat>, AppError> {
    let chat = state
        .chats
        .create_chat(
            body.creator_id,
            body.creator_user_id,
            body.influencer_id,
            body.influencer_user_id,
        )
        .await?;
    Ok(Json(chat))
}

pub async fn get_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
) -> Result<Json<Chat>, AppError> {
    let chat = state.chats.get_my_chat(&chat_id, &identity.user_id).await?;
    Ok(Json(chat))
}

pub async fn block_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
) -> Result<Json<Chat>, AppError> {
    let chat = state
        .chats
        .set_blocked(&chat_id, &identity.user_id, true)
        .await?;
    Ok(Json(chat))
}

pub async fn unblock_chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(chat_id): Path<String>,
) -> Result<Json<Chat>, AppError> {
    let chat = state
        .chats
        .set_blocked(&chat_id, &identity.user_id, false)
        .await?;
    Ok(Json(chat))
}
