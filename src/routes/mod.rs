use crate::state::AppState;
use axum::routing::{delete, get, post};
use axum::{middleware, Router};

pub mod chats;
pub mod messages;

use chats::{block_chat, find_or_create_chat, get_chat, list_creators, list_influencers, unblock_chat};
use messages::{delete_message, list_chat_messages, send_message};

pub fn build_router(state: AppState) -> Router {
    // Liveness probe and the WebSocket endpoint stay outside the HTTP
    // auth layer; the gateway authenticates its own handshake.
    let public = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ws", get(crate::websocket::handlers::ws_handler));

    let api = Router::new()
        .route("/influencers", get(list_influencers))
        .route("/creators", get(list_creators))
        .route("/find/create", post(find_or_create_chat))
        .route("/:chat_id/get", get(get_chat))
        .route("/:chat_id/block", post(block_chat))
        .route("/:chat_id/unblock", post(unblock_chat))
        .route("/:chat_id/messages", get(list_chat_messages))
        .route("/message/send", post(send_message))
        .route("/:chat_id/message/:message_id/delete", delete(delete_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    let router = public.merge(api);
    crate::middleware::with_defaults(router).with_state(state)
}
