use crate::error::AppError;
use crate::events::DomainEvent;
use crate::models::Identity;
use crate::state::AppState;
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::registry::SessionHandle;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::mpsc::unbounded_channel;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

fn bearer_token(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    params.token.clone().or_else(|| {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).to_string())
    })
}

/// Connection entry point. A missing credential is rejected before the
/// upgrade; credential verification itself happens on the open socket so
/// the client receives a `connection_error` acknowledgment.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(token) = bearer_token(&params, &headers) else {
        debug!("websocket rejected: no credential in handshake");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(state, token, socket))
}

async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text)).await.is_ok(),
        Err(_) => false,
    }
}

async fn handle_socket(state: AppState, token: String, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    let identity = match state.bridge.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            // No partial registration on a failed handshake.
            send_event(
                &mut sink,
                &ServerEvent::ConnectionError {
                    message: e.to_string(),
                },
            )
            .await;
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    let (tx, mut rx) = unbounded_channel();
    state.sessions.set_session(&identity.user_id, tx.clone()).await;
    let _ = tx.send(ServerEvent::Connected {
        message: "Connection Successful.".into(),
    });
    debug!(user_id = %identity.user_id, "websocket connected");

    // Room membership of this connection only; a reconnect starts empty.
    let mut joined: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(event) => {
                        if !send_event(&mut sink, &event).await {
                            break;
                        }
                    }
                    // Sender side dropped; nothing left to deliver.
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                handle_client_event(&state, &identity, &tx, &mut joined, event)
                                    .await;
                            }
                            Err(e) => {
                                debug!(user_id = %identity.user_id, error = %e, "unparseable client event");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(user_id = %identity.user_id, error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        }
    }

    state.rooms.leave_all(&identity.user_id, &joined, &tx).await;
    state
        .sessions
        .remove_session_if_same(&identity.user_id, &tx)
        .await;
    debug!(user_id = %identity.user_id, "websocket disconnected");
}

async fn handle_client_event(
    state: &AppState,
    identity: &Identity,
    tx: &SessionHandle,
    joined: &mut HashSet<String>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::ChatJoin { chat_id } => {
            if joined.contains(&chat_id) {
                return;
            }
            if let Err(e) = join_chat(state, identity, tx, joined, &chat_id).await {
                let _ = tx.send(ServerEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        ClientEvent::ChatLeave { chat_id } => {
            if !joined.remove(&chat_id) {
                return;
            }
            // No notice when the membership already belongs to a newer
            // connection; the user is still in the room through it.
            if state.rooms.leave(&chat_id, &identity.user_id, tx).await {
                state
                    .rooms
                    .broadcast(
                        &chat_id,
                        ServerEvent::UserLeave {
                            text: format!("{} left the chat", identity.display_name()),
                        },
                    )
                    .await;
            }
        }
        ClientEvent::TypingStart { chat_id } => {
            state
                .rooms
                .broadcast_except(&chat_id, &identity.user_id, ServerEvent::TypingStart)
                .await;
        }
        ClientEvent::TypingStop { chat_id } => {
            state
                .rooms
                .broadcast_except(&chat_id, &identity.user_id, ServerEvent::TypingStop)
                .await;
        }
    }
}

/// Join sequence: clear unread, membership-checked fetch, then room entry
/// and a notice to the *other* members. Read-resets already committed stay
/// committed even if the connection goes away mid-sequence.
async fn join_chat(
    state: &AppState,
    identity: &Identity,
    tx: &SessionHandle,
    joined: &mut HashSet<String>,
    chat_id: &str,
) -> Result<(), AppError> {
    state
        .chats
        .read_all_messages(chat_id, &identity.user_id)
        .await?;
    let chat = state.chats.get_my_chat(chat_id, &identity.user_id).await?;

    state
        .rooms
        .join(&chat.chat_id, &identity.user_id, tx.clone())
        .await;
    joined.insert(chat.chat_id.clone());
    debug!(user_id = %identity.user_id, chat_id = %chat.chat_id, "joined chat room");

    state
        .rooms
        .broadcast_except(
            &chat.chat_id,
            &identity.user_id,
            ServerEvent::UserJoin {
                text: format!("{} joined the chat", identity.display_name()),
            },
        )
        .await;
    Ok(())
}

/// Bridges the domain event bus to live connections. Delivery is presence
/// based: no session, no push, no queueing.
pub fn spawn_event_pump(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = state.events.subscribe();
        loop {
            match rx.recv().await {
                Ok(DomainEvent::MessageCreated {
                    author_user_id,
                    message,
                    chat,
                }) => {
                    // The author already has the message from its own
                    // write response.
                    state
                        .rooms
                        .broadcast_except(
                            &chat.chat_id,
                            &author_user_id,
                            ServerEvent::Message { text: message.text },
                        )
                        .await;
                }
                Ok(DomainEvent::MessageDeleted { user_id, chat_id }) => {
                    handle_message_deleted(&state, user_id, chat_id).await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event pump lagged behind the bus");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn handle_message_deleted(state: &AppState, user_id: String, chat_id: String) {
    let chat = match state.chats.get_chat(&chat_id).await {
        Ok(chat) => chat,
        Err(e) => {
            debug!(chat_id = %chat_id, error = %e, "delete push skipped, chat unresolved");
            return;
        }
    };

    let counterparty = if chat.creator_user_id == user_id {
        chat.influencer_user_id.clone()
    } else {
        chat.creator_user_id.clone()
    };

    if let Some(handle) = state.sessions.get_session(&counterparty).await {
        let _ = handle.send(ServerEvent::MessageDelete { user_id, chat_id });
    }
}
