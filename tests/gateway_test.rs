//! Gateway tests over real sockets: handshake auth, room fan-out, the
//! HTTP-to-WebSocket handoff and direct delete pushes.

use async_trait::async_trait;
use chat_service::config::Config;
use chat_service::error::AppError;
use chat_service::events::EventBus;
use chat_service::models::Identity;
use chat_service::routes;
use chat_service::services::{ChatService, IdentityBridge};
use chat_service::state::AppState;
use chat_service::store::{ChatStore, MemoryChatStore};
use chat_service::websocket::handlers::spawn_event_pump;
use chat_service::websocket::{RoomRegistry, ServerEvent, SessionRegistry};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as TtMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Identity bridge with a fixed token table, standing in for the external
/// user service.
struct StaticBridge(HashMap<String, Identity>);

#[async_trait]
impl IdentityBridge for StaticBridge {
    async fn authenticate(&self, token: &str) -> Result<Identity, AppError> {
        self.0.get(token).cloned().ok_or(AppError::Unauthorized)
    }
}

fn identity(user_id: &str, first_name: Option<&str>) -> Identity {
    Identity {
        user_id: user_id.into(),
        first_name: first_name.map(String::from),
        last_name: None,
    }
}

async fn start_server() -> (String, AppState) {
    let store: Arc<dyn ChatStore> = Arc::new(MemoryChatStore::new());
    let events = EventBus::default();
    let chats = Arc::new(ChatService::new(store, events.clone()));

    let mut tokens = HashMap::new();
    tokens.insert("tok-u1".to_string(), identity("u1", Some("ada")));
    tokens.insert("tok-u2".to_string(), identity("u2", Some("bea")));
    tokens.insert("tok-u3".to_string(), identity("u3", None));

    let state = AppState {
        chats,
        bridge: Arc::new(StaticBridge(tokens)),
        sessions: SessionRegistry::new(),
        rooms: RoomRegistry::new(),
        events,
        config: Arc::new(Config::test_defaults()),
    };
    spawn_event_pump(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("127.0.0.1:{}", addr.port()), state)
}

async fn connect(addr: &str, token: &str) -> WsStream {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?token={token}"))
        .await
        .expect("websocket handshake failed");
    ws
}

async fn recv_event(ws: &mut WsStream) -> ServerEvent {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .expect("socket error");
        if let TtMessage::Text(text) = message {
            return serde_json::from_str(&text).expect("unparseable server event");
        }
    }
}

async fn expect_silence(ws: &mut WsStream) {
    match tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(TtMessage::Text(text)))) => panic!("unexpected event: {text}"),
        Ok(_) => {}
    }
}

async fn send_client_event(ws: &mut WsStream, event: &chat_service::websocket::ClientEvent) {
    let text = serde_json::to_string(event).unwrap();
    ws.send(TtMessage::Text(text)).await.unwrap();
}

async fn join(ws: &mut WsStream, chat_id: &str) {
    send_client_event(
        ws,
        &chat_service::websocket::ClientEvent::ChatJoin {
            chat_id: chat_id.into(),
        },
    )
    .await;
}

async fn wait_for_room(state: &AppState, chat_id: &str, user_id: &str) {
    for _ in 0..100 {
        if state.rooms.contains(chat_id, user_id).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{user_id} never joined room {chat_id}");
}

async fn create_chat(addr: &str) -> String {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/find/create"))
        .header("Authorization", "Bearer tok-u1")
        .json(&serde_json::json!({
            "creatorId": "c1",
            "creatorUserId": "u1",
            "influencerId": "i1",
            "influencerUserId": "u2",
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let chat: serde_json::Value = response.json().await.unwrap();
    chat["chatId"].as_str().unwrap().to_string()
}

async fn send_message_http(addr: &str, token: &str, chat_id: &str, author_id: &str, text: &str) -> serde_json::Value {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/message/send"))
        .header("Authorization", format!("Bearer {token}"))
        .json(&serde_json::json!({
            "chatId": chat_id,
            "authorId": author_id,
            "text": text,
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    response.json().await.unwrap()
}

#[tokio::test]
async fn handshake_without_token_is_rejected() {
    let (addr, _state) = start_server().await;
    let result = connect_async(format!("ws://{addr}/ws")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn invalid_token_gets_connection_error_then_close() {
    let (addr, _state) = start_server().await;
    let mut ws = connect(&addr, "nope").await;

    match recv_event(&mut ws).await {
        ServerEvent::ConnectionError { .. } => {}
        other => panic!("expected connection_error, got {other:?}"),
    }

    // The server closes right after the error acknowledgment.
    let next = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out waiting for close");
    assert!(matches!(next, Some(Ok(TtMessage::Close(_))) | None));
}

#[tokio::test]
async fn valid_token_gets_connected_ack() {
    let (addr, _state) = start_server().await;
    let mut ws = connect(&addr, "tok-u1").await;

    match recv_event(&mut ws).await {
        ServerEvent::Connected { message } => assert_eq!(message, "Connection Successful."),
        other => panic!("expected connected, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthenticated_http_request_is_rejected() {
    let (addr, _state) = start_server().await;
    let response = reqwest::Client::new()
        .get(format!("http://{addr}/influencers"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn room_fanout_and_isolation() {
    let (addr, state) = start_server().await;
    let chat_id = create_chat(&addr).await;

    let mut ws1 = connect(&addr, "tok-u1").await;
    let mut ws2 = connect(&addr, "tok-u2").await;
    let mut ws3 = connect(&addr, "tok-u3").await;
    assert!(matches!(recv_event(&mut ws1).await, ServerEvent::Connected { .. }));
    assert!(matches!(recv_event(&mut ws2).await, ServerEvent::Connected { .. }));
    assert!(matches!(recv_event(&mut ws3).await, ServerEvent::Connected { .. }));

    join(&mut ws1, &chat_id).await;
    wait_for_room(&state, &chat_id, "u1").await;
    join(&mut ws2, &chat_id).await;
    wait_for_room(&state, &chat_id, "u2").await;

    // The joiner's notice goes to the other members only.
    match recv_event(&mut ws1).await {
        ServerEvent::UserJoin { text } => assert_eq!(text, "Bea joined the chat"),
        other => panic!("expected userJoin, got {other:?}"),
    }

    // HTTP write reaches WebSocket peers, excluding the author.
    send_message_http(&addr, "tok-u1", &chat_id, "c1", "hello there").await;
    match recv_event(&mut ws2).await {
        ServerEvent::Message { text } => assert_eq!(text, "hello there"),
        other => panic!("expected onMessage, got {other:?}"),
    }
    expect_silence(&mut ws1).await;
    // ws3 never joined the room and must not see chat traffic.
    expect_silence(&mut ws3).await;

    // Typing relay excludes the typist.
    send_client_event(
        &mut ws1,
        &chat_service::websocket::ClientEvent::TypingStart {
            chat_id: chat_id.clone(),
        },
    )
    .await;
    assert_eq!(recv_event(&mut ws2).await, ServerEvent::TypingStart);
    expect_silence(&mut ws1).await;

    // Leaving notifies the remaining members.
    send_client_event(
        &mut ws2,
        &chat_service::websocket::ClientEvent::ChatLeave {
            chat_id: chat_id.clone(),
        },
    )
    .await;
    match recv_event(&mut ws1).await {
        ServerEvent::UserLeave { text } => assert_eq!(text, "Bea left the chat"),
        other => panic!("expected userLeave, got {other:?}"),
    }
}

#[tokio::test]
async fn joining_clears_the_callers_unread_counter() {
    let (addr, state) = start_server().await;
    let chat_id = create_chat(&addr).await;

    send_message_http(&addr, "tok-u1", &chat_id, "c1", "one").await;
    send_message_http(&addr, "tok-u1", &chat_id, "c1", "two").await;
    let chat = state.chats.get_chat(&chat_id).await.unwrap();
    assert_eq!(chat.unread_by_influencer, 2);

    let mut ws2 = connect(&addr, "tok-u2").await;
    assert!(matches!(recv_event(&mut ws2).await, ServerEvent::Connected { .. }));
    join(&mut ws2, &chat_id).await;
    wait_for_room(&state, &chat_id, "u2").await;

    let chat = state.chats.get_chat(&chat_id).await.unwrap();
    assert_eq!(chat.unread_by_influencer, 0);
}

#[tokio::test]
async fn join_of_foreign_chat_reports_an_error() {
    let (addr, _state) = start_server().await;
    let chat_id = create_chat(&addr).await;

    let mut ws3 = connect(&addr, "tok-u3").await;
    assert!(matches!(recv_event(&mut ws3).await, ServerEvent::Connected { .. }));
    join(&mut ws3, &chat_id).await;

    match recv_event(&mut ws3).await {
        ServerEvent::Error { .. } => {}
        other => panic!("expected error event, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_push_goes_directly_to_the_counterparty() {
    let (addr, state) = start_server().await;
    let chat_id = create_chat(&addr).await;

    let message = send_message_http(&addr, "tok-u1", &chat_id, "c1", "oops").await;
    let message_id = message["messageId"].as_str().unwrap();

    // The counterparty holds a session but is not in the room.
    let mut ws2 = connect(&addr, "tok-u2").await;
    assert!(matches!(recv_event(&mut ws2).await, ServerEvent::Connected { .. }));
    assert!(state.sessions.get_session("u2").await.is_some());

    let response = reqwest::Client::new()
        .delete(format!("http://{addr}/{chat_id}/message/{message_id}/delete"))
        .header("Authorization", "Bearer tok-u1")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    match recv_event(&mut ws2).await {
        ServerEvent::MessageDelete { user_id, chat_id: event_chat } => {
            assert_eq!(user_id, "u1");
            assert_eq!(event_chat, chat_id);
        }
        other => panic!("expected onMessageDelete, got {other:?}"),
    }
}

#[tokio::test]
async fn last_registered_session_wins() {
    let (addr, state) = start_server().await;
    let chat_id = create_chat(&addr).await;
    let message = send_message_http(&addr, "tok-u1", &chat_id, "c1", "stale").await;
    let message_id = message["messageId"].as_str().unwrap();

    let mut old = connect(&addr, "tok-u2").await;
    assert!(matches!(recv_event(&mut old).await, ServerEvent::Connected { .. }));
    let mut new = connect(&addr, "tok-u2").await;
    assert!(matches!(recv_event(&mut new).await, ServerEvent::Connected { .. }));

    // Direct pushes must reach only the replacement connection.
    let response = reqwest::Client::new()
        .delete(format!("http://{addr}/{chat_id}/message/{message_id}/delete"))
        .header("Authorization", "Bearer tok-u1")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    assert!(matches!(
        recv_event(&mut new).await,
        ServerEvent::MessageDelete { .. }
    ));
    expect_silence(&mut old).await;

    // The stale connection's teardown must not evict the live session.
    drop(old);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.sessions.get_session("u2").await.is_some());
}
