use chat_service::services::{ChatService, HttpIdentityBridge};
use chat_service::store::PgChatStore;
use chat_service::websocket::{handlers::spawn_event_pump, RoomRegistry, SessionRegistry};
use chat_service::{config, db, error, events::EventBus, logging, migrations, routes, state::AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // Schema must be in sync before anything touches the store.
    migrations::run_all(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let events = EventBus::default();
    let chats = Arc::new(ChatService::new(Arc::new(PgChatStore::new(db)), events.clone()));
    let bridge = Arc::new(HttpIdentityBridge::new(
        cfg.auth_service_url.clone(),
        cfg.auth_timeout_ms,
    )?);

    let state = AppState {
        chats,
        bridge,
        sessions: SessionRegistry::new(),
        rooms: RoomRegistry::new(),
        events,
        config: cfg.clone(),
    };

    // Bridge domain events to connected peers for the whole process life.
    let _event_pump = spawn_event_pump(state.clone());

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, routes::build_router(state))
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
