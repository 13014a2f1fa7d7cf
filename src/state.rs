use crate::{
    config::Config,
    events::EventBus,
    services::{ChatService, IdentityBridge},
    websocket::{RoomRegistry, SessionRegistry},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chats: Arc<ChatService>,
    pub bridge: Arc<dyn IdentityBridge>,
    pub sessions: SessionRegistry,
    pub rooms: RoomRegistry,
    pub events: EventBus,
    pub config: Arc<Config>,
}
