pub mod chat_service;
pub mod identity;

pub use chat_service::ChatService;
pub use identity::{HttpIdentityBridge, IdentityBridge};
