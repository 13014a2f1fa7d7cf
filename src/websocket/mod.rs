pub mod events;
pub mod handlers;
pub mod registry;

pub use events::{ClientEvent, ServerEvent};
pub use registry::{RoomRegistry, SessionHandle, SessionRegistry};
