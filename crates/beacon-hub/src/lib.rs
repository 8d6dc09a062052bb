pub mod hub;
pub mod message;

pub use hub::{BroadcastHub, SharedBroadcastHub};
pub use message::{EventNotice, WsMessage};
