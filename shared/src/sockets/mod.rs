pub mod broadcast;
pub mod connections;
pub mod handler;

pub use broadcast::WebSocketEventSink;
pub use handler::{handle_websocket_event, is_websocket_event};
