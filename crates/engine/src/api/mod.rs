//! API layer - HTTP and WebSocket entry points.

pub mod connections;
pub mod websocket;

pub use connections::{ClientRecord, ConnectionError, ConnectionManager};
