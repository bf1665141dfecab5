//! MapKeep Engine library.
//!
//! Authoritative server for a shared tactical map: one board, many viewers,
//! a DM role that edits and players that move their own tokens.
//!
//! ## Structure
//!
//! - `stores/` - In-memory board, undo stack and history log
//! - `use_cases/` - The session actor and its command handlers
//! - `infrastructure/` - Configuration, ports and adapters, persistence
//! - `api/` - Connection registry and the WebSocket endpoint
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod stores;
pub mod use_cases;

pub use app::App;
