//! MapKeep Protocol - Wire types between the map server and its viewers
//!
//! This crate contains everything that crosses the WebSocket:
//! - `ClientMessage` commands sent by viewers
//! - `ServerMessage` replies and broadcasts
//! - Small response DTOs (location tree nodes, undo/redo counters, user info)
//!
//! # Design Principles
//!
//! 1. **No business logic** - Pure data types and serialization
//! 2. **Forward compatible** - Unknown tags decode to an `Unknown` variant
//! 3. **camelCase on the wire** - Tags and field names alike

pub mod messages;
pub mod responses;

pub use messages::{ClientMessage, ServerMessage, TokenDraft};
pub use responses::{ErrorCode, LocationsTreeNode, UndoRedoState, UserInfo};

// Re-export the domain vocabulary carried inside messages
pub use mapkeep_domain::{
    Asset, Cell, FogMode, GameSnapshot, HistoryEvent, MapEvent, Role, Token, TokenPatch,
};
