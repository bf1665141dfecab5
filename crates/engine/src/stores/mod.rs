//! In-memory state owned by the session actor.
//!
//! - `GameState` - the canonical board
//! - `UndoStack` - bounded before/after snapshots
//! - `HistoryLog` - capped DM audit trail

pub mod game_state;
pub mod history;
pub mod undo;

pub use game_state::{ApplyMode, ApplyReport, GameState, StateCounts};
pub use history::HistoryLog;
pub use undo::{ActionSnapshot, UndoStack};
