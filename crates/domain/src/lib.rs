//! MapKeep Domain - Pure board model
//!
//! Ids, value objects, entities, fog, history entries and snapshots for
//! the authoritative map server. No async and no I/O live here.

pub mod entities;
pub mod error;
pub mod events;
pub mod history;
pub mod ids;
pub mod snapshot;
pub mod value_objects;

pub use entities::{
    cells_in_radius, diff_tokens, AbilityScores, Asset, FloorMap, FogMode, FogState, Level, Light,
    Location, SpawnPoint, Token, TokenKind, TokenLight, TokenPatch, Vision, DEFAULT_FLOOR_SIZE,
    MAX_NOTES_LENGTH, MAX_VISION_RADIUS,
};
pub use error::DomainError;
pub use events::MapEvent;
pub use history::{
    describe_changes, FieldChange, HistoryActor, HistoryDetails, HistoryEvent, PositionRef,
};
pub use ids::{ActionId, AssetId, HistoryEventId, LevelId, LocationId, TokenId};
pub use snapshot::GameSnapshot;
pub use value_objects::{Cell, FloorKind, Role};
