//! Domain entities - Core board objects with identity

mod asset;
mod floor;
mod fog;
mod location;
mod token;

pub use asset::Asset;
pub use floor::{FloorMap, DEFAULT_FLOOR_SIZE};
pub use fog::{cells_in_radius, FogState};
pub use location::{FogMode, Level, Light, Location, SpawnPoint};
pub use token::{
    diff_tokens, AbilityScores, Token, TokenKind, TokenLight, TokenPatch, Vision,
    MAX_NOTES_LENGTH, MAX_VISION_RADIUS,
};
