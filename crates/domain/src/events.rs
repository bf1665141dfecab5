//! Map events
//!
//! Fine-grained board changes. The engine folds them into `statePatch`
//! batches for viewers, and `fogRevealed` events double as the fog
//! encoding inside saved snapshots.

use serde::{Deserialize, Serialize};

use crate::entities::{Asset, FogMode, Token};
use crate::value_objects::{Cell, FloorKind};
use crate::{AssetId, LevelId, TokenId};

/// A single change to the board, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MapEvent {
    TokenSpawned {
        token: Token,
    },
    TokenMoved {
        token_id: TokenId,
        level_id: LevelId,
        x: i32,
        y: i32,
    },
    TokenUpdated {
        token: Token,
    },
    TokenRemoved {
        token_id: TokenId,
    },
    AssetPlaced {
        asset: Asset,
        /// Previous occupant of the cell, removed by this placement
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaced: Option<AssetId>,
    },
    AssetMoved {
        asset_id: AssetId,
        level_id: LevelId,
        x: i32,
        y: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replaced: Option<AssetId>,
    },
    AssetRemoved {
        asset_id: AssetId,
    },
    DoorToggled {
        asset_id: AssetId,
        open: bool,
    },
    FloorPainted {
        level_id: LevelId,
        cells: Vec<Cell>,
        kind: Option<FloorKind>,
    },
    FogRevealed {
        level_id: LevelId,
        cells: Vec<Cell>,
    },
    FogObscured {
        level_id: LevelId,
        cells: Vec<Cell>,
    },
    FogModeChanged {
        mode: FogMode,
    },
    TokenHiddenToggled {
        token_id: TokenId,
        hidden: bool,
    },
    AssetHiddenToggled {
        asset_id: AssetId,
        hidden: bool,
    },
    TokenReordered {
        token_id: TokenId,
        z_index: i32,
    },
    AssetReordered {
        asset_id: AssetId,
        z_index: i32,
    },
    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}

impl MapEvent {
    /// Wire tag of this event, as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            MapEvent::TokenSpawned { .. } => "tokenSpawned",
            MapEvent::TokenMoved { .. } => "tokenMoved",
            MapEvent::TokenUpdated { .. } => "tokenUpdated",
            MapEvent::TokenRemoved { .. } => "tokenRemoved",
            MapEvent::AssetPlaced { .. } => "assetPlaced",
            MapEvent::AssetMoved { .. } => "assetMoved",
            MapEvent::AssetRemoved { .. } => "assetRemoved",
            MapEvent::DoorToggled { .. } => "doorToggled",
            MapEvent::FloorPainted { .. } => "floorPainted",
            MapEvent::FogRevealed { .. } => "fogRevealed",
            MapEvent::FogObscured { .. } => "fogObscured",
            MapEvent::FogModeChanged { .. } => "fogModeChanged",
            MapEvent::TokenHiddenToggled { .. } => "tokenHiddenToggled",
            MapEvent::AssetHiddenToggled { .. } => "assetHiddenToggled",
            MapEvent::TokenReordered { .. } => "tokenReordered",
            MapEvent::AssetReordered { .. } => "assetReordered",
            MapEvent::Unknown => "unknown",
        }
    }
}
