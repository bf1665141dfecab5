//! Game snapshots - the file format and the unit of every load/reset/undo.
//!
//! Every top-level field is optional: a snapshot with only `tokens` replaces
//! the tokens and leaves everything else alone. Fog travels as
//! `fogRevealed` events, one per level; `fogLevels` narrows a fog rebuild to
//! the listed levels.
//!
//! Snapshots come from hand-edited files and from clients, so reading is
//! lenient: entries that cannot be understood are dropped rather than
//! failing the whole document.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{Asset, FloorMap, FogMode, FogState, Location, Token};
use crate::events::MapEvent;
use crate::value_objects::{Cell, FloorKind};
use crate::LevelId;

/// Full or partial board state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct GameSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<Token>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<Asset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floors: Option<FloorMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<MapEvent>>,
    /// Restrict the fog rebuild to these levels; absent means all levels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog_levels: Option<Vec<LevelId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fog_mode: Option<FogMode>,
}

impl GameSnapshot {
    /// Parse a snapshot document leniently.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value::<RawSnapshot>(value)
            .map(Self::from)
            .unwrap_or_default()
    }

    /// Turn a possibly-partial document into a full one: missing board
    /// fields become empty, a missing location becomes the built-in one.
    pub fn into_full(mut self) -> Self {
        if self.location.is_none() {
            self.location = Some(Location::fallback());
        }
        self.tokens.get_or_insert_with(Vec::new);
        self.assets.get_or_insert_with(Vec::new);
        self.floors.get_or_insert_with(FloorMap::new);
        self.events.get_or_insert_with(Vec::new);
        self.fog_levels = None;
        self
    }

    /// Encode fog as one `fogRevealed` event per non-empty level.
    pub fn fog_events(fog: &FogState) -> Vec<MapEvent> {
        fog.levels()
            .map(|(level_id, cells)| MapEvent::FogRevealed {
                level_id: level_id.clone(),
                cells: cells.iter().copied().collect(),
            })
            .collect()
    }

    /// Decode fog from `events`, replaying reveals and obscures in order.
    pub fn fog_cells(&self) -> BTreeMap<LevelId, BTreeSet<Cell>> {
        let mut fog: BTreeMap<LevelId, BTreeSet<Cell>> = BTreeMap::new();
        for event in self.events.iter().flatten() {
            match event {
                MapEvent::FogRevealed { level_id, cells } => {
                    fog.entry(level_id.clone())
                        .or_default()
                        .extend(cells.iter().copied());
                }
                MapEvent::FogObscured { level_id, cells } => {
                    if let Some(set) = fog.get_mut(level_id) {
                        for cell in cells {
                            set.remove(cell);
                        }
                    }
                }
                _ => {}
            }
        }
        fog.retain(|_, cells| !cells.is_empty());
        fog
    }
}

/// Wire shape read before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSnapshot {
    location: Option<Value>,
    tokens: Option<Vec<Value>>,
    assets: Option<Vec<Value>>,
    floors: Option<Value>,
    events: Option<Vec<Value>>,
    fog_levels: Option<Vec<Value>>,
    fog_mode: Option<Value>,
}

impl From<RawSnapshot> for GameSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        Self {
            location: raw
                .location
                .map(|value| Location::from_value(&value).unwrap_or_else(Location::fallback)),
            tokens: raw.tokens.map(|values| {
                values
                    .into_iter()
                    .filter_map(parse_with_id::<Token>)
                    .map(|mut token| {
                        token.normalize();
                        token
                    })
                    .collect()
            }),
            assets: raw.assets.map(|values| {
                values
                    .into_iter()
                    .filter_map(parse_with_id::<Asset>)
                    .map(|mut asset| {
                        asset.normalize();
                        asset
                    })
                    .collect()
            }),
            floors: raw.floors.map(parse_floors),
            events: raw.events.map(|values| {
                values
                    .into_iter()
                    .filter_map(|value| serde_json::from_value::<MapEvent>(value).ok())
                    .filter(|event| !matches!(event, MapEvent::Unknown))
                    .collect()
            }),
            fog_levels: raw.fog_levels.map(|values| {
                values
                    .into_iter()
                    .filter_map(|value| value.as_str().map(LevelId::from_string))
                    .collect()
            }),
            fog_mode: raw
                .fog_mode
                .and_then(|value| serde_json::from_value(value).ok()),
        }
    }
}

/// Parse an entity that must carry a non-empty string `id`.
fn parse_with_id<T: serde::de::DeserializeOwned>(value: Value) -> Option<T> {
    let has_id = value
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn parse_floors(value: Value) -> FloorMap {
    let mut floors = FloorMap::new();
    let Value::Object(levels) = value else {
        return floors;
    };
    for (level_id, cells) in levels {
        let Value::Object(cells) = cells else {
            continue;
        };
        let parsed: BTreeMap<Cell, FloorKind> = cells
            .into_iter()
            .filter_map(|(key, kind)| {
                let cell = key.parse::<Cell>().ok()?;
                let kind = FloorKind::new(kind.as_str()?).ok()?;
                Some((cell, kind))
            })
            .collect();
        floors.insert_level(LevelId::from_string(level_id), parsed);
    }
    floors
}
