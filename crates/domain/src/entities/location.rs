//! Location and Level - the top-level map document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{LevelId, LocationId};

/// How fog-of-war reacts to token activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FogMode {
    /// Non-NPC tokens reveal a disc around themselves when spawned or moved
    #[default]
    Automatic,
    /// Only explicit DM reveals change the fog
    Manual,
}

impl FogMode {
    pub fn is_automatic(self) -> bool {
        matches!(self, FogMode::Automatic)
    }
}

impl std::fmt::Display for FogMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FogMode::Automatic => f.write_str("automatic"),
            FogMode::Manual => f.write_str("manual"),
        }
    }
}

/// Where new tokens appear on a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: i32,
    pub y: i32,
}

/// A static light source placed on a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub radius: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

fn default_intensity() -> f32 {
    1.0
}

/// One floor/area of a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: LevelId,
    #[serde(default)]
    pub name: String,
    /// Procedural-generation seed; opaque to the server
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub spawn: SpawnPoint,
    #[serde(default)]
    pub lights: Vec<Light>,
}

impl Level {
    pub fn new(id: impl Into<LevelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            seed: String::new(),
            spawn: SpawnPoint::default(),
            lights: Vec::new(),
        }
    }
}

/// The map document: an ordered list of levels plus free-form settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub levels: Vec<Level>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub fog_mode: FogMode,
}

impl Location {
    /// Id of the built-in location used when nothing valid was loaded.
    pub const FALLBACK_ID: &'static str = "default";
    /// Id of the built-in location's only level.
    pub const FALLBACK_LEVEL_ID: &'static str = "level-1";

    /// Built-in single-level location.
    pub fn fallback() -> Self {
        let mut level = Level::new(Self::FALLBACK_LEVEL_ID, "Level 1");
        level.seed = Self::FALLBACK_ID.to_string();
        level.spawn = SpawnPoint { x: 5, y: 5 };
        Self {
            id: LocationId::from_string(Self::FALLBACK_ID),
            name: "Untitled Location".to_string(),
            levels: vec![level],
            settings: Map::new(),
            fog_mode: FogMode::Automatic,
        }
    }

    /// Check the minimal shape every location document must have:
    /// string `id`, string `name`, and a non-empty `levels` array.
    pub fn has_valid_shape(value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        let id_ok = obj.get("id").and_then(Value::as_str).is_some();
        let name_ok = obj.get("name").and_then(Value::as_str).is_some();
        let levels_ok = obj
            .get("levels")
            .and_then(Value::as_array)
            .is_some_and(|levels| !levels.is_empty());
        id_ok && name_ok && levels_ok
    }

    /// Parse a location leniently, returning `None` when the document is
    /// missing required fields or any level is malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !Self::has_valid_shape(value) {
            return None;
        }
        serde_json::from_value::<Location>(value.clone())
            .ok()
            .filter(|loc| !loc.levels.is_empty())
    }

    pub fn level(&self, level_id: &LevelId) -> Option<&Level> {
        self.levels.iter().find(|l| &l.id == level_id)
    }

    pub fn has_level(&self, level_id: &LevelId) -> bool {
        self.level(level_id).is_some()
    }

    pub fn level_ids(&self) -> impl Iterator<Item = &LevelId> {
        self.levels.iter().map(|l| &l.id)
    }
}
