//! Assets - grid-aligned placed objects (walls, doors, decorations).

use serde::{Deserialize, Serialize};

use crate::value_objects::Cell;
use crate::{AssetId, LevelId};

const SCALE_RANGE: (f32, f32) = (0.1, 10.0);

fn default_scale() -> f32 {
    1.0
}

/// A placed object. At most one asset occupies a given (level, cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default)]
    pub id: AssetId,
    pub level_id: LevelId,
    pub x: i32,
    pub y: i32,
    /// Free-form tag: wall, door, window, decorative, ...
    pub kind: String,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint: Option<String>,
    /// Door state; meaningless for other kinds
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub hidden: bool,
}

impl Asset {
    pub fn new(
        id: impl Into<AssetId>,
        level_id: impl Into<LevelId>,
        x: i32,
        y: i32,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            level_id: level_id.into(),
            x,
            y,
            kind: kind.into(),
            rotation: 0.0,
            scale: default_scale(),
            tint: None,
            open: false,
            z_index: 0,
            hidden: false,
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }

    pub fn occupies(&self, level_id: &LevelId, cell: Cell) -> bool {
        &self.level_id == level_id && self.cell() == cell
    }

    pub fn is_door(&self) -> bool {
        self.kind.eq_ignore_ascii_case("door")
    }

    /// Keep rotation in [0, 360) and scale in a sane range.
    pub fn normalize(&mut self) {
        if !self.rotation.is_finite() {
            self.rotation = 0.0;
        }
        self.rotation = self.rotation.rem_euclid(360.0);
        if !self.scale.is_finite() {
            self.scale = default_scale();
        }
        self.scale = self.scale.clamp(SCALE_RANGE.0, SCALE_RANGE.1);
        self.kind = self.kind.trim().to_ascii_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_rotation_and_clamps_scale() {
        let mut asset = Asset::new("a1", "l1", 0, 0, " Door ");
        asset.rotation = -90.0;
        asset.scale = 50.0;
        asset.normalize();
        assert_eq!(asset.rotation, 270.0);
        assert_eq!(asset.scale, 10.0);
        assert!(asset.is_door());
    }

    #[test]
    fn occupancy_is_per_level() {
        let asset = Asset::new("a1", "l1", 2, 2, "wall");
        assert!(asset.occupies(&"l1".into(), Cell::new(2, 2)));
        assert!(!asset.occupies(&"l2".into(), Cell::new(2, 2)));
    }
}
