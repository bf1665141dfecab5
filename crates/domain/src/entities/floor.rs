//! Floor overrides - the paintable terrain of every level.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::{Cell, FloorKind};
use crate::LevelId;

/// Side length of the default block every level starts with
pub const DEFAULT_FLOOR_SIZE: i32 = 10;

/// Per-level floor cells.
///
/// A level with no entry at all has never been touched and is back-filled
/// with the default block on first touch. A level whose cells were all
/// erased keeps its (empty) entry and stays empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorMap {
    levels: BTreeMap<LevelId, BTreeMap<Cell, FloorKind>>,
}

impl FloorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default 10×10 stone block anchored at the origin.
    pub fn default_block() -> BTreeMap<Cell, FloorKind> {
        let mut cells = BTreeMap::new();
        for y in 0..DEFAULT_FLOOR_SIZE {
            for x in 0..DEFAULT_FLOOR_SIZE {
                cells.insert(Cell::new(x, y), FloorKind::stone());
            }
        }
        cells
    }

    /// Back-fill a level on first touch. Returns true when defaults were added.
    pub fn ensure_level(&mut self, level_id: &LevelId) -> bool {
        if self.levels.contains_key(level_id) {
            return false;
        }
        self.levels.insert(level_id.clone(), Self::default_block());
        true
    }

    pub fn get(&self, level_id: &LevelId, cell: Cell) -> Option<&FloorKind> {
        self.levels.get(level_id)?.get(&cell)
    }

    pub fn has_floor(&self, level_id: &LevelId, cell: Cell) -> bool {
        self.get(level_id, cell).is_some()
    }

    /// Paint (or with `None`, erase) a cell. Returns the previous kind.
    pub fn set(
        &mut self,
        level_id: &LevelId,
        cell: Cell,
        kind: Option<FloorKind>,
    ) -> Option<FloorKind> {
        let cells = self.levels.entry(level_id.clone()).or_default();
        match kind {
            Some(kind) => cells.insert(cell, kind),
            None => cells.remove(&cell),
        }
    }

    pub fn level(&self, level_id: &LevelId) -> Option<&BTreeMap<Cell, FloorKind>> {
        self.levels.get(level_id)
    }

    pub fn contains_level(&self, level_id: &LevelId) -> bool {
        self.levels.contains_key(level_id)
    }

    pub fn levels(&self) -> impl Iterator<Item = (&LevelId, &BTreeMap<Cell, FloorKind>)> {
        self.levels.iter()
    }

    pub fn insert_level(&mut self, level_id: LevelId, cells: BTreeMap<Cell, FloorKind>) {
        self.levels.insert(level_id, cells);
    }

    /// Total painted cells across all levels.
    pub fn cell_count(&self) -> usize {
        self.levels.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level() -> LevelId {
        LevelId::from_string("l1")
    }

    #[test]
    fn ensure_level_back_fills_once() {
        let mut floors = FloorMap::new();
        assert!(floors.ensure_level(&level()));
        assert_eq!(floors.cell_count(), 100);
        assert!(floors.has_floor(&level(), Cell::new(9, 9)));
        assert!(!floors.has_floor(&level(), Cell::new(10, 0)));
        assert!(!floors.ensure_level(&level()));
    }

    #[test]
    fn erased_cells_are_not_refilled() {
        let mut floors = FloorMap::new();
        floors.ensure_level(&level());
        floors.set(&level(), Cell::new(1, 1), None);
        floors.ensure_level(&level());
        assert!(!floors.has_floor(&level(), Cell::new(1, 1)));
    }

    #[test]
    fn paint_then_erase_leaves_no_entry() {
        let mut floors = FloorMap::new();
        let wood = FloorKind::new("wood").expect("valid kind");
        floors.set(&level(), Cell::new(20, 20), Some(wood.clone()));
        assert_eq!(floors.get(&level(), Cell::new(20, 20)), Some(&wood));
        let previous = floors.set(&level(), Cell::new(20, 20), None);
        assert_eq!(previous, Some(wood));
        assert_eq!(floors.get(&level(), Cell::new(20, 20)), None);
    }

    #[test]
    fn serializes_as_nested_string_keys() {
        let mut floors = FloorMap::new();
        floors.set(&level(), Cell::new(1, 2), Some(FloorKind::stone()));
        let json = serde_json::to_value(&floors).expect("serialize");
        assert_eq!(json, serde_json::json!({"l1": {"1,2": "stone"}}));
    }
}
