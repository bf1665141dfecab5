//! Fog-of-war: per-level revealed cell sets.
//!
//! Reveal is a filled disc around a center; there is no occlusion by walls.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::DomainError;
use crate::value_objects::Cell;
use crate::LevelId;

use super::token::MAX_VISION_RADIUS;

/// All integer cells within `radius` of `center` (a filled disc).
///
/// The radius is clamped to `[0, 20]`. Cells that would fall off the `i32`
/// grid are skipped.
pub fn cells_in_radius(center: Cell, radius: i32) -> Vec<Cell> {
    let r = radius.clamp(0, MAX_VISION_RADIUS);
    let r_sq = i64::from(r) * i64::from(r);
    let mut cells = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy) > r_sq {
                continue;
            }
            if let (Some(x), Some(y)) = (center.x.checked_add(dx), center.y.checked_add(dy)) {
                cells.push(Cell::new(x, y));
            }
        }
    }
    cells
}

/// Revealed cells for every level. Empty levels are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FogState {
    levels: BTreeMap<LevelId, BTreeSet<Cell>>,
}

impl FogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reveal a batch of cells on one level.
    ///
    /// Returns exactly the cells that were newly added. If adding them would
    /// push the level past `max_cells`, nothing is applied.
    pub fn reveal(
        &mut self,
        level_id: &LevelId,
        cells: impl IntoIterator<Item = Cell>,
        max_cells: usize,
    ) -> Result<Vec<Cell>, DomainError> {
        let existing = self.levels.get(level_id);
        let current = existing.map_or(0, BTreeSet::len);
        let fresh: BTreeSet<Cell> = cells
            .into_iter()
            .filter(|c| existing.map_or(true, |set| !set.contains(c)))
            .collect();

        if fresh.is_empty() {
            return Ok(Vec::new());
        }
        if current + fresh.len() > max_cells {
            return Err(DomainError::fog_capacity(current, fresh.len(), max_cells));
        }

        let set = self.levels.entry(level_id.clone()).or_default();
        set.extend(fresh.iter().copied());
        Ok(fresh.into_iter().collect())
    }

    /// Obscure cells on one level. Returns only the cells actually removed.
    pub fn obscure(
        &mut self,
        level_id: &LevelId,
        cells: impl IntoIterator<Item = Cell>,
    ) -> Vec<Cell> {
        let Some(set) = self.levels.get_mut(level_id) else {
            return Vec::new();
        };
        let mut removed: Vec<Cell> = cells.into_iter().filter(|c| set.remove(c)).collect();
        if set.is_empty() {
            self.levels.remove(level_id);
        }
        removed.sort();
        removed.dedup();
        removed
    }

    pub fn is_revealed(&self, level_id: &LevelId, cell: Cell) -> bool {
        self.levels
            .get(level_id)
            .is_some_and(|set| set.contains(&cell))
    }

    pub fn level(&self, level_id: &LevelId) -> Option<&BTreeSet<Cell>> {
        self.levels.get(level_id)
    }

    pub fn levels(&self) -> impl Iterator<Item = (&LevelId, &BTreeSet<Cell>)> {
        self.levels.iter()
    }

    pub fn level_count(&self, level_id: &LevelId) -> usize {
        self.levels.get(level_id).map_or(0, BTreeSet::len)
    }

    pub fn total_cells(&self) -> usize {
        self.levels.values().map(BTreeSet::len).sum()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    pub fn clear_level(&mut self, level_id: &LevelId) {
        self.levels.remove(level_id);
    }

    /// Insert cells without admission checks, truncating to `max_cells`.
    /// Used when rebuilding from a snapshot. Returns the number dropped.
    pub fn restore_level(
        &mut self,
        level_id: &LevelId,
        cells: impl IntoIterator<Item = Cell>,
        max_cells: usize,
    ) -> usize {
        let set = self.levels.entry(level_id.clone()).or_default();
        set.extend(cells);
        let dropped = prune_set(set, max_cells);
        if set.is_empty() {
            self.levels.remove(level_id);
        }
        dropped
    }

    /// Trim every level down to `max_cells`. Returns the number of cells dropped.
    pub fn prune(&mut self, max_cells: usize) -> usize {
        let dropped = self
            .levels
            .values_mut()
            .map(|set| prune_set(set, max_cells))
            .sum();
        self.levels.retain(|_, set| !set.is_empty());
        dropped
    }
}

fn prune_set(set: &mut BTreeSet<Cell>, max_cells: usize) -> usize {
    if set.len() <= max_cells {
        return 0;
    }
    let dropped = set.len() - max_cells;
    let keep: BTreeSet<Cell> = set.iter().take(max_cells).copied().collect();
    *set = keep;
    dropped
}
