//! Canonical in-memory board.
//!
//! `GameState` owns the active location and every board entity. It is only
//! ever touched by the session actor, so it needs no locking. Every load,
//! reset, undo and redo goes through [`GameState::apply_snapshot`].

use std::collections::HashSet;

use mapkeep_domain::{
    cells_in_radius, Asset, AssetId, Cell, DomainError, FieldChange, FloorKind, FloorMap,
    FogMode, FogState, GameSnapshot, LevelId, Location, MapEvent, Token, TokenId, TokenPatch,
};

/// Whether a snapshot describes the whole board or only some fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Missing fields become empty and a missing location falls back
    Full,
    /// Missing fields are left untouched
    Partial,
}

/// What `apply_snapshot` had to fix up on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Levels that received the default floor block
    pub backfilled_levels: Vec<LevelId>,
    /// Fog cells dropped because a level exceeded the cell cap
    pub fog_dropped: usize,
}

/// Rough entity counts, used for the resource estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub levels: usize,
    pub tokens: usize,
    pub assets: usize,
    pub floor_cells: usize,
    pub fog_cells: usize,
}

#[derive(Debug, Clone)]
pub struct GameState {
    location: Location,
    tokens: Vec<Token>,
    assets: Vec<Asset>,
    floors: FloorMap,
    fog: FogState,
    max_fog_cells: usize,
}

impl GameState {
    pub fn new(max_fog_cells: usize) -> Self {
        let mut state = Self {
            location: Location::fallback(),
            tokens: Vec::new(),
            assets: Vec::new(),
            floors: FloorMap::new(),
            fog: FogState::new(),
            max_fog_cells,
        };
        state.backfill_levels();
        state
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn floors(&self) -> &FloorMap {
        &self.floors
    }

    pub fn fog(&self) -> &FogState {
        &self.fog
    }

    pub fn fog_mode(&self) -> FogMode {
        self.location.fog_mode
    }

    pub fn token(&self, token_id: &TokenId) -> Option<&Token> {
        self.tokens.iter().find(|t| &t.id == token_id)
    }

    pub fn asset(&self, asset_id: &AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| &a.id == asset_id)
    }

    pub fn set_location_name(&mut self, name: impl Into<String>) {
        self.location.name = name.into();
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Replace every field present in `snapshot`.
    pub fn apply_snapshot(&mut self, snapshot: GameSnapshot, mode: ApplyMode) -> ApplyReport {
        let snapshot = match mode {
            ApplyMode::Full => snapshot.into_full(),
            ApplyMode::Partial => snapshot,
        };
        let fog_cells = snapshot.fog_cells();
        let mut report = ApplyReport::default();

        let location_replaced = snapshot.location.is_some();
        if let Some(location) = snapshot.location {
            self.location = location;
        }
        if let Some(fog_mode) = snapshot.fog_mode {
            self.location.fog_mode = fog_mode;
        }

        if let Some(tokens) = snapshot.tokens {
            let mut seen = HashSet::new();
            self.tokens = tokens
                .into_iter()
                .filter(|token| {
                    let fresh = seen.insert(token.id.clone());
                    if !fresh {
                        tracing::warn!(token_id = %token.id, "Dropping duplicate token id");
                    }
                    fresh
                })
                .collect();
        }

        if let Some(assets) = snapshot.assets {
            let mut placed: Vec<Asset> = Vec::with_capacity(assets.len());
            for asset in assets {
                placed.retain(|a| a.id != asset.id && !a.occupies(&asset.level_id, asset.cell()));
                placed.push(asset);
            }
            self.assets = placed;
        }

        let floors_replaced = snapshot.floors.is_some();
        if let Some(floors) = snapshot.floors {
            self.floors = floors;
        }
        if floors_replaced || location_replaced {
            report.backfilled_levels = self.backfill_levels();
        }

        if snapshot.events.is_some() {
            match snapshot.fog_levels {
                Some(levels) => {
                    for level_id in levels {
                        self.fog.clear_level(&level_id);
                        if let Some(cells) = fog_cells.get(&level_id) {
                            report.fog_dropped += self.fog.restore_level(
                                &level_id,
                                cells.iter().copied(),
                                self.max_fog_cells,
                            );
                        }
                    }
                }
                None => {
                    self.fog.clear();
                    for (level_id, cells) in fog_cells {
                        report.fog_dropped +=
                            self.fog
                                .restore_level(&level_id, cells, self.max_fog_cells);
                    }
                }
            }
        }

        if mode == ApplyMode::Full && self.location.fog_mode.is_automatic() {
            let tokens = self.tokens.clone();
            for token in &tokens {
                self.auto_reveal(token);
            }
        }

        if report.fog_dropped > 0 {
            tracing::warn!(
                dropped = report.fog_dropped,
                max = self.max_fog_cells,
                "Fog cells beyond the per-level cap were dropped"
            );
        }
        report
    }

    /// Location, board and fog.
    pub fn extract_full(&self) -> GameSnapshot {
        GameSnapshot {
            location: Some(self.location.clone()),
            ..self.extract_board()
        }
    }

    /// Tokens, assets, floors and fog, without the location.
    pub fn extract_board(&self) -> GameSnapshot {
        GameSnapshot {
            location: None,
            tokens: Some(self.tokens.clone()),
            assets: Some(self.assets.clone()),
            floors: Some(self.floors.clone()),
            events: Some(GameSnapshot::fog_events(&self.fog)),
            fog_levels: None,
            fog_mode: None,
        }
    }

    /// One level's fog plus the fog mode.
    pub fn extract_fog(&self, level_id: &LevelId) -> GameSnapshot {
        let events = self
            .fog
            .level(level_id)
            .map(|cells| MapEvent::FogRevealed {
                level_id: level_id.clone(),
                cells: cells.iter().copied().collect(),
            })
            .into_iter()
            .collect();
        GameSnapshot {
            events: Some(events),
            fog_levels: Some(vec![level_id.clone()]),
            fog_mode: Some(self.location.fog_mode),
            ..Default::default()
        }
    }

    /// Only the fog mode; no fog level is rebuilt when applied.
    pub fn extract_fog_mode(&self) -> GameSnapshot {
        GameSnapshot {
            events: Some(Vec::new()),
            fog_levels: Some(Vec::new()),
            fog_mode: Some(self.location.fog_mode),
            ..Default::default()
        }
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    pub fn spawn_token(&mut self, mut token: Token) -> Result<Vec<MapEvent>, DomainError> {
        if token.id.is_empty() {
            token.id = TokenId::new();
        }
        if self.token(&token.id).is_some() {
            return Err(DomainError::constraint(format!(
                "Token {} already exists",
                token.id
            )));
        }
        token.normalize();

        let mut events = self.touch_level(&token.level_id)?;
        self.require_floor(&token.level_id, token.cell())?;

        events.push(MapEvent::TokenSpawned {
            token: token.clone(),
        });
        events.extend(self.auto_reveal(&token));
        self.tokens.push(token);
        Ok(events)
    }

    pub fn move_token(
        &mut self,
        token_id: &TokenId,
        level_id: Option<LevelId>,
        x: i32,
        y: i32,
    ) -> Result<Vec<MapEvent>, DomainError> {
        let current = self
            .token(token_id)
            .ok_or_else(|| DomainError::not_found("Token", token_id.as_str()))?;
        let level_id = level_id.unwrap_or_else(|| current.level_id.clone());

        let mut events = self.touch_level(&level_id)?;
        let cell = Cell::new(x, y);
        self.require_floor(&level_id, cell)?;

        let token = self
            .tokens
            .iter_mut()
            .find(|t| &t.id == token_id)
            .ok_or_else(|| DomainError::not_found("Token", token_id.as_str()))?;
        token.level_id = level_id.clone();
        token.x = x;
        token.y = y;
        let moved = token.clone();

        events.push(MapEvent::TokenMoved {
            token_id: token_id.clone(),
            level_id,
            x,
            y,
        });
        events.extend(self.auto_reveal(&moved));
        Ok(events)
    }

    /// Apply a patch. Returns the updated token and the fields that changed;
    /// no event is produced when nothing changed.
    pub fn update_token(
        &mut self,
        token_id: &TokenId,
        patch: &TokenPatch,
    ) -> Result<(Vec<FieldChange>, Vec<MapEvent>), DomainError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|t| &t.id == token_id)
            .ok_or_else(|| DomainError::not_found("Token", token_id.as_str()))?;
        let changes = token.apply_patch(patch);
        if changes.is_empty() {
            return Ok((changes, Vec::new()));
        }
        let updated = token.clone();
        Ok((changes, vec![MapEvent::TokenUpdated { token: updated }]))
    }

    /// Remove a token from a cell: the given id if it is there, otherwise
    /// the topmost token on the cell.
    pub fn remove_token_at(
        &mut self,
        level_id: &LevelId,
        cell: Cell,
        token_id: Option<&TokenId>,
    ) -> Result<Token, DomainError> {
        let on_cell = |t: &Token| &t.level_id == level_id && t.cell() == cell;
        let index = match token_id {
            Some(id) => self.tokens.iter().position(|t| &t.id == id && on_cell(t)),
            None => self
                .tokens
                .iter()
                .enumerate()
                .filter(|(_, t)| on_cell(t))
                .max_by_key(|(idx, t)| (t.z_index, *idx))
                .map(|(idx, _)| idx),
        };
        let index = index.ok_or_else(|| DomainError::not_found("Token", cell.key()))?;
        Ok(self.tokens.remove(index))
    }

    pub fn toggle_token_hidden(&mut self, token_id: &TokenId) -> Result<bool, DomainError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|t| &t.id == token_id)
            .ok_or_else(|| DomainError::not_found("Token", token_id.as_str()))?;
        token.hidden = !token.hidden;
        Ok(token.hidden)
    }

    pub fn reorder_token(&mut self, token_id: &TokenId, z_index: i32) -> Result<(), DomainError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|t| &t.id == token_id)
            .ok_or_else(|| DomainError::not_found("Token", token_id.as_str()))?;
        token.z_index = z_index;
        Ok(())
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Place an asset, evicting whatever occupied the target cell.
    pub fn place_asset(&mut self, mut asset: Asset) -> Result<Vec<MapEvent>, DomainError> {
        if asset.id.is_empty() {
            asset.id = AssetId::new();
        }
        asset.normalize();
        if asset.kind.is_empty() {
            return Err(DomainError::validation("Asset kind cannot be empty"));
        }
        let mut events = self.touch_level(&asset.level_id)?;

        self.assets.retain(|a| a.id != asset.id);
        let replaced = self.evict(&asset.level_id, asset.cell(), &asset.id);
        events.push(MapEvent::AssetPlaced {
            asset: asset.clone(),
            replaced,
        });
        self.assets.push(asset);
        Ok(events)
    }

    pub fn move_asset(
        &mut self,
        asset_id: &AssetId,
        level_id: Option<LevelId>,
        x: i32,
        y: i32,
    ) -> Result<Vec<MapEvent>, DomainError> {
        let current = self
            .asset(asset_id)
            .ok_or_else(|| DomainError::not_found("Asset", asset_id.as_str()))?;
        let level_id = level_id.unwrap_or_else(|| current.level_id.clone());
        let mut events = self.touch_level(&level_id)?;

        let cell = Cell::new(x, y);
        let replaced = self.evict(&level_id, cell, asset_id);
        let asset = self
            .assets
            .iter_mut()
            .find(|a| &a.id == asset_id)
            .ok_or_else(|| DomainError::not_found("Asset", asset_id.as_str()))?;
        asset.level_id = level_id.clone();
        asset.x = x;
        asset.y = y;

        events.push(MapEvent::AssetMoved {
            asset_id: asset_id.clone(),
            level_id,
            x,
            y,
            replaced,
        });
        Ok(events)
    }

    pub fn remove_asset_at(&mut self, level_id: &LevelId, cell: Cell) -> Result<Asset, DomainError> {
        let index = self
            .assets
            .iter()
            .position(|a| a.occupies(level_id, cell))
            .ok_or_else(|| DomainError::not_found("Asset", cell.key()))?;
        Ok(self.assets.remove(index))
    }

    /// Flip a door. Returns the new open state.
    pub fn toggle_door(&mut self, asset_id: &AssetId) -> Result<bool, DomainError> {
        let asset = self
            .assets
            .iter_mut()
            .find(|a| &a.id == asset_id)
            .ok_or_else(|| DomainError::not_found("Asset", asset_id.as_str()))?;
        if !asset.is_door() {
            return Err(DomainError::constraint(format!(
                "Asset {asset_id} is not a door"
            )));
        }
        asset.open = !asset.open;
        Ok(asset.open)
    }

    pub fn toggle_asset_hidden(&mut self, asset_id: &AssetId) -> Result<bool, DomainError> {
        let asset = self
            .assets
            .iter_mut()
            .find(|a| &a.id == asset_id)
            .ok_or_else(|| DomainError::not_found("Asset", asset_id.as_str()))?;
        asset.hidden = !asset.hidden;
        Ok(asset.hidden)
    }

    pub fn reorder_asset(&mut self, asset_id: &AssetId, z_index: i32) -> Result<(), DomainError> {
        let asset = self
            .assets
            .iter_mut()
            .find(|a| &a.id == asset_id)
            .ok_or_else(|| DomainError::not_found("Asset", asset_id.as_str()))?;
        asset.z_index = z_index;
        Ok(())
    }

    /// Remove whatever other asset sits on `cell`.
    fn evict(&mut self, level_id: &LevelId, cell: Cell, keep: &AssetId) -> Option<AssetId> {
        let index = self
            .assets
            .iter()
            .position(|a| &a.id != keep && a.occupies(level_id, cell))?;
        Some(self.assets.remove(index).id)
    }

    // =========================================================================
    // Floors & fog
    // =========================================================================

    /// Paint (or erase with `None`) floor cells. The resulting event lists
    /// only the cells whose kind actually changed.
    pub fn paint_floor(
        &mut self,
        level_id: &LevelId,
        cells: &[Cell],
        kind: Option<FloorKind>,
    ) -> Result<Vec<MapEvent>, DomainError> {
        let mut events = self.touch_level(level_id)?;
        let mut changed = Vec::new();
        for &cell in cells {
            let previous = self.floors.set(level_id, cell, kind.clone());
            if previous != kind && !changed.contains(&cell) {
                changed.push(cell);
            }
        }
        if !changed.is_empty() {
            events.push(MapEvent::FloorPainted {
                level_id: level_id.clone(),
                cells: changed,
                kind,
            });
        }
        Ok(events)
    }

    /// Reveal cells. Returns exactly the newly revealed ones.
    pub fn reveal_fog(
        &mut self,
        level_id: &LevelId,
        cells: Vec<Cell>,
    ) -> Result<Vec<Cell>, DomainError> {
        self.require_level(level_id)?;
        self.fog.reveal(level_id, cells, self.max_fog_cells)
    }

    pub fn obscure_fog(&mut self, level_id: &LevelId, cells: Vec<Cell>) -> Vec<Cell> {
        self.fog.obscure(level_id, cells)
    }

    /// Returns false when the mode was already set.
    pub fn set_fog_mode(&mut self, mode: FogMode) -> bool {
        if self.location.fog_mode == mode {
            return false;
        }
        self.location.fog_mode = mode;
        true
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub fn counts(&self) -> StateCounts {
        StateCounts {
            levels: self.location.levels.len(),
            tokens: self.tokens.len(),
            assets: self.assets.len(),
            floor_cells: self.floors.cell_count(),
            fog_cells: self.fog.total_cells(),
        }
    }

    /// Trim every fog level to the cap. Returns the number of cells dropped.
    pub fn prune_fog(&mut self) -> usize {
        self.fog.prune(self.max_fog_cells)
    }

    pub fn shrink_to_fit(&mut self) {
        self.tokens.shrink_to_fit();
        self.assets.shrink_to_fit();
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn require_level(&self, level_id: &LevelId) -> Result<(), DomainError> {
        if self.location.has_level(level_id) {
            Ok(())
        } else {
            Err(DomainError::not_found("Level", level_id.as_str()))
        }
    }

    fn require_floor(&self, level_id: &LevelId, cell: Cell) -> Result<(), DomainError> {
        if self.floors.has_floor(level_id, cell) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "No floor at {cell} on level {level_id}"
            )))
        }
    }

    /// Validate a level and back-fill its floors on first touch. A back-fill
    /// is announced as a `floorPainted` event so viewers stay in sync.
    fn touch_level(&mut self, level_id: &LevelId) -> Result<Vec<MapEvent>, DomainError> {
        self.require_level(level_id)?;
        if !self.floors.ensure_level(level_id) {
            return Ok(Vec::new());
        }
        let cells = self
            .floors
            .level(level_id)
            .map(|cells| cells.keys().copied().collect())
            .unwrap_or_default();
        Ok(vec![MapEvent::FloorPainted {
            level_id: level_id.clone(),
            cells,
            kind: Some(FloorKind::stone()),
        }])
    }

    fn backfill_levels(&mut self) -> Vec<LevelId> {
        let level_ids: Vec<LevelId> = self.location.level_ids().cloned().collect();
        level_ids
            .into_iter()
            .filter(|level_id| self.floors.ensure_level(level_id))
            .collect()
    }

    /// Reveal the vision disc of a non-NPC token in automatic mode.
    fn auto_reveal(&mut self, token: &Token) -> Option<MapEvent> {
        if token.kind.is_npc()
            || !self.location.fog_mode.is_automatic()
            || token.vision.radius <= 0
        {
            return None;
        }
        let disc = cells_in_radius(token.cell(), token.vision.radius);
        match self.fog.reveal(&token.level_id, disc, self.max_fog_cells) {
            Ok(cells) if cells.is_empty() => None,
            Ok(cells) => Some(MapEvent::FogRevealed {
                level_id: token.level_id.clone(),
                cells,
            }),
            Err(e) => {
                tracing::warn!(token_id = %token.id, error = %e, "Skipping automatic fog reveal");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapkeep_domain::{Level, TokenKind};

    const MAX_FOG: usize = 50_000;

    fn level() -> LevelId {
        LevelId::from_string(Location::FALLBACK_LEVEL_ID)
    }

    fn player(id: &str, x: i32, y: i32) -> Token {
        Token::new(id, TokenKind::Player, level(), x, y)
    }

    fn wood() -> Option<FloorKind> {
        Some(FloorKind::new("wood").expect("valid kind"))
    }

    #[test]
    fn new_state_backfills_the_fallback_level() {
        let state = GameState::new(MAX_FOG);
        assert_eq!(state.floors().cell_count(), 100);
        assert_eq!(state.location().id.as_str(), Location::FALLBACK_ID);
    }

    #[test]
    fn spawn_with_vision_reveals_disc_after_spawn_event() {
        let mut state = GameState::new(MAX_FOG);
        let events = state
            .spawn_token(player("t1", 5, 5).with_vision_radius(8))
            .expect("spawn");

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MapEvent::TokenSpawned { .. }));
        let MapEvent::FogRevealed { cells, .. } = &events[1] else {
            panic!("expected fogRevealed, got {:?}", events[1]);
        };
        let disc = cells_in_radius(Cell::new(5, 5), 8);
        assert_eq!(cells.len(), disc.len());
        for cell in disc {
            assert!(state.fog().is_revealed(&level(), cell));
        }
    }

    #[test]
    fn npc_and_manual_mode_do_not_reveal() {
        let mut state = GameState::new(MAX_FOG);
        let npc = Token::new("n1", TokenKind::Npc, level(), 1, 1);
        let events = state.spawn_token(npc).expect("spawn");
        assert_eq!(events.len(), 1);

        state.set_fog_mode(FogMode::Manual);
        let events = state.spawn_token(player("p1", 2, 2)).expect("spawn");
        assert_eq!(events.len(), 1);
        assert_eq!(state.fog().total_cells(), 0);
    }

    #[test]
    fn spawn_and_move_require_floor() {
        let mut state = GameState::new(MAX_FOG);
        assert!(matches!(
            state.spawn_token(player("t1", 40, 40)),
            Err(DomainError::Validation(_))
        ));
        state.spawn_token(player("t1", 1, 1)).expect("spawn");
        assert!(state.move_token(&"t1".into(), None, 99, 99).is_err());
        assert_eq!(state.token(&"t1".into()).map(Token::cell), Some(Cell::new(1, 1)));

        state.move_token(&"t1".into(), None, 3, 4).expect("move");
        let token = state.token(&"t1".into()).expect("token");
        assert!(state.floors().has_floor(&token.level_id, token.cell()));
    }

    #[test]
    fn spawning_a_taken_id_is_a_constraint_violation() {
        let mut state = GameState::new(MAX_FOG);
        state.spawn_token(player("t1", 1, 1)).expect("spawn");
        assert!(matches!(
            state.spawn_token(player("t1", 2, 2)),
            Err(DomainError::Constraint(_))
        ));
        assert_eq!(state.tokens().len(), 1);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let mut state = GameState::new(MAX_FOG);
        let token = Token::new("t1", TokenKind::Player, "nowhere", 1, 1);
        assert!(matches!(
            state.spawn_token(token),
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn replacing_the_location_backfills_new_levels() {
        let mut state = GameState::new(MAX_FOG);
        let mut location = Location::fallback();
        location.levels.push(Level::new("cellar", "Cellar"));
        let report = state.apply_snapshot(
            GameSnapshot {
                location: Some(location),
                ..Default::default()
            },
            ApplyMode::Partial,
        );
        assert_eq!(report.backfilled_levels, vec![LevelId::from_string("cellar")]);
        let events = state
            .paint_floor(&"cellar".into(), &[Cell::new(0, 0)], wood())
            .expect("paint");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn erasing_a_whole_level_is_not_refilled() {
        let mut state = GameState::new(MAX_FOG);
        let every: Vec<Cell> = state
            .floors()
            .level(&level())
            .map(|cells| cells.keys().copied().collect())
            .unwrap_or_default();
        state.paint_floor(&level(), &every, None).expect("erase");
        let events = state
            .paint_floor(&level(), &[Cell::new(0, 0)], None)
            .expect("erase");
        assert!(events.is_empty());
        assert_eq!(state.floors().cell_count(), 0);
    }

    #[test]
    fn paint_then_erase_leaves_no_entry() {
        let mut state = GameState::new(MAX_FOG);
        let cell = Cell::new(20, 20);
        let painted = state.paint_floor(&level(), &[cell], wood()).expect("paint");
        assert_eq!(painted.len(), 1);
        let erased = state.paint_floor(&level(), &[cell], None).expect("erase");
        assert_eq!(erased.len(), 1);
        assert_eq!(state.floors().get(&level(), cell), None);

        let noop = state.paint_floor(&level(), &[cell], None).expect("erase");
        assert!(noop.is_empty());
    }

    #[test]
    fn placing_an_asset_evicts_the_occupant() {
        let mut state = GameState::new(MAX_FOG);
        state
            .place_asset(Asset::new("a1", level(), 2, 2, "wall"))
            .expect("place");
        let events = state
            .place_asset(Asset::new("a2", level(), 2, 2, "door"))
            .expect("place");
        assert!(matches!(
            &events[0],
            MapEvent::AssetPlaced { replaced: Some(id), .. } if id.as_str() == "a1"
        ));
        assert_eq!(state.assets().len(), 1);

        state
            .place_asset(Asset::new("a3", level(), 3, 3, "wall"))
            .expect("place");
        state.move_asset(&"a3".into(), None, 2, 2).expect("move");
        assert_eq!(state.assets().len(), 1);
        assert_eq!(state.assets()[0].id.as_str(), "a3");
    }

    #[test]
    fn only_doors_toggle() {
        let mut state = GameState::new(MAX_FOG);
        state
            .place_asset(Asset::new("d1", level(), 1, 1, "door"))
            .expect("place");
        state
            .place_asset(Asset::new("w1", level(), 2, 1, "wall"))
            .expect("place");
        assert_eq!(state.toggle_door(&"d1".into()), Ok(true));
        assert_eq!(state.toggle_door(&"d1".into()), Ok(false));
        assert!(matches!(
            state.toggle_door(&"w1".into()),
            Err(DomainError::Constraint(_))
        ));
    }

    #[test]
    fn remove_token_at_takes_topmost_or_named() {
        let mut state = GameState::new(MAX_FOG);
        state.set_fog_mode(FogMode::Manual);
        let mut high = player("high", 1, 1);
        high.z_index = 5;
        state.spawn_token(high).expect("spawn");
        state.spawn_token(player("low", 1, 1)).expect("spawn");
        state.spawn_token(player("named", 1, 1)).expect("spawn");

        let removed = state
            .remove_token_at(&level(), Cell::new(1, 1), Some(&"named".into()))
            .expect("remove");
        assert_eq!(removed.id.as_str(), "named");
        let removed = state
            .remove_token_at(&level(), Cell::new(1, 1), None)
            .expect("remove");
        assert_eq!(removed.id.as_str(), "high");
        assert!(state.remove_token_at(&level(), Cell::new(8, 8), None).is_err());
    }

    #[test]
    fn reveal_is_idempotent_through_the_store() {
        let mut state = GameState::new(MAX_FOG);
        let cells = vec![Cell::new(1, 1), Cell::new(1, 2)];
        assert_eq!(state.reveal_fog(&level(), cells.clone()).expect("reveal").len(), 2);
        assert!(state.reveal_fog(&level(), cells).expect("reveal").is_empty());
    }

    #[test]
    fn board_snapshot_round_trip_is_exact() {
        let mut state = GameState::new(MAX_FOG);
        let before = state.extract_board();
        state
            .spawn_token(player("t1", 5, 5).with_vision_radius(3))
            .expect("spawn");
        state
            .paint_floor(&level(), &[Cell::new(30, 30)], wood())
            .expect("paint");
        let after = state.extract_board();
        assert_ne!(before, after);

        state.apply_snapshot(before.clone(), ApplyMode::Partial);
        assert_eq!(state.extract_board(), before);
        state.apply_snapshot(after.clone(), ApplyMode::Partial);
        assert_eq!(state.extract_board(), after);
    }

    #[test]
    fn fog_snapshot_only_touches_its_level() {
        let mut state = GameState::new(MAX_FOG);
        let mut location = Location::fallback();
        location.levels.push(Level::new("l2", "Two"));
        state.apply_snapshot(
            GameSnapshot {
                location: Some(location),
                ..Default::default()
            },
            ApplyMode::Full,
        );
        state.reveal_fog(&"l2".into(), vec![Cell::new(0, 0)]).expect("reveal");
        let before = state.extract_fog(&level());
        state.reveal_fog(&level(), vec![Cell::new(4, 4)]).expect("reveal");

        state.apply_snapshot(before, ApplyMode::Partial);
        assert_eq!(state.fog().level_count(&level()), 0);
        assert_eq!(state.fog().level_count(&"l2".into()), 1);
    }

    #[test]
    fn full_load_resets_fog_and_reveals_around_players() {
        let mut state = GameState::new(MAX_FOG);
        state.reveal_fog(&level(), vec![Cell::new(9, 9)]).expect("reveal");
        let snapshot = GameSnapshot {
            tokens: Some(vec![player("t1", 0, 0).with_vision_radius(1)]),
            ..Default::default()
        };
        let report = state.apply_snapshot(snapshot, ApplyMode::Full);
        // A full load without floors starts from the default block.
        assert_eq!(report.backfilled_levels, vec![level()]);
        assert!(!state.fog().is_revealed(&level(), Cell::new(9, 9)));
        assert_eq!(state.fog().level_count(&level()), 5);
    }

    #[test]
    fn full_load_with_a_token_at_the_grid_edge_reveals_only_inside_cells() {
        let mut state = GameState::new(MAX_FOG);
        let snapshot = GameSnapshot {
            tokens: Some(vec![player("edge", i32::MAX, 0).with_vision_radius(2)]),
            ..Default::default()
        };
        state.apply_snapshot(snapshot, ApplyMode::Full);
        assert_eq!(state.tokens().len(), 1);
        assert!(state.fog().is_revealed(&level(), Cell::new(i32::MAX, 0)));
        assert!(state.fog().is_revealed(&level(), Cell::new(i32::MAX - 2, 0)));
        assert!(!state.fog().is_revealed(&level(), Cell::new(i32::MIN, 0)));
    }

    #[test]
    fn full_load_reports_backfill_and_fog_truncation() {
        let mut state = GameState::new(3);
        let snapshot = GameSnapshot {
            floors: Some(FloorMap::new()),
            events: Some(vec![MapEvent::FogRevealed {
                level_id: level(),
                cells: cells_in_radius(Cell::new(0, 0), 2),
            }]),
            ..Default::default()
        };
        let report = state.apply_snapshot(snapshot, ApplyMode::Full);
        assert_eq!(report.backfilled_levels, vec![level()]);
        assert!(report.fog_dropped > 0);
        assert_eq!(state.fog().level_count(&level()), 3);
    }

    #[test]
    fn duplicate_ids_and_stacked_assets_are_collapsed_on_load() {
        let mut state = GameState::new(MAX_FOG);
        state.apply_snapshot(
            GameSnapshot {
                tokens: Some(vec![player("t1", 1, 1), player("t1", 2, 2)]),
                assets: Some(vec![
                    Asset::new("a1", level(), 1, 1, "wall"),
                    Asset::new("a2", level(), 1, 1, "door"),
                ]),
                ..Default::default()
            },
            ApplyMode::Partial,
        );
        assert_eq!(state.tokens().len(), 1);
        assert_eq!(state.assets().len(), 1);
        assert_eq!(state.assets()[0].id.as_str(), "a2");
    }
}
