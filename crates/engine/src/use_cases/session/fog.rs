//! Fog-of-war commands.

use mapkeep_domain::{cells_in_radius, Cell, FogMode, HistoryDetails, LevelId, MapEvent};

use crate::api::connections::ClientRecord;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::{Change, Session};

/// Explicit cells plus the disc around `center`, if one was given.
fn target_cells(cells: Vec<Cell>, center: Option<Cell>, radius: Option<i32>) -> Vec<Cell> {
    let mut cells = cells;
    if let Some(center) = center {
        cells.extend(cells_in_radius(center, radius.unwrap_or(0)));
    }
    cells
}

impl Session {
    pub(super) fn reveal_fog(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        level_id: LevelId,
        cells: Vec<Cell>,
        center: Option<Cell>,
        radius: Option<i32>,
    ) -> Result<(), CommandError> {
        let undo = self.capture_fog(client, &level_id);
        let revealed = self
            .state
            .reveal_fog(&level_id, target_cells(cells, center, radius))?;
        if revealed.is_empty() {
            return Ok(());
        }
        let change = Change::new(
            "revealFog",
            format!("Revealed {} cell(s) on {level_id}", revealed.len()),
            vec![MapEvent::FogRevealed {
                level_id: level_id.clone(),
                cells: revealed,
            }],
        )
        .details(HistoryDetails::target(level_id.as_str()))
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn obscure_fog(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        level_id: LevelId,
        cells: Vec<Cell>,
        center: Option<Cell>,
        radius: Option<i32>,
    ) -> Result<(), CommandError> {
        let undo = self.capture_fog(client, &level_id);
        let obscured = self
            .state
            .obscure_fog(&level_id, target_cells(cells, center, radius));
        if obscured.is_empty() {
            return Ok(());
        }
        let change = Change::new(
            "obscureFog",
            format!("Obscured {} cell(s) on {level_id}", obscured.len()),
            vec![MapEvent::FogObscured {
                level_id: level_id.clone(),
                cells: obscured,
            }],
        )
        .details(HistoryDetails::target(level_id.as_str()))
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    /// Switch between automatic and manual fog. Existing cells are kept.
    pub(super) fn set_fog_mode(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        mode: FogMode,
    ) -> Result<(), CommandError> {
        let undo = self.capture_fog_mode(client);
        if !self.state.set_fog_mode(mode) {
            return Ok(());
        }
        let change = Change::new(
            "setFogMode",
            format!("Fog mode set to {mode}"),
            vec![MapEvent::FogModeChanged { mode }],
        )
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }
}
