//! Floor painting.

use mapkeep_domain::{Cell, FloorKind, HistoryDetails, LevelId, MapEvent};

use crate::api::connections::ClientRecord;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::{Change, Session};

impl Session {
    /// Paint cells with `kind`, or erase them when `kind` is null.
    pub(super) fn paint_floor(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        level_id: LevelId,
        cells: Vec<Cell>,
        kind: Option<String>,
    ) -> Result<(), CommandError> {
        let kind = kind.map(FloorKind::new).transpose()?;
        let undo = self.capture_board(client);
        let events = self.state.paint_floor(&level_id, &cells, kind.clone())?;

        let painted = events
            .iter()
            .rev()
            .find_map(|event| match event {
                MapEvent::FloorPainted { cells, .. } => Some(cells.len()),
                _ => None,
            })
            .unwrap_or_default();
        let description = match &kind {
            Some(kind) => format!("Painted {painted} cell(s) {kind} on {level_id}"),
            None => format!("Erased {painted} cell(s) on {level_id}"),
        };
        let change = Change::new("paintFloor", description, events)
            .details(HistoryDetails::target(level_id.as_str()))
            .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }
}
