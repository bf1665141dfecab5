//! Asset commands.

use mapkeep_domain::{Asset, AssetId, Cell, HistoryDetails, LevelId, MapEvent, PositionRef};

use crate::api::connections::ClientRecord;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::{Change, Session};

impl Session {
    pub(super) fn place_asset(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        asset: Asset,
    ) -> Result<(), CommandError> {
        let undo = self.capture_board(client);
        let events = self.state.place_asset(asset)?;
        let placed = events.iter().find_map(|event| match event {
            MapEvent::AssetPlaced { asset, replaced } => Some((asset.clone(), replaced.clone())),
            _ => None,
        });
        let Some((placed, replaced)) = placed else {
            return Ok(());
        };

        let mut description = format!("Placed {} at ({}, {})", placed.kind, placed.x, placed.y);
        if replaced.is_some() {
            description.push_str(", replacing the previous occupant");
        }
        let change = Change::new("placeAsset", description, events)
            .details(HistoryDetails::target(placed.id.as_str()).with_to(PositionRef {
                level_id: placed.level_id.clone(),
                x: placed.x,
                y: placed.y,
            }))
            .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    /// Moving an asset is broadcast only; it bypasses undo and history.
    pub(super) fn move_asset(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        asset_id: AssetId,
        level_id: Option<LevelId>,
        x: i32,
        y: i32,
    ) -> Result<(), CommandError> {
        let events = self.state.move_asset(&asset_id, level_id, x, y)?;
        self.commit(out, client, Change::new("moveAsset", "", events).silent());
        Ok(())
    }

    pub(super) fn remove_asset_at(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        level_id: LevelId,
        cell: Cell,
    ) -> Result<(), CommandError> {
        let undo = self.capture_board(client);
        let removed = self.state.remove_asset_at(&level_id, cell)?;
        let change = Change::new(
            "removeAsset",
            format!("Removed {} at ({}, {})", removed.kind, removed.x, removed.y),
            vec![MapEvent::AssetRemoved {
                asset_id: removed.id.clone(),
            }],
        )
        .details(HistoryDetails::target(removed.id.as_str()).with_from(PositionRef {
            level_id,
            x: cell.x,
            y: cell.y,
        }))
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    /// Any viewer may open or close a door.
    pub(super) fn toggle_door(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        asset_id: AssetId,
    ) -> Result<(), CommandError> {
        let undo = self.capture_board(client);
        let open = self.state.toggle_door(&asset_id)?;
        let change = Change::new(
            "toggleDoor",
            if open { "Opened door" } else { "Closed door" },
            vec![MapEvent::DoorToggled {
                asset_id: asset_id.clone(),
                open,
            }],
        )
        .details(HistoryDetails::target(asset_id.as_str()))
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn toggle_asset_hidden(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        asset_id: AssetId,
    ) -> Result<(), CommandError> {
        let hidden = self.state.toggle_asset_hidden(&asset_id)?;
        let change = Change::new(
            "toggleAssetHidden",
            "",
            vec![MapEvent::AssetHiddenToggled { asset_id, hidden }],
        )
        .silent();
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn reorder_asset(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        asset_id: AssetId,
        z_index: i32,
    ) -> Result<(), CommandError> {
        self.state.reorder_asset(&asset_id, z_index)?;
        let change = Change::new(
            "reorderAsset",
            "",
            vec![MapEvent::AssetReordered { asset_id, z_index }],
        )
        .silent();
        self.commit(out, client, change);
        Ok(())
    }
}
