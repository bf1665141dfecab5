//! Message dispatch: role gate, routing, and error replies.

use uuid::Uuid;

use mapkeep_domain::{Cell, TokenId};
use mapkeep_shared::{ClientMessage, ServerMessage};

use crate::api::connections::ClientRecord;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::Session;

/// Who may send a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Any,
    Dm,
    /// DM, or the owner of the token named in the message
    DmOrOwner,
}

pub fn required_permission(message: &ClientMessage) -> Permission {
    use ClientMessage as M;
    match message {
        M::Join { .. }
        | M::Ping
        | M::Login { .. }
        | M::CreateFirstUser { .. }
        | M::ResumeSession { .. }
        | M::Logout
        | M::SwitchRole { .. }
        | M::ToggleDoor { .. }
        | M::ListLocations
        | M::Unknown => Permission::Any,

        M::MoveToken { .. } | M::UpdateToken { .. } => Permission::DmOrOwner,

        M::SpawnToken { .. }
        | M::RemoveTokenAt { .. }
        | M::ToggleTokenHidden { .. }
        | M::ReorderToken { .. }
        | M::RevealFog { .. }
        | M::ObscureFog { .. }
        | M::SetFogMode { .. }
        | M::PlaceAsset { .. }
        | M::MoveAsset { .. }
        | M::RemoveAssetAt { .. }
        | M::ToggleAssetHidden { .. }
        | M::ReorderAsset { .. }
        | M::PaintFloor { .. }
        | M::RequestSave
        | M::LoadSnapshot { .. }
        | M::LoadLocation { .. }
        | M::SaveLocation { .. }
        | M::CreateFolder { .. }
        | M::DeleteLocation { .. }
        | M::MoveLocation { .. }
        | M::RenameFolder { .. }
        | M::RenameLocation { .. }
        | M::Undo
        | M::Redo => Permission::Dm,
    }
}

impl Session {
    /// Validate and apply one inbound message to completion. Returns the
    /// messages to deliver.
    pub async fn handle_message(&mut self, connection_id: Uuid, message: ClientMessage) -> Outbox {
        let mut out = Outbox::new();
        let Some(client) = self.connections.get(connection_id).await else {
            tracing::debug!(connection_id = %connection_id, "Message from unknown connection");
            return out;
        };
        let kind = message.kind();

        if required_permission(&message) == Permission::Dm && !client.is_dm() {
            tracing::debug!(
                connection_id = %connection_id,
                message_type = kind,
                "Dropping DM-only message from player"
            );
            return out;
        }

        let result = self.route(&mut out, &client, message).await;
        match result {
            Ok(()) => {}
            Err(CommandError::Unauthorized) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    message_type = kind,
                    "Dropping unauthorized message"
                );
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    message_type = kind,
                    error = %e,
                    "Command rejected"
                );
                out.to(connection_id, ServerMessage::error(e.code(), e.public_message()));
            }
        }
        out
    }

    async fn route(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        message: ClientMessage,
    ) -> Result<(), CommandError> {
        use ClientMessage as M;
        match message {
            M::Join {
                client_id,
                name,
                session_token,
            } => self.join(out, client, client_id, name, session_token).await,
            M::Ping => {
                out.to(client.connection_id, ServerMessage::Pong);
                Ok(())
            }
            M::Login { username, password } => self.login(out, client, username, password).await,
            M::CreateFirstUser {
                username,
                password,
                display_name,
            } => {
                self.create_first_user(out, client, username, password, display_name)
                    .await
            }
            M::ResumeSession { token } => self.resume_session(out, client, token).await,
            M::Logout => self.logout(out, client).await,
            M::SwitchRole { role } => self.switch_role(out, client, role).await,

            M::SpawnToken { token } => self.spawn_token(out, client, token),
            M::MoveToken {
                token_id,
                x,
                y,
                level_id,
            } => self.move_token(out, client, token_id, level_id, x, y),
            M::UpdateToken { token_id, patch } => self.update_token(out, client, token_id, patch),
            M::RemoveTokenAt {
                level_id,
                x,
                y,
                token_id,
            } => self.remove_token_at(out, client, level_id, Cell::new(x, y), token_id),
            M::ToggleTokenHidden { token_id } => self.toggle_token_hidden(out, client, token_id),
            M::ReorderToken { token_id, z_index } => {
                self.reorder_token(out, client, token_id, z_index)
            }

            M::RevealFog {
                level_id,
                cells,
                center,
                radius,
            } => self.reveal_fog(out, client, level_id, cells, center, radius),
            M::ObscureFog {
                level_id,
                cells,
                center,
                radius,
            } => self.obscure_fog(out, client, level_id, cells, center, radius),
            M::SetFogMode { mode } => self.set_fog_mode(out, client, mode),

            M::PlaceAsset { asset } => self.place_asset(out, client, asset),
            M::MoveAsset {
                asset_id,
                x,
                y,
                level_id,
            } => self.move_asset(out, client, asset_id, level_id, x, y),
            M::RemoveAssetAt { level_id, x, y } => {
                self.remove_asset_at(out, client, level_id, Cell::new(x, y))
            }
            M::ToggleDoor { asset_id } => self.toggle_door(out, client, asset_id),
            M::ToggleAssetHidden { asset_id } => self.toggle_asset_hidden(out, client, asset_id),
            M::ReorderAsset { asset_id, z_index } => {
                self.reorder_asset(out, client, asset_id, z_index)
            }
            M::PaintFloor {
                level_id,
                cells,
                kind,
            } => self.paint_floor(out, client, level_id, cells, kind),

            M::RequestSave => self.request_save(out, client).await,
            M::SaveLocation { path } => self.save_location(out, client, &path).await,
            M::LoadLocation { path } => self.load_location(out, client, &path).await,
            M::LoadSnapshot { snapshot } => {
                self.load_snapshot(out, client, snapshot);
                Ok(())
            }
            M::ListLocations => self.list_locations(out, client).await,
            M::CreateFolder { path } => self.create_folder(out, client, &path).await,
            M::DeleteLocation { path } => self.delete_location(out, client, &path).await,
            M::MoveLocation { from, to_folder } => {
                self.move_location(out, client, &from, &to_folder).await
            }
            M::RenameFolder { path, new_name } => {
                self.rename_folder(out, client, &path, &new_name).await
            }
            M::RenameLocation { path, new_name } => {
                self.rename_location(out, client, &path, &new_name).await
            }

            M::Undo => self.undo(out),
            M::Redo => self.redo(out),

            M::Unknown => {
                tracing::debug!(connection_id = %client.connection_id, "Ignoring unknown message type");
                Ok(())
            }
        }
    }

    /// DM, or the owner of an existing token.
    pub(super) fn ensure_token_access(
        &self,
        client: &ClientRecord,
        token_id: &TokenId,
    ) -> Result<(), CommandError> {
        if client.is_dm() {
            return Ok(());
        }
        let token = self.state.token(token_id).ok_or(CommandError::Unauthorized)?;
        if client.owner_ids().any(|id| token.is_owned_by(id)) {
            Ok(())
        } else {
            Err(CommandError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> ClientMessage {
        serde_json::from_value(value).expect("valid message")
    }

    #[test]
    fn fog_and_floor_edits_are_dm_only() {
        for msg in [
            json!({"type": "revealFog", "levelId": "l1", "cells": ["1,1"]}),
            json!({"type": "paintFloor", "levelId": "l1", "cells": ["1,1"], "kind": "wood"}),
            json!({"type": "loadLocation", "path": "a.json"}),
            json!({"type": "undo"}),
        ] {
            assert_eq!(required_permission(&parse(msg)), Permission::Dm);
        }
    }

    #[test]
    fn doors_and_browsing_are_open_to_everyone() {
        assert_eq!(
            required_permission(&parse(json!({"type": "toggleDoor", "assetId": "a1"}))),
            Permission::Any
        );
        assert_eq!(
            required_permission(&parse(json!({"type": "listLocations"}))),
            Permission::Any
        );
        assert_eq!(
            required_permission(&parse(json!({"type": "moveToken", "tokenId": "t", "x": 1, "y": 1}))),
            Permission::DmOrOwner
        );
    }
}
