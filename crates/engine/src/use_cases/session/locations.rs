//! Location files: load, save and folder management.

use mapkeep_domain::{FieldChange, GameSnapshot, HistoryDetails};
use mapkeep_shared::ServerMessage;

use crate::api::connections::ClientRecord;
use crate::stores::ApplyMode;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::Session;

/// File stem derived from a location name.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim().to_string();
    if stem.is_empty() {
        "location".to_string()
    } else {
        stem
    }
}

fn moved_details(old: String, new: String) -> HistoryDetails {
    HistoryDetails::target(new.clone()).with_changes(vec![FieldChange::new("path", old, new)])
}

impl Session {
    pub(super) async fn list_locations(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
    ) -> Result<(), CommandError> {
        let message = self.tree_message().await?;
        out.to(client.connection_id, message);
        Ok(())
    }

    async fn tree_message(&self) -> Result<ServerMessage, CommandError> {
        let tree = self.locations.build_tree().await?;
        Ok(ServerMessage::LocationsTree {
            tree,
            last_used: self.locations.last_used().await,
        })
    }

    /// Push the refreshed tree to DMs after a folder operation.
    async fn refresh_tree(&self, out: &mut Outbox) {
        match self.tree_message().await {
            Ok(message) => out.dms(message),
            Err(e) => tracing::warn!(error = %e, "Failed to rebuild locations tree"),
        }
    }

    pub(super) async fn load_location(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        path: &str,
    ) -> Result<(), CommandError> {
        // A pending autosave still flushes to the previous file.
        let (relative, snapshot) = self.locations.load(path).await?;
        self.install_location(relative.clone(), snapshot).await;
        tracing::info!(path = %relative, "Location loaded");

        out.all(ServerMessage::Reset {
            snapshot: self.state.extract_full(),
            reason: "locationLoaded".to_string(),
        });
        self.broadcast_undo_state(out);
        let name = self.state.location().name.clone();
        self.record(
            out,
            client,
            "loadLocation",
            format!("Loaded {name}"),
            HistoryDetails::target(relative),
        );
        Ok(())
    }

    /// Replace the board with a client-supplied snapshot. The board is no
    /// longer tied to a file afterwards.
    pub(super) fn load_snapshot(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        snapshot: GameSnapshot,
    ) {
        let report = self.state.apply_snapshot(snapshot.into_full(), ApplyMode::Full);
        if report.fog_dropped > 0 {
            tracing::warn!(dropped = report.fog_dropped, "Snapshot fog exceeded capacity");
        }
        self.undo.clear();
        self.current_path = None;

        out.all(ServerMessage::Reset {
            snapshot: self.state.extract_full(),
            reason: "snapshotLoaded".to_string(),
        });
        self.broadcast_undo_state(out);
        let name = self.state.location().name.clone();
        self.record(
            out,
            client,
            "loadSnapshot",
            format!("Loaded snapshot of {name}"),
            HistoryDetails::default(),
        );
    }

    pub(super) async fn save_location(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        path: &str,
    ) -> Result<(), CommandError> {
        let saved = self
            .locations
            .save(path, &self.state.extract_full())
            .await?;
        if let Some(autosaver) = &self.autosaver {
            autosaver.cancel(saved.clone());
        }
        self.current_path = Some(saved.clone());
        tracing::info!(path = %saved, "Location saved");

        out.to(client.connection_id, ServerMessage::SavedOk { path: saved.clone() });
        self.refresh_tree(out).await;
        self.record(
            out,
            client,
            "saveLocation",
            format!("Saved to {saved}"),
            HistoryDetails::target(saved),
        );
        Ok(())
    }

    /// Save to the current file, or to a file named after the location.
    pub(super) async fn request_save(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
    ) -> Result<(), CommandError> {
        let path = self
            .current_path
            .clone()
            .unwrap_or_else(|| format!("{}.json", file_stem(&self.state.location().name)));
        self.save_location(out, client, &path).await
    }

    pub(super) async fn create_folder(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        path: &str,
    ) -> Result<(), CommandError> {
        let created = self.locations.create_folder(path).await?;
        self.refresh_tree(out).await;
        self.record(
            out,
            client,
            "createFolder",
            format!("Created folder {created}"),
            HistoryDetails::target(created),
        );
        Ok(())
    }

    pub(super) async fn delete_location(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        path: &str,
    ) -> Result<(), CommandError> {
        let deleted = self.locations.delete_location(path).await?;
        if let Some(autosaver) = &self.autosaver {
            autosaver.discard(deleted.clone());
        }
        if self.current_path.as_deref() == Some(deleted.as_str()) {
            // The board stays; it just has nowhere to autosave to.
            self.current_path = None;
        }
        self.refresh_tree(out).await;
        self.record(
            out,
            client,
            "deleteLocation",
            format!("Deleted {deleted}"),
            HistoryDetails::target(deleted),
        );
        Ok(())
    }

    pub(super) async fn move_location(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        from: &str,
        to_folder: &str,
    ) -> Result<(), CommandError> {
        let old = self.locations.location_path(from)?;
        let new = self.locations.move_location(from, to_folder).await?;
        if self.current_path.as_deref() == Some(old.as_str()) {
            self.repoint(new.clone());
        }
        self.refresh_tree(out).await;
        self.record(
            out,
            client,
            "moveLocation",
            format!("Moved {old} to {new}"),
            moved_details(old, new),
        );
        Ok(())
    }

    pub(super) async fn rename_folder(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        path: &str,
        new_name: &str,
    ) -> Result<(), CommandError> {
        let old = self.locations.sandbox().relative(&self.locations.sandbox().resolve(path)?);
        let new = self.locations.rename_folder(path, new_name).await?;
        let moved = self
            .current_path
            .as_deref()
            .and_then(|current| current.strip_prefix(&format!("{old}/")))
            .map(|rest| format!("{new}/{rest}"));
        if let Some(moved) = moved {
            self.repoint(moved);
        }
        self.refresh_tree(out).await;
        self.record(
            out,
            client,
            "renameFolder",
            format!("Renamed folder {old} to {new}"),
            moved_details(old, new),
        );
        Ok(())
    }

    pub(super) async fn rename_location(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        path: &str,
        new_name: &str,
    ) -> Result<(), CommandError> {
        let old = self.locations.location_path(path)?;
        let (new, name) = self.locations.rename_location(path, new_name).await?;
        if self.current_path.as_deref() == Some(old.as_str()) {
            self.state.set_location_name(name.clone());
            self.repoint(new.clone());
        }
        out.all(ServerMessage::LocationRenamed {
            old_path: old.clone(),
            new_path: new.clone(),
            name: name.clone(),
        });
        self.refresh_tree(out).await;
        self.record(
            out,
            client,
            "renameLocation",
            format!("Renamed {old} to {name}"),
            moved_details(old, new),
        );
        Ok(())
    }

    /// Follow the current file to its new path without recreating the old one.
    fn repoint(&mut self, path: String) {
        if let Some(autosaver) = &self.autosaver {
            autosaver.retarget(path.clone(), self.state.extract_full());
        }
        self.current_path = Some(path);
    }
}
