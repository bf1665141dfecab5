//! Undo and redo of DM edits.
//!
//! Both directions restore a stored snapshot, then broadcast a full reset so
//! every viewer converges on the same board regardless of which events it
//! saw.

use mapkeep_domain::GameSnapshot;
use mapkeep_shared::ServerMessage;

use crate::stores::ApplyMode;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::Session;

impl Session {
    pub(super) fn undo(&mut self, out: &mut Outbox) -> Result<(), CommandError> {
        let action = self.undo.pop_undo().ok_or(CommandError::NothingToUndo)?;
        self.restore(out, &action.before, "undo");

        let ids = self.history.remove_action(&action.id);
        if !ids.is_empty() {
            out.dms(ServerMessage::HistoryRemoved { ids });
        }
        out.all(ServerMessage::UndoPerformed {
            action_type: action.action_type.clone(),
            description: action.description.clone(),
        });
        tracing::debug!(action_type = %action.action_type, "Undo");

        self.undo.push_redo(action);
        self.broadcast_undo_state(out);
        self.schedule_autosave();
        Ok(())
    }

    pub(super) fn redo(&mut self, out: &mut Outbox) -> Result<(), CommandError> {
        let mut action = self.undo.pop_redo().ok_or(CommandError::NothingToRedo)?;
        self.restore(out, &action.after, "redo");

        let replayed = self.history.replay(&action.history, self.clock.now());
        if !replayed.is_empty() {
            out.dms(ServerMessage::HistoryAdded {
                events: replayed.clone(),
            });
        }
        out.all(ServerMessage::RedoPerformed {
            action_type: action.action_type.clone(),
            description: action.description.clone(),
        });
        tracing::debug!(action_type = %action.action_type, "Redo");

        action.history = replayed;
        self.undo.push_undo(action);
        self.broadcast_undo_state(out);
        self.schedule_autosave();
        Ok(())
    }

    fn restore(&mut self, out: &mut Outbox, snapshot: &GameSnapshot, reason: &str) {
        let report = self.state.apply_snapshot(snapshot.clone(), ApplyMode::Partial);
        if report.fog_dropped > 0 {
            tracing::warn!(dropped = report.fog_dropped, reason, "Restored fog exceeded capacity");
        }
        out.all(ServerMessage::Reset {
            snapshot: self.state.extract_full(),
            reason: reason.to_string(),
        });
    }
}
