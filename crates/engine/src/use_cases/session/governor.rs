//! Periodic resource housekeeping.

use super::outbox::Outbox;
use super::state::Session;

impl Session {
    /// Enforce the undo, history and fog caps, then shed optional state if
    /// the footprint estimate is still over the limit.
    pub fn governor_tick(&mut self, out: &mut Outbox) {
        let undo_trimmed = self.undo.trim();
        let history_trimmed = self.history.trim();
        let fog_pruned = self.state.prune_fog();
        if undo_trimmed + history_trimmed + fog_pruned > 0 {
            tracing::info!(
                undo_trimmed,
                history_trimmed,
                fog_pruned,
                "Governor trimmed session state"
            );
        }
        if undo_trimmed > 0 {
            self.broadcast_undo_state(out);
        }
        self.check_resources(out);
        tracing::debug!(footprint = self.footprint(), "Governor tick");
    }
}
