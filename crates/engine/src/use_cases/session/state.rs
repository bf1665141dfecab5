//! The session: everything the actor owns, plus the commit pipeline every
//! mutating command ends in.

use std::sync::Arc;

use mapkeep_domain::{
    ActionId, GameSnapshot, HistoryDetails, HistoryEvent, LevelId, MapEvent,
};
use mapkeep_shared::ServerMessage;

use crate::api::connections::{ClientRecord, ConnectionManager};
use crate::infrastructure::config::Limits;
use crate::infrastructure::governor::{estimate_footprint, Footprint};
use crate::infrastructure::persistence::{Autosaver, LocationStore};
use crate::infrastructure::ports::{AuthPort, ClockPort};
use crate::stores::{ActionSnapshot, ApplyMode, GameState, HistoryLog, UndoStack};

use super::outbox::Outbox;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub limits: Limits,
    /// Whether any viewer may take the DM role
    pub open_roles: bool,
}

/// Single-writer session state. Owned by exactly one actor task.
pub struct Session {
    pub(super) state: GameState,
    pub(super) undo: UndoStack,
    pub(super) history: HistoryLog,
    pub(super) connections: Arc<ConnectionManager>,
    pub(super) locations: Arc<LocationStore>,
    pub(super) autosaver: Option<Autosaver>,
    pub(super) auth: Arc<dyn AuthPort>,
    pub(super) clock: Arc<dyn ClockPort>,
    /// Relative path of the file the board was loaded from or saved to
    pub(super) current_path: Option<String>,
    pub(super) settings: SessionSettings,
}

/// How an edit can be reversed.
pub(super) enum Undoable {
    No,
    Board(GameSnapshot),
    Fog(LevelId, GameSnapshot),
    FogMode(GameSnapshot),
}

/// A completed mutation, ready to broadcast, record and snapshot.
pub(super) struct Change {
    pub action_type: &'static str,
    pub description: String,
    pub details: HistoryDetails,
    pub events: Vec<MapEvent>,
    pub undo: Undoable,
    pub record_history: bool,
}

impl Change {
    pub fn new(action_type: &'static str, description: impl Into<String>, events: Vec<MapEvent>) -> Self {
        Self {
            action_type,
            description: description.into(),
            details: HistoryDetails::default(),
            events,
            undo: Undoable::No,
            record_history: true,
        }
    }

    pub fn details(mut self, details: HistoryDetails) -> Self {
        self.details = details;
        self
    }

    pub fn undo(mut self, undo: Undoable) -> Self {
        self.undo = undo;
        self
    }

    /// Broadcast only: no history entry, no undo entry.
    pub fn silent(mut self) -> Self {
        self.record_history = false;
        self.undo = Undoable::No;
        self
    }
}

impl Session {
    pub fn new(
        settings: SessionSettings,
        connections: Arc<ConnectionManager>,
        locations: Arc<LocationStore>,
        auth: Arc<dyn AuthPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            state: GameState::new(settings.limits.max_fog_cells),
            undo: UndoStack::new(settings.limits.max_undo),
            history: HistoryLog::new(settings.limits.max_history),
            connections,
            locations,
            autosaver: None,
            auth,
            clock,
            current_path: None,
            settings,
        }
    }

    pub fn with_autosaver(mut self, autosaver: Autosaver) -> Self {
        self.autosaver = Some(autosaver);
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    /// Load the last-used location, if any. Failures leave the built-in
    /// location in place.
    pub async fn bootstrap(&mut self) {
        let Some(path) = self.locations.last_used().await else {
            tracing::info!("No last-used location, starting with the default board");
            return;
        };
        match self.locations.load(&path).await {
            Ok((relative, snapshot)) => {
                self.install_location(relative, snapshot).await;
                tracing::info!(path = ?self.current_path, "Restored last-used location");
            }
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to restore last-used location");
            }
        }
    }

    /// Replace the board with a loaded file and make it the current one.
    pub(super) async fn install_location(&mut self, relative: String, snapshot: GameSnapshot) {
        let report = self.state.apply_snapshot(snapshot, ApplyMode::Full);
        if !report.backfilled_levels.is_empty() {
            // Keep the file consistent with what viewers now see.
            if let Err(e) = self
                .locations
                .write_snapshot(&relative, &self.state.extract_full())
                .await
            {
                tracing::warn!(path = %relative, error = %e, "Failed to write back floor defaults");
            }
        }
        if let Err(e) = self.locations.write_last_used(&relative).await {
            tracing::warn!(path = %relative, error = %e, "Failed to record last-used location");
        }
        self.undo.clear();
        self.current_path = Some(relative);
    }

    // =========================================================================
    // Commit pipeline
    // =========================================================================

    /// Board snapshot for an undo entry, taken only for DM edits.
    pub(super) fn capture_board(&self, client: &ClientRecord) -> Undoable {
        if client.is_dm() {
            Undoable::Board(self.state.extract_board())
        } else {
            Undoable::No
        }
    }

    pub(super) fn capture_fog(&self, client: &ClientRecord, level_id: &LevelId) -> Undoable {
        if client.is_dm() {
            Undoable::Fog(level_id.clone(), self.state.extract_fog(level_id))
        } else {
            Undoable::No
        }
    }

    pub(super) fn capture_fog_mode(&self, client: &ClientRecord) -> Undoable {
        if client.is_dm() {
            Undoable::FogMode(self.state.extract_fog_mode())
        } else {
            Undoable::No
        }
    }

    /// Broadcast, record history, push undo, schedule autosave, in that
    /// order. A change without events did nothing and is dropped.
    pub(super) fn commit(&mut self, out: &mut Outbox, client: &ClientRecord, change: Change) {
        let Change {
            action_type,
            description,
            details,
            events,
            undo,
            record_history,
        } = change;
        if events.is_empty() {
            return;
        }
        out.all(ServerMessage::StatePatch { events });

        let before = match undo {
            Undoable::No => None,
            Undoable::Board(before) => Some((before, self.state.extract_board())),
            Undoable::Fog(level_id, before) => Some((before, self.state.extract_fog(&level_id))),
            Undoable::FogMode(before) => Some((before, self.state.extract_fog_mode())),
        };
        let action_id = before.as_ref().map(|_| ActionId::new());
        let now = self.clock.now();

        let mut recorded = Vec::new();
        if record_history {
            let event = HistoryEvent::new(
                now,
                client.actor(),
                action_type,
                description.clone(),
                details,
                action_id.clone(),
            );
            self.history.record(event.clone());
            out.dms(ServerMessage::HistoryEvent {
                event: event.clone(),
            });
            recorded.push(event);
        }

        if let (Some(id), Some((before, after))) = (action_id, before) {
            self.undo.push(ActionSnapshot {
                id,
                timestamp: now,
                action_type: action_type.to_string(),
                description,
                before,
                after,
                history: recorded,
            });
            out.all(ServerMessage::UndoRedoState {
                state: self.undo.state(),
            });
            self.check_resources(out);
        }

        self.schedule_autosave();
    }

    /// Record a non-board action (loads, saves) in the history log.
    pub(super) fn record(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        action_type: &str,
        description: impl Into<String>,
        details: HistoryDetails,
    ) {
        let event = HistoryEvent::new(
            self.clock.now(),
            client.actor(),
            action_type,
            description,
            details,
            None,
        );
        self.history.record(event.clone());
        out.dms(ServerMessage::HistoryEvent { event });
    }

    pub(super) fn schedule_autosave(&self) {
        if let (Some(autosaver), Some(path)) = (&self.autosaver, &self.current_path) {
            autosaver.schedule(path.clone(), self.state.extract_full());
        }
    }

    pub(super) fn broadcast_undo_state(&self, out: &mut Outbox) {
        out.all(ServerMessage::UndoRedoState {
            state: self.undo.state(),
        });
    }

    // =========================================================================
    // Resources
    // =========================================================================

    pub(super) fn footprint(&self) -> usize {
        let counts = self.state.counts();
        estimate_footprint(&Footprint {
            tokens: counts.tokens,
            assets: counts.assets,
            floor_cells: counts.floor_cells,
            fog_cells: counts.fog_cells,
            undo_entries: self.undo.len(),
            history_entries: self.history.len(),
        })
    }

    /// Shed the redo stack and spare capacity when over the memory limit.
    pub(super) fn check_resources(&mut self, out: &mut Outbox) {
        let footprint = self.footprint();
        if footprint <= self.settings.limits.memory_limit_bytes {
            return;
        }
        let dropped = self.undo.drop_redo();
        self.undo.shrink_to_fit();
        self.history.shrink_to_fit();
        self.state.shrink_to_fit();
        tracing::warn!(
            footprint,
            limit = self.settings.limits.memory_limit_bytes,
            dropped_redo = dropped,
            "Memory estimate over limit, shed redo stack"
        );
        if dropped > 0 {
            self.broadcast_undo_state(out);
        }
    }
}
