//! The session use case: one authoritative board shared by every viewer.
//!
//! All mutation funnels through the actor in [`actor`]; the other modules
//! add command handlers to [`Session`], grouped by what they touch.

mod actor;
mod assets;
mod connection;
mod dispatch;
mod error;
mod floors;
mod fog;
mod governor;
mod locations;
mod outbox;
mod state;
mod tokens;
mod undo;

pub use actor::{spawn_session, SessionCommand, SessionHandle};
pub use dispatch::{required_permission, Permission};
pub use error::CommandError;
pub use outbox::{Audience, Outbound, Outbox};
pub use state::{Session, SessionSettings};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use mapkeep_domain::{Cell, MapEvent, Role};
    use mapkeep_shared::{ClientMessage, ErrorCode, ServerMessage, UndoRedoState};

    use super::*;
    use crate::api::connections::ConnectionManager;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::config::Limits;
    use crate::infrastructure::persistence::LocationStore;
    use crate::infrastructure::ports::{AuthSession, AuthUser, MockAuthPort, UserRole};

    struct Harness {
        session: Session,
        receivers: Vec<mpsc::Receiver<ServerMessage>>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(auth: MockAuthPort, open_roles: bool) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let store = LocationStore::open(dir.path()).expect("store");
            let now = Utc
                .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
                .single()
                .expect("valid time");
            let clock = FixedClock(now);
            let session = Session::new(
                SessionSettings {
                    limits: Limits::default(),
                    open_roles,
                },
                Arc::new(ConnectionManager::new(8)),
                Arc::new(store),
                Arc::new(auth),
                Arc::new(clock),
            );
            Self {
                session,
                receivers: Vec::new(),
                _dir: dir,
            }
        }

        async fn connect(&mut self, role: Role) -> Uuid {
            let id = Uuid::new_v4();
            let (tx, rx) = mpsc::channel(64);
            self.session
                .connect(id, tx, Some(role))
                .await
                .expect("registered");
            self.receivers.push(rx);
            id
        }

        async fn send(&mut self, id: Uuid, message: serde_json::Value) -> Outbox {
            let message: ClientMessage = serde_json::from_value(message).expect("valid message");
            self.session.handle_message(id, message).await
        }
    }

    fn messages(out: &Outbox) -> Vec<&ServerMessage> {
        out.messages().iter().map(|o| &o.message).collect()
    }

    fn error_code(out: &Outbox) -> Option<ErrorCode> {
        out.messages().iter().find_map(|o| match &o.message {
            ServerMessage::Error { code, .. } => Some(*code),
            _ => None,
        })
    }

    fn spawn_owned(owner: &str) -> serde_json::Value {
        json!({
            "type": "spawnToken",
            "token": {"id": "hero", "name": "Aria", "owner": owner, "vision": {"radius": 8}}
        })
    }

    #[tokio::test]
    async fn player_cannot_spawn_tokens() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let player = h.connect(Role::Player).await;

        let out = h.send(player, json!({"type": "spawnToken", "token": {}})).await;

        assert!(out.is_empty());
        assert!(h.session.state().tokens().is_empty());
    }

    #[tokio::test]
    async fn spawning_a_seeing_token_reveals_fog_in_the_same_patch() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;

        let out = h.send(dm, spawn_owned("alice")).await;

        let Some(ServerMessage::StatePatch { events }) = messages(&out).first().copied() else {
            panic!("expected a state patch first");
        };
        let spawned = events
            .iter()
            .position(|e| matches!(e, MapEvent::TokenSpawned { .. }))
            .expect("tokenSpawned");
        let revealed = events
            .iter()
            .position(|e| matches!(e, MapEvent::FogRevealed { .. }))
            .expect("fogRevealed");
        assert!(spawned < revealed);

        let token = &h.session.state().tokens()[0];
        assert_eq!(token.cell(), Cell::new(5, 5));
        assert!(h
            .session
            .state()
            .fog()
            .is_revealed(&token.level_id, Cell::new(5, 13)));
        assert!(messages(&out).contains(&&ServerMessage::UndoRedoState {
            state: UndoRedoState::new(1, 0)
        }));
    }

    #[tokio::test]
    async fn revealing_around_a_center_at_the_grid_edge_is_clipped() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;

        let out = h
            .send(
                dm,
                json!({
                    "type": "revealFog",
                    "levelId": "level-1",
                    "cells": [],
                    "center": "2147483647,0",
                    "radius": 3
                }),
            )
            .await;

        assert_eq!(error_code(&out), None);
        let level: mapkeep_domain::LevelId = "level-1".into();
        let fog = h.session.state().fog();
        assert!(fog.is_revealed(&level, Cell::new(i32::MAX, 0)));
        assert!(fog.is_revealed(&level, Cell::new(i32::MAX - 3, 0)));
        assert!(!fog.is_revealed(&level, Cell::new(i32::MIN, 0)));
    }

    #[tokio::test]
    async fn the_actor_keeps_serving_after_an_edge_reveal() {
        let Harness { session, _dir, .. } = Harness::new(MockAuthPort::new(), true);
        let (handle, task) = spawn_session(session, 16);

        let (dm_tx, mut dm_rx) = mpsc::channel(64);
        let dm = Uuid::new_v4();
        handle
            .connect(dm, dm_tx, Some(Role::Dm))
            .await
            .expect("dm connects");
        let reveal: ClientMessage = serde_json::from_value(json!({
            "type": "revealFog",
            "levelId": "level-1",
            "center": "2147483647,2147483647",
            "radius": 20
        }))
        .expect("valid message");
        handle.dispatch(dm, reveal).await;

        let patch = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                match dm_rx.recv().await {
                    Some(ServerMessage::StatePatch { events }) => break events,
                    Some(_) => continue,
                    None => panic!("session dropped the dm"),
                }
            }
        })
        .await
        .expect("state patch");
        assert!(matches!(patch[0], MapEvent::FogRevealed { .. }));

        let (tx, _rx) = mpsc::channel(8);
        handle
            .connect(Uuid::new_v4(), tx, Some(Role::Player))
            .await
            .expect("session still accepts connections");

        handle.shutdown().await;
        task.await.expect("actor exits cleanly");
    }

    #[tokio::test]
    async fn owners_may_move_their_tokens_and_others_may_not() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let alice = h.connect(Role::Player).await;
        let bob = h.connect(Role::Player).await;
        h.send(dm, spawn_owned("alice")).await;
        h.send(alice, json!({"type": "join", "clientId": "alice"})).await;
        h.send(bob, json!({"type": "join", "clientId": "bob"})).await;

        let out = h
            .send(bob, json!({"type": "moveToken", "tokenId": "hero", "x": 2, "y": 2}))
            .await;
        assert!(out.is_empty());
        assert_eq!(h.session.state().tokens()[0].cell(), Cell::new(5, 5));

        let out = h
            .send(alice, json!({"type": "moveToken", "tokenId": "hero", "x": 6, "y": 5}))
            .await;
        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::StatePatch { .. })
        ));
        assert_eq!(h.session.state().tokens()[0].cell(), Cell::new(6, 5));
        // Player edits are not undoable.
        assert_eq!(h.session.undo.state(), UndoRedoState::new(1, 0));
    }

    #[tokio::test]
    async fn undo_and_redo_restore_exact_snapshots() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let before = h.session.state().extract_board();
        h.send(dm, spawn_owned("alice")).await;
        h.send(
            dm,
            json!({"type": "paintFloor", "levelId": "level-1", "cells": ["12,3"], "kind": "wood"}),
        )
        .await;
        let after = h.session.state().extract_board();

        h.send(dm, json!({"type": "undo"})).await;
        let out = h.send(dm, json!({"type": "undo"})).await;
        assert_eq!(h.session.state().extract_board(), before);
        assert!(messages(&out).contains(&&ServerMessage::UndoRedoState {
            state: UndoRedoState::new(0, 2)
        }));

        h.send(dm, json!({"type": "redo"})).await;
        h.send(dm, json!({"type": "redo"})).await;
        assert_eq!(h.session.state().extract_board(), after);
        assert_eq!(h.session.undo.state(), UndoRedoState::new(2, 0));
    }

    #[tokio::test]
    async fn undo_retracts_history_and_redo_replays_it() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        h.send(dm, spawn_owned("alice")).await;
        assert_eq!(h.session.history.len(), 1);

        let out = h.send(dm, json!({"type": "undo"})).await;
        assert_eq!(h.session.history.len(), 0);
        assert!(out
            .messages()
            .iter()
            .any(|o| o.audience == Audience::Dms
                && matches!(o.message, ServerMessage::HistoryRemoved { .. })));

        let out = h.send(dm, json!({"type": "redo"})).await;
        assert_eq!(h.session.history.len(), 1);
        assert!(messages(&out)
            .iter()
            .any(|m| matches!(m, ServerMessage::HistoryAdded { events } if events.len() == 1)));
    }

    #[tokio::test]
    async fn empty_undo_reports_an_error() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let out = h.send(dm, json!({"type": "undo"})).await;
        assert_eq!(error_code(&out), Some(ErrorCode::NothingToUndo));
    }

    #[tokio::test]
    async fn fresh_edits_clear_redo() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        h.send(dm, spawn_owned("alice")).await;
        h.send(dm, json!({"type": "undo"})).await;
        h.send(
            dm,
            json!({"type": "revealFog", "levelId": "level-1", "cells": ["0,0"]}),
        )
        .await;
        assert_eq!(h.session.undo.state(), UndoRedoState::new(1, 0));
    }

    #[tokio::test]
    async fn loading_outside_the_root_is_rejected() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let out = h
            .send(dm, json!({"type": "loadLocation", "path": "../secret.json"}))
            .await;
        assert_eq!(error_code(&out), Some(ErrorCode::InvalidPath));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_the_board() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        h.send(dm, spawn_owned("alice")).await;

        let out = h
            .send(dm, json!({"type": "saveLocation", "path": "maps/cave"}))
            .await;
        assert!(messages(&out).contains(&&ServerMessage::SavedOk {
            path: "maps/cave.json".to_string()
        }));
        assert_eq!(h.session.current_path(), Some("maps/cave.json"));

        h.send(dm, json!({"type": "removeTokenAt", "levelId": "level-1", "x": 5, "y": 5}))
            .await;
        assert!(h.session.state().tokens().is_empty());

        let out = h
            .send(dm, json!({"type": "loadLocation", "path": "maps/cave.json"}))
            .await;
        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::Reset { reason, .. }) if reason == "locationLoaded"
        ));
        assert_eq!(h.session.state().tokens().len(), 1);
        assert_eq!(h.session.undo.state(), UndoRedoState::new(0, 0));
    }

    #[tokio::test]
    async fn loading_a_snapshot_detaches_the_board_from_its_file() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        h.send(dm, json!({"type": "saveLocation", "path": "cave"})).await;
        assert!(h.session.current_path().is_some());

        let out = h
            .send(
                dm,
                json!({"type": "loadSnapshot", "snapshot": {
                    "location": {"id": "tower", "name": "Tower", "levels": [{"id": "top"}]}
                }}),
            )
            .await;
        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::Reset { reason, .. }) if reason == "snapshotLoaded"
        ));
        assert_eq!(h.session.current_path(), None);
        assert_eq!(h.session.state().location().name, "Tower");
    }

    #[tokio::test]
    async fn closed_roles_refuse_dm_to_anonymous_players() {
        let mut h = Harness::new(MockAuthPort::new(), false);
        let player = h.connect(Role::Dm).await;
        let record = h.session.connections().get(player).await.expect("record");
        assert_eq!(record.role, Role::Player);

        let out = h.send(player, json!({"type": "switchRole", "role": "dm"})).await;
        assert!(out.is_empty());
        let record = h.session.connections().get(player).await.expect("record");
        assert_eq!(record.role, Role::Player);
    }

    #[tokio::test]
    async fn open_roles_let_anyone_become_dm() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let viewer = h.connect(Role::Player).await;

        let out = h.send(viewer, json!({"type": "switchRole", "role": "dm"})).await;

        assert_eq!(
            messages(&out).first(),
            Some(&&ServerMessage::RoleChanged { role: Role::Dm })
        );
        assert!(out
            .messages()
            .iter()
            .any(|o| matches!(o.message, ServerMessage::HistorySnapshot { .. })));
    }

    #[tokio::test]
    async fn login_adopts_the_account_role() {
        let mut auth = MockAuthPort::new();
        auth.expect_login().returning(|credentials| {
            Ok(AuthSession {
                user: AuthUser {
                    id: "u-1".to_string(),
                    name: credentials.username,
                    role: UserRole::Dm,
                },
                token: "tok".to_string(),
            })
        });
        let mut h = Harness::new(auth, false);
        let viewer = h.connect(Role::Player).await;

        let out = h
            .send(
                viewer,
                json!({"type": "login", "username": "greta", "password": "pw"}),
            )
            .await;

        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::AuthOk { token, .. }) if token == "tok"
        ));
        let record = h.session.connections().get(viewer).await.expect("record");
        assert_eq!(record.role, Role::Dm);
        assert_eq!(record.display_name, "greta");

        // Now a DM, the account may spawn.
        let out = h.send(viewer, json!({"type": "spawnToken", "token": {}})).await;
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn failed_login_reports_auth_failed() {
        let mut auth = MockAuthPort::new();
        auth.expect_login()
            .returning(|_| Err(crate::infrastructure::ports::AuthError::InvalidCredentials));
        let mut h = Harness::new(auth, false);
        let viewer = h.connect(Role::Player).await;

        let out = h
            .send(viewer, json!({"type": "login", "username": "x", "password": "y"}))
            .await;

        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::AuthFailed { .. })
        ));
    }

    #[tokio::test]
    async fn welcome_carries_history_only_for_dms() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let player = h.connect(Role::Player).await;

        let out = h.send(dm, json!({"type": "join", "name": "Greta"})).await;
        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::Welcome { history: Some(_), role: Role::Dm, .. })
        ));
        let out = h.send(player, json!({"type": "join"})).await;
        assert!(matches!(
            messages(&out).first(),
            Some(ServerMessage::Welcome { history: None, role: Role::Player, .. })
        ));
    }

    #[tokio::test]
    async fn history_never_targets_players() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let out = h.send(dm, spawn_owned("alice")).await;
        for outbound in out.messages() {
            if outbound.message.is_dm_only() {
                assert_eq!(outbound.audience, Audience::Dms);
            }
        }
    }

    #[tokio::test]
    async fn toggling_a_door_is_open_to_players_but_not_undoable() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        let player = h.connect(Role::Player).await;
        h.send(
            dm,
            json!({"type": "placeAsset", "asset": {
                "id": "door-1", "levelId": "level-1", "x": 2, "y": 2, "kind": "door"
            }}),
        )
        .await;
        let undo_before = h.session.undo.state();

        let out = h.send(player, json!({"type": "toggleDoor", "assetId": "door-1"})).await;

        assert!(messages(&out).iter().any(|m| matches!(
            m,
            ServerMessage::StatePatch { events }
                if matches!(events.as_slice(), [MapEvent::DoorToggled { open: true, .. }])
        )));
        assert_eq!(h.session.undo.state(), undo_before);
    }

    #[tokio::test]
    async fn governor_tick_keeps_state_within_caps() {
        let mut h = Harness::new(MockAuthPort::new(), true);
        let dm = h.connect(Role::Dm).await;
        h.send(dm, spawn_owned("alice")).await;
        let mut out = Outbox::new();
        h.session.governor_tick(&mut out);
        assert_eq!(h.session.state().tokens().len(), 1);
        assert_eq!(h.session.undo.state(), UndoRedoState::new(1, 0));
    }
}
