//! Application composition.

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::task::JoinHandle;

use crate::api::connections::ConnectionManager;
use crate::api::websocket::{ws_handler, WsState};
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::governor::spawn_ticker;
use crate::infrastructure::persistence::{spawn_autosaver, LocationStore, PersistenceError};
use crate::infrastructure::ports::{AuthPort, ClockPort};
use crate::use_cases::session::{
    spawn_session, Session, SessionCommand, SessionHandle, SessionSettings,
};

/// Depth of the session actor's command queue.
const SESSION_QUEUE_SIZE: usize = 1024;

/// The running engine: session actor plus its timers.
pub struct App {
    pub config: EngineConfig,
    pub session: SessionHandle,
    pub connections: Arc<ConnectionManager>,
    session_task: JoinHandle<()>,
    autosave_task: JoinHandle<()>,
    governor_task: JoinHandle<()>,
}

impl App {
    /// Open the location store, restore the last-used location and start
    /// the session actor, autosaver and governor.
    pub async fn new(
        config: EngineConfig,
        auth: Arc<dyn AuthPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Result<Self, PersistenceError> {
        let store = Arc::new(LocationStore::open(&config.data_dir)?);
        tracing::info!(root = %store.sandbox().root().display(), "Location store opened");

        let connections = Arc::new(ConnectionManager::new(config.limits.max_clients));
        let (autosaver, autosave_task) = spawn_autosaver(store.clone(), config.autosave_debounce);

        let mut session = Session::new(
            SessionSettings {
                limits: config.limits,
                open_roles: config.open_roles,
            },
            connections.clone(),
            store,
            auth,
            clock,
        )
        .with_autosaver(autosaver);
        session.bootstrap().await;

        let (handle, session_task) = spawn_session(session, SESSION_QUEUE_SIZE);
        let governor_task = spawn_ticker(handle.sender(), config.governor_interval, || {
            SessionCommand::GovernorTick
        });

        Ok(Self {
            config,
            session: handle,
            connections,
            session_task,
            autosave_task,
            governor_task,
        })
    }

    /// HTTP routes plus the `/ws` endpoint.
    pub fn router(&self) -> Router {
        let ws_state = Arc::new(WsState {
            session: self.session.clone(),
            max_message_bytes: self.config.limits.max_message_bytes,
        });
        Router::new()
            .route("/", get(health))
            .route("/api/health", get(health))
            .route("/ws", get(ws_handler).with_state(ws_state))
    }

    /// Stop the actor and wait for the final autosave flush.
    pub async fn shutdown(self) {
        self.governor_task.abort();
        self.session.shutdown().await;
        if let Err(e) = self.session_task.await {
            tracing::error!(error = %e, "Session actor panicked");
        }
        if let Err(e) = self.autosave_task.await {
            tracing::error!(error = %e, "Autosave task panicked");
        }
        tracing::info!("Engine stopped");
    }
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::infrastructure::auth::DisabledAuth;
    use crate::infrastructure::clock::SystemClock;

    #[tokio::test]
    async fn starts_with_the_default_board_and_shuts_down() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = EngineConfig {
            data_dir: dir.path().join("locations"),
            ..EngineConfig::default()
        };
        let app = App::new(config, Arc::new(DisabledAuth), Arc::new(SystemClock::new()))
            .await
            .expect("app");
        assert!(dir.path().join("locations").is_dir());
        assert_eq!(app.connections.count().await, 0);
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn restores_the_last_used_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocationStore::open(dir.path()).expect("store");
        let snapshot = mapkeep_domain::GameSnapshot::from_value(serde_json::json!({
            "location": {"id": "keep", "name": "Keep", "levels": [{"id": "hall"}]}
        }))
        .into_full();
        store.save("keep.json", &snapshot).await.expect("save");

        let config = EngineConfig {
            data_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let app = App::new(config, Arc::new(DisabledAuth), Arc::new(SystemClock::new()))
            .await
            .expect("app");
        app.shutdown().await;

        // The back-filled floors were written back to the file.
        let (_, reloaded) = store.load("keep.json").await.expect("load");
        let floors = reloaded.floors.expect("floors");
        assert!(floors.contains_level(&mapkeep_domain::LevelId::from_string("hall")));
    }
}
