//! Connection management for WebSocket viewers.
//!
//! Tracks every connected viewer's role and identity next to its outbound
//! channel. Only the session actor mutates records; the WebSocket layer
//! merely reads them.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use mapkeep_domain::{HistoryActor, Role};
use mapkeep_shared::{ServerMessage, UserInfo};

use crate::infrastructure::ports::AuthUser;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Server is full ({0} viewers connected)")]
    ServerFull(usize),
    #[error("Connection not found")]
    NotFound,
    #[error("Session is shutting down")]
    SessionClosed,
}

/// Information about a connected viewer.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub connection_id: Uuid,
    pub role: Role,
    /// Stable client id chosen by the viewer on join (defaults to the
    /// connection id); token ownership refers to it
    pub identity: String,
    pub display_name: String,
    pub user: Option<AuthUser>,
    pub session_token: Option<String>,
}

impl ClientRecord {
    pub fn new(connection_id: Uuid, role: Role) -> Self {
        Self {
            connection_id,
            role,
            identity: connection_id.to_string(),
            display_name: format!("Viewer {}", &connection_id.simple().to_string()[..6]),
            user: None,
            session_token: None,
        }
    }

    pub fn is_dm(&self) -> bool {
        self.role.is_dm()
    }

    /// Identity used for ownership checks: the authenticated user if any,
    /// otherwise the viewer-chosen client id.
    pub fn owner_ids(&self) -> impl Iterator<Item = &str> {
        self.user
            .as_ref()
            .map(|u| u.id.as_str())
            .into_iter()
            .chain(std::iter::once(self.identity.as_str()))
    }

    pub fn actor(&self) -> HistoryActor {
        HistoryActor {
            id: self
                .user
                .as_ref()
                .map_or_else(|| self.identity.clone(), |u| u.id.clone()),
            name: self.display_name.clone(),
            role: self.role,
        }
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.user.as_ref().map(|user| UserInfo {
            id: user.id.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            connection_role: user.role.connection_role(),
        })
    }
}

/// Manages all active WebSocket connections.
pub struct ConnectionManager {
    /// Map of connection_id -> (ClientRecord, sender channel)
    connections: RwLock<HashMap<Uuid, (ClientRecord, mpsc::Sender<ServerMessage>)>>,
    max_clients: usize,
}

impl ConnectionManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_clients,
        }
    }

    /// Register a new connection, enforcing the client ceiling.
    pub async fn register(
        &self,
        record: ClientRecord,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<(), ConnectionError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_clients {
            return Err(ConnectionError::ServerFull(connections.len()));
        }
        let connection_id = record.connection_id;
        tracing::info!(
            connection_id = %connection_id,
            role = %record.role,
            "Connection registered"
        );
        connections.insert(connection_id, (record, sender));
        Ok(())
    }

    pub async fn unregister(&self, connection_id: Uuid) -> Option<ClientRecord> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&connection_id).map(|(record, _)| record);
        if removed.is_some() {
            tracing::info!(connection_id = %connection_id, "Connection unregistered");
        }
        removed
    }

    pub async fn get(&self, connection_id: Uuid) -> Option<ClientRecord> {
        let connections = self.connections.read().await;
        connections.get(&connection_id).map(|(record, _)| record.clone())
    }

    /// Mutate a record in place. Returns the updated copy.
    pub async fn update<F>(&self, connection_id: Uuid, f: F) -> Result<ClientRecord, ConnectionError>
    where
        F: FnOnce(&mut ClientRecord),
    {
        let mut connections = self.connections.write().await;
        let (record, _) = connections
            .get_mut(&connection_id)
            .ok_or(ConnectionError::NotFound)?;
        f(record);
        Ok(record.clone())
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn send_to(&self, connection_id: Uuid, message: ServerMessage) {
        let connections = self.connections.read().await;
        if let Some((_, sender)) = connections.get(&connection_id) {
            if let Err(e) = sender.try_send(message) {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Failed to send message"
                );
            }
        }
    }

    pub async fn broadcast(&self, message: ServerMessage) {
        let connections = self.connections.read().await;
        for (record, sender) in connections.values() {
            if let Err(e) = sender.try_send(message.clone()) {
                tracing::warn!(
                    connection_id = %record.connection_id,
                    error = %e,
                    "Failed to broadcast message"
                );
            }
        }
    }

    pub async fn broadcast_to_dms(&self, message: ServerMessage) {
        let connections = self.connections.read().await;
        for (record, sender) in connections.values() {
            if record.is_dm() {
                if let Err(e) = sender.try_send(message.clone()) {
                    tracing::warn!(
                        connection_id = %record.connection_id,
                        error = %e,
                        "Failed to broadcast to DM"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: Role) -> ClientRecord {
        ClientRecord::new(Uuid::new_v4(), role)
    }

    #[tokio::test]
    async fn rejects_registrations_past_the_ceiling() {
        let manager = ConnectionManager::new(1);
        let (tx, _rx) = mpsc::channel(4);
        manager.register(record(Role::Player), tx.clone()).await.expect("first");
        assert_eq!(
            manager.register(record(Role::Player), tx).await,
            Err(ConnectionError::ServerFull(1))
        );
        assert_eq!(manager.count().await, 1);
    }

    #[tokio::test]
    async fn dm_broadcast_skips_players() {
        let manager = ConnectionManager::new(8);
        let (dm_tx, mut dm_rx) = mpsc::channel(4);
        let (player_tx, mut player_rx) = mpsc::channel(4);
        manager.register(record(Role::Dm), dm_tx).await.expect("dm");
        manager
            .register(record(Role::Player), player_tx)
            .await
            .expect("player");

        manager.broadcast_to_dms(ServerMessage::Pong).await;
        manager.broadcast(ServerMessage::LoggedOut).await;

        assert_eq!(dm_rx.recv().await, Some(ServerMessage::Pong));
        assert_eq!(dm_rx.recv().await, Some(ServerMessage::LoggedOut));
        assert_eq!(player_rx.recv().await, Some(ServerMessage::LoggedOut));
        assert!(player_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_changes_role_in_place() {
        let manager = ConnectionManager::new(8);
        let rec = record(Role::Player);
        let id = rec.connection_id;
        let (tx, _rx) = mpsc::channel(4);
        manager.register(rec, tx).await.expect("register");

        let updated = manager
            .update(id, |r| r.role = Role::Dm)
            .await
            .expect("update");
        assert!(updated.is_dm());
        assert!(manager.get(id).await.is_some_and(|r| r.is_dm()));
        assert!(manager.unregister(id).await.is_some());
        assert_eq!(
            manager.update(id, |_| {}).await.map(|_| ()),
            Err(ConnectionError::NotFound)
        );
    }
}
