//! The session actor.
//!
//! One task owns the [`Session`] and drains a command queue, so every
//! mutation runs to completion before the next starts. Sockets and timers
//! only ever talk to it through a [`SessionHandle`].

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use mapkeep_domain::Role;
use mapkeep_shared::{ClientMessage, ServerMessage};

use crate::api::connections::ConnectionError;

use super::outbox::Outbox;
use super::state::Session;

#[derive(Debug)]
pub enum SessionCommand {
    Connect {
        connection_id: Uuid,
        sender: mpsc::Sender<ServerMessage>,
        requested_role: Option<Role>,
        reply: oneshot::Sender<Result<(), ConnectionError>>,
    },
    Message {
        connection_id: Uuid,
        message: ClientMessage,
    },
    Disconnect {
        connection_id: Uuid,
    },
    GovernorTick,
    /// Stop the actor. Dropping the session flushes any pending autosave.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn connect(
        &self,
        connection_id: Uuid,
        sender: mpsc::Sender<ServerMessage>,
        requested_role: Option<Role>,
    ) -> Result<(), ConnectionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Connect {
                connection_id,
                sender,
                requested_role,
                reply,
            })
            .await
            .map_err(|_| ConnectionError::SessionClosed)?;
        rx.await.map_err(|_| ConnectionError::SessionClosed)?
    }

    pub async fn dispatch(&self, connection_id: Uuid, message: ClientMessage) {
        let command = SessionCommand::Message {
            connection_id,
            message,
        };
        if self.tx.send(command).await.is_err() {
            tracing::warn!(connection_id = %connection_id, "Session closed, dropping message");
        }
    }

    pub async fn disconnect(&self, connection_id: Uuid) {
        if self
            .tx
            .send(SessionCommand::Disconnect { connection_id })
            .await
            .is_err()
        {
            tracing::debug!(connection_id = %connection_id, "Session closed before disconnect");
        }
    }

    pub async fn shutdown(&self) {
        if self.tx.send(SessionCommand::Shutdown).await.is_err() {
            tracing::debug!("Session already stopped");
        }
    }

    /// Raw queue sender, for timers.
    pub fn sender(&self) -> mpsc::Sender<SessionCommand> {
        self.tx.clone()
    }
}

/// Spawn the actor. It stops on [`SessionHandle::shutdown`] or once every
/// handle is dropped.
pub fn spawn_session(session: Session, queue_size: usize) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_size.max(1));
    let task = tokio::spawn(run(session, rx));
    (SessionHandle { tx }, task)
}

async fn run(mut session: Session, mut rx: mpsc::Receiver<SessionCommand>) {
    tracing::info!("Session actor started");
    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::Connect {
                connection_id,
                sender,
                requested_role,
                reply,
            } => {
                let result = session.connect(connection_id, sender, requested_role).await;
                if reply.send(result).is_err() {
                    // The socket went away while waiting; don't leak the slot.
                    session.disconnect(connection_id).await;
                }
            }
            SessionCommand::Message {
                connection_id,
                message,
            } => {
                let out = session.handle_message(connection_id, message).await;
                out.deliver(session.connections()).await;
            }
            SessionCommand::Disconnect { connection_id } => {
                session.disconnect(connection_id).await;
            }
            SessionCommand::GovernorTick => {
                let mut out = Outbox::new();
                session.governor_tick(&mut out);
                out.deliver(session.connections()).await;
            }
            SessionCommand::Shutdown => break,
        }
    }
    tracing::info!("Session actor stopped");
}
