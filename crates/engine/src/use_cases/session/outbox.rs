//! Messages produced by one command, delivered after it completes.

use uuid::Uuid;

use mapkeep_shared::ServerMessage;

use crate::api::connections::ConnectionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Dms,
    Connection(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub audience: Audience,
    pub message: ServerMessage,
}

/// Ordered list of outbound messages.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outbound>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&mut self, message: ServerMessage) {
        self.push(Audience::All, message);
    }

    pub fn dms(&mut self, message: ServerMessage) {
        self.push(Audience::Dms, message);
    }

    pub fn to(&mut self, connection_id: Uuid, message: ServerMessage) {
        self.push(Audience::Connection(connection_id), message);
    }

    fn push(&mut self, audience: Audience, message: ServerMessage) {
        // History never reaches players, whatever the caller asked for.
        let audience = match audience {
            Audience::All if message.is_dm_only() => Audience::Dms,
            other => other,
        };
        self.messages.push(Outbound { audience, message });
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Outbound] {
        &self.messages
    }

    pub async fn deliver(self, connections: &ConnectionManager) {
        for Outbound { audience, message } in self.messages {
            match audience {
                Audience::All => connections.broadcast(message).await,
                Audience::Dms => connections.broadcast_to_dms(message).await,
                Audience::Connection(id) => connections.send_to(id, message).await,
            }
        }
    }
}
