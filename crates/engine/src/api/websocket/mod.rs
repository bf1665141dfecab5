//! WebSocket handling for map viewers.
//!
//! Each socket gets a reader loop and a writer task. The reader decodes
//! frames and forwards them to the session actor; the writer drains the
//! connection's outbound channel. Frame-level problems are answered here
//! and never reach the session.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use mapkeep_domain::Role;
use mapkeep_shared::{ClientMessage, ErrorCode, ServerMessage};

use crate::api::connections::ConnectionError;
use crate::use_cases::session::SessionHandle;

/// Buffer size for per-connection message channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// Frames above this are refused by the transport and close the socket.
/// Frames between the protocol limit and this get an error reply instead.
const TRANSPORT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Combined state for WebSocket handlers.
pub struct WsState {
    pub session: SessionHandle,
    pub max_message_bytes: usize,
}

/// Query parameters accepted on upgrade.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Requested initial role; only honoured when roles are open
    #[serde(default)]
    pub role: Option<String>,
}

impl ConnectParams {
    fn requested_role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|role| role.parse().ok())
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("Invalid message format: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Binary frames must be UTF-8 JSON")]
    Encoding,
}

impl ProtocolError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TooLarge { .. } => ErrorCode::MessageTooLarge,
            Self::Parse(_) | Self::Encoding => ErrorCode::ParseError,
        }
    }

    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

/// Decode one text frame, enforcing the size limit before parsing.
pub fn decode_frame(text: &str, limit: usize) -> Result<ClientMessage, ProtocolError> {
    if text.len() > limit {
        return Err(ProtocolError::TooLarge {
            size: text.len(),
            limit,
        });
    }
    Ok(serde_json::from_str(text)?)
}

/// WebSocket upgrade handler - entry point for new connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<WsState>>,
) -> Response {
    let requested_role = params.requested_role();
    ws.max_message_size(TRANSPORT_MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, requested_role))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<WsState>, requested_role: Option<Role>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    if let Err(e) = state
        .session
        .connect(connection_id, tx.clone(), requested_role)
        .await
    {
        tracing::warn!(connection_id = %connection_id, error = %e, "Connection refused");
        let code = match e {
            ConnectionError::ServerFull(_) => ErrorCode::ServerFull,
            _ => ErrorCode::InternalError,
        };
        if let Ok(json) = serde_json::to_string(&ServerMessage::error(code, e.to_string())) {
            let _ = ws_sender.send(Message::Text(json.into())).await;
        }
        let _ = ws_sender.send(Message::Close(None)).await;
        return;
    }

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Forward messages from the channel to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to serialize server message"),
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        let decoded = match result {
            Ok(Message::Text(text)) => decode_frame(text.as_str(), state.max_message_bytes),
            Ok(Message::Binary(bytes)) => std::str::from_utf8(&bytes)
                .map_err(|_| ProtocolError::Encoding)
                .and_then(|text| decode_frame(text, state.max_message_bytes)),
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => continue,
        };

        match decoded {
            Ok(message) => state.session.dispatch(connection_id, message).await,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Rejected frame");
                if tx.try_send(e.to_message()).is_err() {
                    tracing::warn!(
                        connection_id = %connection_id,
                        "Failed to send error, channel full or closed"
                    );
                }
            }
        }
    }

    state.session.disconnect(connection_id).await;
    send_task.abort();

    tracing::info!(connection_id = %connection_id, "WebSocket connection terminated");
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod ws_integration_tests;
