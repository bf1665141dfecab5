//! Joining, authentication and role switching.

use tokio::sync::mpsc;
use uuid::Uuid;

use mapkeep_domain::Role;
use mapkeep_shared::ServerMessage;

use crate::api::connections::{ClientRecord, ConnectionError};
use crate::infrastructure::ports::{AuthError, AuthSession, Credentials, NewUser};

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::Session;

const MAX_NAME_CHARS: usize = 64;

fn clean_name(name: &str) -> Option<String> {
    let name: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
    (!name.is_empty()).then_some(name)
}

impl Session {
    /// Register a new viewer. The DM role is granted on request only when
    /// roles are open; otherwise everyone starts as a player.
    pub async fn connect(
        &self,
        connection_id: Uuid,
        sender: mpsc::Sender<ServerMessage>,
        requested_role: Option<Role>,
    ) -> Result<(), ConnectionError> {
        let role = match requested_role {
            Some(Role::Dm) if self.settings.open_roles => Role::Dm,
            _ => Role::Player,
        };
        self.connections
            .register(ClientRecord::new(connection_id, role), sender)
            .await
    }

    pub async fn disconnect(&self, connection_id: Uuid) {
        self.connections.unregister(connection_id).await;
    }

    pub(super) async fn join(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        client_id: Option<String>,
        name: Option<String>,
        session_token: Option<String>,
    ) -> Result<(), CommandError> {
        let resumed = match session_token {
            Some(token) => match self.auth.resume_session(&token).await {
                Ok(user) => Some(AuthSession { user, token }),
                Err(e) => {
                    tracing::debug!(
                        connection_id = %client.connection_id,
                        error = %e,
                        "Session token rejected on join"
                    );
                    None
                }
            },
            None => None,
        };

        let identity = client_id.as_deref().and_then(clean_name);
        let display_name = name.as_deref().and_then(clean_name);
        let record = self
            .connections
            .update(client.connection_id, |record| {
                if let Some(identity) = identity {
                    record.identity = identity;
                }
                if let Some(name) = display_name {
                    record.display_name = name;
                }
                if let Some(session) = resumed {
                    record.role = session.user.role.connection_role();
                    record.display_name = session.user.name.clone();
                    record.user = Some(session.user);
                    record.session_token = Some(session.token);
                }
            })
            .await?;

        tracing::info!(
            connection_id = %record.connection_id,
            client_id = %record.identity,
            role = %record.role,
            "Viewer joined"
        );
        out.to(
            record.connection_id,
            ServerMessage::Welcome {
                connection_id: record.connection_id.to_string(),
                client_id: record.identity.clone(),
                role: record.role,
                snapshot: self.state.extract_full(),
                undo_redo: self.undo.state(),
                history: record.is_dm().then(|| self.history.snapshot()),
                user: record.user_info(),
            },
        );
        Ok(())
    }

    pub(super) async fn login(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        username: String,
        password: String,
    ) -> Result<(), CommandError> {
        let result = self
            .auth
            .login(Credentials { username, password })
            .await;
        self.authenticate(out, client, result).await
    }

    pub(super) async fn create_first_user(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        username: String,
        password: String,
        display_name: Option<String>,
    ) -> Result<(), CommandError> {
        let result = self
            .auth
            .create_first_user(NewUser {
                username,
                password,
                display_name,
            })
            .await;
        self.authenticate(out, client, result).await
    }

    pub(super) async fn resume_session(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        token: String,
    ) -> Result<(), CommandError> {
        let result = self
            .auth
            .resume_session(&token)
            .await
            .map(|user| AuthSession { user, token });
        self.authenticate(out, client, result).await
    }

    /// Bind an auth result to the connection. The connection role follows
    /// the account role.
    async fn authenticate(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        result: Result<AuthSession, AuthError>,
    ) -> Result<(), CommandError> {
        let session = match result {
            Ok(session) => session,
            Err(AuthError::Backend(e)) => {
                tracing::error!(error = %e, "Authentication backend failed");
                out.to(
                    client.connection_id,
                    ServerMessage::AuthFailed {
                        message: "Authentication is temporarily unavailable".to_string(),
                    },
                );
                return Ok(());
            }
            Err(e) => {
                tracing::info!(connection_id = %client.connection_id, error = %e, "Authentication failed");
                out.to(
                    client.connection_id,
                    ServerMessage::AuthFailed {
                        message: e.to_string(),
                    },
                );
                return Ok(());
            }
        };

        let token = session.token.clone();
        let record = self
            .connections
            .update(client.connection_id, |record| {
                record.role = session.user.role.connection_role();
                record.display_name = session.user.name.clone();
                record.user = Some(session.user);
                record.session_token = Some(session.token);
            })
            .await?;
        let Some(user) = record.user_info() else {
            return Err(CommandError::Auth(AuthError::InvalidSession));
        };

        tracing::info!(
            connection_id = %record.connection_id,
            user_id = %user.id,
            role = %record.role,
            "Viewer authenticated"
        );
        out.to(record.connection_id, ServerMessage::AuthOk { user, token });
        out.to(record.connection_id, ServerMessage::RoleChanged { role: record.role });
        if record.is_dm() {
            out.to(
                record.connection_id,
                ServerMessage::HistorySnapshot {
                    events: self.history.snapshot(),
                },
            );
        }
        Ok(())
    }

    pub(super) async fn logout(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
    ) -> Result<(), CommandError> {
        if let Some(token) = &client.session_token {
            if let Err(e) = self.auth.logout(token).await {
                tracing::warn!(connection_id = %client.connection_id, error = %e, "Logout failed upstream");
            }
        }
        self.connections
            .update(client.connection_id, |record| {
                record.user = None;
                record.session_token = None;
                record.role = Role::Player;
            })
            .await?;
        out.to(client.connection_id, ServerMessage::LoggedOut);
        out.to(
            client.connection_id,
            ServerMessage::RoleChanged { role: Role::Player },
        );
        Ok(())
    }

    /// Players may always step down. Stepping up needs open roles or an
    /// account that grants the DM role.
    pub(super) async fn switch_role(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        role: Role,
    ) -> Result<(), CommandError> {
        if role == Role::Dm {
            let granted = self.settings.open_roles
                || client.user.as_ref().is_some_and(|u| u.role.grants_dm());
            if !granted {
                return Err(CommandError::Unauthorized);
            }
        }
        self.connections
            .update(client.connection_id, |record| record.role = role)
            .await?;
        tracing::info!(connection_id = %client.connection_id, role = %role, "Role changed");
        out.to(client.connection_id, ServerMessage::RoleChanged { role });
        if role.is_dm() {
            out.to(
                client.connection_id,
                ServerMessage::HistorySnapshot {
                    events: self.history.snapshot(),
                },
            );
        }
        Ok(())
    }
}
