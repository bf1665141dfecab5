//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Authentication (an external user-management service)
//! - Clock (for testing)
//!
//! Everything else in the engine is a concrete type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mapkeep_domain::Role;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Session is invalid or expired")]
    InvalidSession,
    #[error("A user already exists")]
    AlreadyInitialized,
    #[error("Authentication is not enabled on this server")]
    Disabled,
    #[error("Authentication backend error: {0}")]
    Backend(String),
}

// =============================================================================
// Authentication Types
// =============================================================================

/// Account role as managed by the authentication service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    /// Owner account; may manage other users and always acts as DM
    Master,
    Dm,
    Player,
}

impl UserRole {
    /// Whether this account may hold the DM connection role.
    pub fn grants_dm(self) -> bool {
        matches!(self, UserRole::Master | UserRole::Dm)
    }

    /// Connection role a fresh login lands in.
    pub fn connection_role(self) -> Role {
        if self.grants_dm() {
            Role::Dm
        } else {
            Role::Player
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Master => "master",
            UserRole::Dm => "dm",
            UserRole::Player => "player",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: AuthUser,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
}

// =============================================================================
// Ports
// =============================================================================

/// Narrow interface onto the user-management service.
///
/// The engine never hashes passwords or stores credentials; it only consumes
/// the resulting identity and role.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthPort: Send + Sync {
    async fn login(&self, credentials: Credentials) -> Result<AuthSession, AuthError>;

    /// Bootstrap the first account (as `master`). Fails once any user exists.
    async fn create_first_user(&self, user: NewUser) -> Result<AuthSession, AuthError>;

    async fn resume_session(&self, token: &str) -> Result<AuthUser, AuthError>;

    async fn logout(&self, token: &str) -> Result<(), AuthError>;
}

// =============================================================================
// Testability Ports
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
