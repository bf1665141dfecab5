//! Command failures and how they surface to viewers.

use thiserror::Error;

use mapkeep_domain::DomainError;
use mapkeep_shared::ErrorCode;

use crate::api::connections::ConnectionError;
use crate::infrastructure::persistence::PersistenceError;
use crate::infrastructure::ports::AuthError;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Role or ownership check failed; dropped without a reply
    #[error("Not permitted")]
    Unauthorized,

    #[error(transparent)]
    Domain(DomainError),

    #[error("{0}")]
    Validation(String),

    #[error("Fog capacity exceeded: {0}")]
    FogCapExceeded(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

impl From<DomainError> for CommandError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::FogCapacity { .. } => Self::FogCapExceeded(err.to_string()),
            other => Self::Domain(other),
        }
    }
}

impl CommandError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Domain(DomainError::NotFound { .. }) => ErrorCode::NotFound,
            Self::Domain(_) | Self::Validation(_) => ErrorCode::ValidationError,
            Self::FogCapExceeded(_) => ErrorCode::FogCapacity,
            Self::Persistence(PersistenceError::InvalidPath(_)) => ErrorCode::InvalidPath,
            Self::Persistence(PersistenceError::NotFound(_)) => ErrorCode::NotFound,
            Self::Persistence(_) => ErrorCode::PersistenceError,
            Self::Auth(_) => ErrorCode::AuthError,
            Self::Connection(ConnectionError::ServerFull(_)) => ErrorCode::ServerFull,
            Self::Connection(_) | Self::Unauthorized => ErrorCode::InternalError,
            Self::NothingToUndo => ErrorCode::NothingToUndo,
            Self::NothingToRedo => ErrorCode::NothingToRedo,
        }
    }

    /// Text safe to show a viewer. Storage failures are logged in full and
    /// reported generically so host paths never leak.
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(
                e @ (PersistenceError::Io(_) | PersistenceError::Json(_) | PersistenceError::Task(_)),
            ) => {
                tracing::error!(error = %e, "Location storage error");
                "Failed to access location storage - please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fog_capacity_gets_its_own_code() {
        let err = CommandError::from(DomainError::fog_capacity(10, 5, 12));
        assert!(matches!(err, CommandError::FogCapExceeded(_)));
        assert_eq!(err.code(), ErrorCode::FogCapacity);
    }

    #[test]
    fn storage_errors_are_sanitized() {
        let io = std::io::Error::other("/srv/secret/path denied");
        let err = CommandError::from(PersistenceError::from(io));
        assert_eq!(err.code(), ErrorCode::PersistenceError);
        assert!(!err.public_message().contains("/srv"));

        let err = CommandError::from(PersistenceError::invalid_path("../x"));
        assert_eq!(err.code(), ErrorCode::InvalidPath);
        assert!(err.public_message().contains("../x"));
    }
}
