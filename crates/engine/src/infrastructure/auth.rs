//! Default authentication adapter.

use async_trait::async_trait;

use crate::infrastructure::ports::{
    AuthError, AuthPort, AuthSession, AuthUser, Credentials, NewUser,
};

/// Adapter used when no user-management service is configured.
///
/// Every login fails with [`AuthError::Disabled`]; role switching is then
/// governed solely by the open-roles setting.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAuth;

#[async_trait]
impl AuthPort for DisabledAuth {
    async fn login(&self, _credentials: Credentials) -> Result<AuthSession, AuthError> {
        Err(AuthError::Disabled)
    }

    async fn create_first_user(&self, _user: NewUser) -> Result<AuthSession, AuthError> {
        Err(AuthError::Disabled)
    }

    async fn resume_session(&self, _token: &str) -> Result<AuthUser, AuthError> {
        Err(AuthError::Disabled)
    }

    async fn logout(&self, _token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_is_rejected() {
        let auth = DisabledAuth;
        let result = auth
            .login(Credentials {
                username: "dm".to_string(),
                password: "secret".to_string(),
            })
            .await;
        assert_eq!(result, Err(AuthError::Disabled));
        assert_eq!(auth.logout("token").await, Ok(()));
    }
}
