use thiserror::Error;

use super::types::{AccessToken, AuthorizedUser};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Database error: {0}")]
    Database(String),
}

impl CredentialError {
    pub fn database(reason: impl ToString) -> Self {
        Self::Database(reason.to_string())
    }
}

/// Lookup and persistence of requester credentials.
pub trait CredentialStore: Send + Sync {
    /// The stored token for `user_id`, if any.
    fn get(&self, user_id: &str) -> Result<Option<AuthorizedUser>, CredentialError>;

    /// Insert or replace the credential for `user.user_id`.
    fn put(&self, user: &AuthorizedUser) -> Result<(), CredentialError>;

    /// The usable token for `user_id`.
    ///
    /// A stored but blank token counts as not authorized.
    fn token_for(&self, user_id: &str) -> Result<Option<AccessToken>, CredentialError> {
        Ok(self
            .get(user_id)?
            .map(|user| user.token)
            .filter(|token| !token.is_empty()))
    }
}
