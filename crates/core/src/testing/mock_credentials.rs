//! Mock credential store for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::credentials::{AccessToken, AuthorizedUser, CredentialError, CredentialStore};

/// In-memory credential store.
#[derive(Debug, Default, Clone)]
pub struct MockCredentialStore {
    users: Arc<RwLock<HashMap<String, AuthorizedUser>>>,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds one authorized user.
    pub fn with_user(user_id: &str, token: &str) -> Self {
        let store = Self::new();
        store.insert(user_id, token);
        store
    }

    pub fn insert(&self, user_id: &str, token: &str) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                user_id.to_string(),
                AuthorizedUser::new(user_id, AccessToken::new(token)),
            );
    }

    pub fn remove(&self, user_id: &str) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id);
    }
}

impl CredentialStore for MockCredentialStore {
    fn get(&self, user_id: &str) -> Result<Option<AuthorizedUser>, CredentialError> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned())
    }

    fn put(&self, user: &AuthorizedUser) -> Result<(), CredentialError> {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }
}
