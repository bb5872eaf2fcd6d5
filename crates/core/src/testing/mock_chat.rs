//! Mock chat client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chat::{ChatClient, ChatError, MessageBlock, PostedMessage};
use crate::credentials::{AccessToken, AuthorizedUser};

/// A posted message for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub token: String,
    pub conversation_id: String,
    /// The ref the mock assigned to the message.
    pub message_ref: String,
    pub blocks: Vec<MessageBlock>,
}

/// An applied message edit for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdit {
    pub token: String,
    pub conversation_id: String,
    pub message_ref: String,
    pub blocks: Vec<MessageBlock>,
}

/// Mock implementation of the ChatClient trait.
///
/// Records successful posts, edits and responses; failures can be injected
/// for the next edit, or for a specific post/edit by call index (zero-based,
/// counting every attempt).
///
/// # Example
///
/// ```rust,ignore
/// use diffusion_core::testing::MockChatClient;
///
/// let chat = Arc::new(MockChatClient::new());
/// chat.fail_post_at(1, ChatError::api("chat.postMessage", "channel_not_found")).await;
///
/// // ... run intake ...
///
/// let posts = chat.recorded_posts().await;
/// assert_eq!(posts.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockChatClient {
    posts: Arc<RwLock<Vec<RecordedPost>>>,
    edits: Arc<RwLock<Vec<RecordedEdit>>>,
    responses: Arc<RwLock<Vec<(String, String)>>>,
    display_names: Arc<RwLock<HashMap<String, String>>>,
    oauth_codes: Arc<RwLock<HashMap<String, (String, String)>>>,
    post_failures: Arc<RwLock<HashMap<usize, ChatError>>>,
    edit_failures: Arc<RwLock<HashMap<usize, ChatError>>>,
    next_edit_error: Arc<RwLock<Option<ChatError>>>,
    post_calls: AtomicUsize,
    edit_calls: AtomicUsize,
}

impl MockChatClient {
    /// Create a new mock chat client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all successful posts.
    pub async fn recorded_posts(&self) -> Vec<RecordedPost> {
        self.posts.read().await.clone()
    }

    /// Get all applied edits.
    pub async fn recorded_edits(&self) -> Vec<RecordedEdit> {
        self.edits.read().await.clone()
    }

    /// Applied edits of one message.
    pub async fn edits_of(&self, message_ref: &str) -> Vec<RecordedEdit> {
        self.edits
            .read()
            .await
            .iter()
            .filter(|edit| edit.message_ref == message_ref)
            .cloned()
            .collect()
    }

    /// Get all `(response_url, text)` pairs sent through `respond`.
    pub async fn recorded_responses(&self) -> Vec<(String, String)> {
        self.responses.read().await.clone()
    }

    /// Set the display name returned for a user.
    pub async fn set_display_name(&self, user_id: &str, name: &str) {
        self.display_names
            .write()
            .await
            .insert(user_id.to_string(), name.to_string());
    }

    /// Make `exchange_code(code)` authorize `user_id` with `token`.
    pub async fn set_oauth_code(&self, code: &str, user_id: &str, token: &str) {
        self.oauth_codes
            .write()
            .await
            .insert(code.to_string(), (user_id.to_string(), token.to_string()));
    }

    /// Fail the post with the given call index.
    pub async fn fail_post_at(&self, call: usize, error: ChatError) {
        self.post_failures.write().await.insert(call, error);
    }

    /// Fail the edit with the given call index.
    pub async fn fail_edit_at(&self, call: usize, error: ChatError) {
        self.edit_failures.write().await.insert(call, error);
    }

    /// Fail the next edit, whatever its index.
    pub async fn fail_next_edit(&self, error: ChatError) {
        *self.next_edit_error.write().await = Some(error);
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn post_message(
        &self,
        token: &AccessToken,
        conversation_id: &str,
        blocks: &[MessageBlock],
    ) -> Result<PostedMessage, ChatError> {
        let call = self.post_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.post_failures.write().await.remove(&call) {
            return Err(error);
        }

        let message_ref = format!("1700000000.{:06}", call + 1);
        self.posts.write().await.push(RecordedPost {
            token: token.expose().to_string(),
            conversation_id: conversation_id.to_string(),
            message_ref: message_ref.clone(),
            blocks: blocks.to_vec(),
        });
        Ok(PostedMessage {
            conversation_id: conversation_id.to_string(),
            message_ref,
        })
    }

    async fn update_message(
        &self,
        token: &AccessToken,
        conversation_id: &str,
        message_ref: &str,
        blocks: &[MessageBlock],
    ) -> Result<(), ChatError> {
        let call = self.edit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_edit_error.write().await.take() {
            return Err(error);
        }
        if let Some(error) = self.edit_failures.write().await.remove(&call) {
            return Err(error);
        }

        self.edits.write().await.push(RecordedEdit {
            token: token.expose().to_string(),
            conversation_id: conversation_id.to_string(),
            message_ref: message_ref.to_string(),
            blocks: blocks.to_vec(),
        });
        Ok(())
    }

    async fn user_display_name(
        &self,
        _token: &AccessToken,
        user_id: &str,
    ) -> Result<String, ChatError> {
        self.display_names
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| ChatError::api("users.info", "user_not_found"))
    }

    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChatError> {
        self.responses
            .write()
            .await
            .push((response_url.to_string(), text.to_string()));
        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthorizedUser, ChatError> {
        let codes = self.oauth_codes.read().await;
        let (user_id, token) = codes
            .get(code)
            .ok_or_else(|| ChatError::api("oauth.v2.access", "invalid_code"))?;
        Ok(AuthorizedUser::new(user_id.clone(), AccessToken::new(token.clone())))
    }
}
