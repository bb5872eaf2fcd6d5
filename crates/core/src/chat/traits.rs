use async_trait::async_trait;

use super::error::ChatError;
use super::types::{MessageBlock, PostedMessage};
use crate::credentials::{AccessToken, AuthorizedUser};

/// Operations the pipeline needs from the chat platform.
///
/// Calls made on behalf of a requester carry that requester's token.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Post a new message and return its identity.
    async fn post_message(
        &self,
        token: &AccessToken,
        conversation_id: &str,
        blocks: &[MessageBlock],
    ) -> Result<PostedMessage, ChatError>;

    /// Replace the content of an existing message.
    ///
    /// Idempotent: repeating an edit with the same blocks leaves the message
    /// unchanged.
    async fn update_message(
        &self,
        token: &AccessToken,
        conversation_id: &str,
        message_ref: &str,
        blocks: &[MessageBlock],
    ) -> Result<(), ChatError>;

    /// Human-readable name of a user.
    async fn user_display_name(
        &self,
        token: &AccessToken,
        user_id: &str,
    ) -> Result<String, ChatError>;

    /// Post plain text to a slash command's response URL.
    async fn respond(&self, response_url: &str, text: &str) -> Result<(), ChatError>;

    /// Exchange an OAuth code for a user credential.
    async fn exchange_code(&self, code: &str) -> Result<AuthorizedUser, ChatError>;
}
