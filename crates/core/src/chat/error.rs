use thiserror::Error;

/// Errors from the chat platform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The platform answered with `ok = false`.
    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    /// A non-success HTTP status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be understood.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl ChatError {
    pub fn api(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            error: error.into(),
        }
    }

    /// Whether the platform reported the token as unusable.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::Api { error, .. }
                if matches!(error.as_str(), "invalid_auth" | "not_authed" | "token_revoked" | "token_expired")
        )
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
