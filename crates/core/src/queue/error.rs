use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Queue API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse queue response: {0}")]
    Parse(String),

    /// The ack id does not belong to an outstanding message.
    #[error("Unknown ack id: {0}")]
    UnknownAckId(String),

    #[error("Queue not found: {0}")]
    NotFound(String),
}

impl QueueError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for QueueError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
