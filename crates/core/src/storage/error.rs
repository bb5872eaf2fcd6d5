use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// A write-once key was written before.
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Storage API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Metadata is not supported by the {0} store")]
    MetadataUnsupported(String),
}

impl StorageError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
