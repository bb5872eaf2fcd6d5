use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success answer; `diagnostic` is the backend's own text.
    #[error("Generation backend returned {status}: {diagnostic}")]
    Backend { status: u16, diagnostic: String },

    /// The backend returned a different number of images than requested.
    #[error("Expected {requested} images, backend returned {returned}")]
    IncompleteResult { requested: u32, returned: usize },

    #[error("Failed to parse generation response: {0}")]
    Parse(String),
}

impl GenerationError {
    pub fn backend(status: u16, diagnostic: impl Into<String>) -> Self {
        Self::Backend {
            status,
            diagnostic: diagnostic.into(),
        }
    }

    /// Check a result set against the requested count.
    pub fn check_count(requested: u32, images: &[Vec<u8>]) -> Result<(), Self> {
        if images.len() != requested as usize {
            return Err(Self::IncompleteResult {
                requested,
                returned: images.len(),
            });
        }
        Ok(())
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
