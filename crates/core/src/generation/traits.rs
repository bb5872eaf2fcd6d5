use async_trait::async_trait;

use super::error::GenerationError;

/// Parameters of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image_count: u32,
    pub width: u32,
    pub height: u32,
}

/// A text-to-image backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the name of this generator implementation.
    fn name(&self) -> &str;

    /// Produce exactly `request.image_count` encoded images.
    ///
    /// The call is atomic: a backend that returns fewer images fails with
    /// [`GenerationError::IncompleteResult`]. No timeout is applied.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Vec<u8>>, GenerationError>;
}
