//! Image generation backend.

mod error;
mod stability;
mod traits;

pub use error::GenerationError;
pub use stability::StabilityGenerator;
pub use traits::{GenerationRequest, ImageGenerator};
