//! Job descriptors: the unit of work carried from intake to the worker.
//!
//! A [`JobDescriptor`] is built once at intake, serialized onto the queue and
//! decoded by the worker. It is never mutated after construction.

mod codec;
mod prompt;
mod types;

pub use codec::{decode_job, encode_job, CodecError};
pub use prompt::{parse_prompt, ParsedPrompt, MAX_IMAGE_COUNT};
pub use types::{object_key, CorrelationId, GeneratedArtifact, JobDescriptor};
