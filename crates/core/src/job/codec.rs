//! Wire format for queued jobs.

use thiserror::Error;

use super::JobDescriptor;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode job: {0}")]
    Encode(String),

    #[error("Failed to decode job payload: {0}")]
    Decode(String),
}

/// Serialize a job into an opaque queue payload.
pub fn encode_job(job: &JobDescriptor) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(job).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Deserialize a queue payload back into a job.
pub fn decode_job(payload: &[u8]) -> Result<JobDescriptor, CodecError> {
    serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))
}
