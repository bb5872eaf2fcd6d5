use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::prompt::{ParsedPrompt, MAX_IMAGE_COUNT};

/// Unique identifier minted at intake.
///
/// Used as the log correlation field and as the stem of every artifact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Object key for the artifact at `index` of a job: `{correlation_id}_{index}.png`.
pub fn object_key(correlation_id: &CorrelationId, index: usize) -> String {
    format!("{}_{}.png", correlation_id, index)
}

/// One image-generation request.
///
/// Immutable after construction: fields are only reachable through getters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    correlation_id: CorrelationId,
    prompt: String,
    image_count: u32,
    conversation_id: String,
    message_ref: String,
    requester_id: String,
    created_at: DateTime<Utc>,
}

impl JobDescriptor {
    /// Build a descriptor for a freshly posted status message.
    pub fn new(
        parsed: ParsedPrompt,
        conversation_id: impl Into<String>,
        message_ref: impl Into<String>,
        requester_id: impl Into<String>,
    ) -> Self {
        Self::with_id(
            CorrelationId::new(),
            parsed,
            conversation_id,
            message_ref,
            requester_id,
        )
    }

    /// Build a descriptor under an id minted earlier in the request.
    pub fn with_id(
        correlation_id: CorrelationId,
        parsed: ParsedPrompt,
        conversation_id: impl Into<String>,
        message_ref: impl Into<String>,
        requester_id: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            prompt: parsed.prompt,
            image_count: parsed.image_count,
            conversation_id: conversation_id.into(),
            message_ref: message_ref.into(),
            requester_id: requester_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The count as carried on the wire.
    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    /// The number of images the backend is asked for.
    ///
    /// Payloads may come from other producers, so the cap is applied again on
    /// the consuming side.
    pub fn requested_images(&self) -> u32 {
        self.image_count.clamp(1, MAX_IMAGE_COUNT)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn message_ref(&self) -> &str {
        &self.message_ref
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Object key for the artifact at `index`.
    pub fn object_key(&self, index: usize) -> String {
        object_key(&self.correlation_id, index)
    }
}

/// Raw image bytes produced for a job.
///
/// Owned by the job until handed to delivery; the bytes are moved into the
/// upload and dropped afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub index: usize,
    pub key: String,
    pub bytes: Vec<u8>,
}

impl GeneratedArtifact {
    pub fn new(job: &JobDescriptor, index: usize, bytes: Vec<u8>) -> Self {
        Self {
            index,
            key: job.object_key(index),
            bytes,
        }
    }

    /// Wrap a backend result set, preserving backend order as artifact order.
    pub fn from_images(job: &JobDescriptor, images: Vec<Vec<u8>>) -> Vec<Self> {
        images
            .into_iter()
            .enumerate()
            .map(|(index, bytes)| Self::new(job, index, bytes))
            .collect()
    }
}

impl fmt::Debug for GeneratedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedArtifact")
            .field("index", &self.index)
            .field("key", &self.key)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::parse_prompt;

    fn job(text: &str) -> JobDescriptor {
        JobDescriptor::new(parse_prompt(text), "C123", "1700000000.000100", "U42")
    }

    #[test]
    fn test_new_job_from_prefixed_prompt() {
        let job = job("x2 a red fox");
        assert_eq!(job.prompt(), "a red fox");
        assert_eq!(job.image_count(), 2);
        assert_eq!(job.requested_images(), 2);
        assert_eq!(job.conversation_id(), "C123");
        assert_eq!(job.message_ref(), "1700000000.000100");
        assert_eq!(job.requester_id(), "U42");
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = job("a");
        let b = job("a");
        assert_ne!(a.correlation_id(), b.correlation_id());
    }

    #[test]
    fn test_object_keys_follow_index() {
        let job = job("x2 a red fox");
        let id = job.correlation_id().to_string();
        assert_eq!(job.object_key(0), format!("{}_0.png", id));
        assert_eq!(job.object_key(1), format!("{}_1.png", id));
    }

    #[test]
    fn test_requested_images_caps_foreign_payloads() {
        let mut value = serde_json::to_value(job("a")).unwrap();
        value["image_count"] = serde_json::json!(9);
        let foreign: JobDescriptor = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(foreign.image_count(), 9);
        assert_eq!(foreign.requested_images(), MAX_IMAGE_COUNT);

        value["image_count"] = serde_json::json!(0);
        let foreign: JobDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(foreign.requested_images(), 1);
    }

    #[test]
    fn test_artifacts_from_images_are_indexed() {
        let job = job("x2 a red fox");
        let artifacts = GeneratedArtifact::from_images(&job, vec![vec![1], vec![2, 2]]);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].index, 0);
        assert_eq!(artifacts[0].key, job.object_key(0));
        assert_eq!(artifacts[1].bytes, vec![2, 2]);
        assert!(format!("{:?}", artifacts[1]).contains("size_bytes: 2"));
    }
}
