use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::chat::ChatClient;
use crate::credentials::AccessToken;
use crate::job::{CorrelationId, GeneratedArtifact, JobDescriptor};
use crate::metrics;
use crate::status::{DeliveredImage, EditOutcome, StatusError, StatusMessage};
use crate::storage::{ObjectStore, StorageError, PNG_CONTENT_TYPE};

/// Metadata `name` when the requester's display name cannot be looked up.
pub const UNKNOWN_REQUESTER_NAME: &str = "(unknown)";

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Objects listed in `stored` stay in the store.
    #[error("Upload of {key} failed: {source}")]
    Upload {
        key: String,
        stored: Vec<String>,
        #[source]
        source: StorageError,
    },

    #[error("Metadata for {key} failed: {source}")]
    Metadata {
        key: String,
        stored: Vec<String>,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Status(#[from] StatusError),
}

impl DeliveryError {
    /// Keys written before the failure.
    pub fn stored_keys(&self) -> &[String] {
        match self {
            Self::Upload { stored, .. } | Self::Metadata { stored, .. } => stored,
            Self::Status(_) => &[],
        }
    }
}

/// Outcome of a delivery whose uploads all succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub correlation_id: CorrelationId,
    pub images: Vec<DeliveredImage>,
    /// False when the final edit failed; the job still counts as delivered.
    pub final_edit_applied: bool,
}

/// Uploads artifacts and performs the terminal status edit.
#[derive(Clone)]
pub struct DeliveryWorker {
    storage: Arc<dyn ObjectStore>,
    chat: Arc<dyn ChatClient>,
}

impl DeliveryWorker {
    pub fn new(storage: Arc<dyn ObjectStore>, chat: Arc<dyn ChatClient>) -> Self {
        Self { storage, chat }
    }

    /// Deliver one job.
    ///
    /// Uploads run in index order. The first failing upload moves the status
    /// to Errored and stops; earlier objects are not removed.
    pub async fn deliver(
        &self,
        job: &JobDescriptor,
        artifacts: Vec<GeneratedArtifact>,
        status: &mut StatusMessage,
        token: &AccessToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        let correlation_id = *job.correlation_id();
        let result = self.deliver_inner(job, artifacts, status, token).await;

        match &result {
            Ok(report) => {
                metrics::DELIVERIES.with_label_values(&["delivered"]).inc();
                info!(
                    correlation_id = %correlation_id,
                    images = report.images.len(),
                    final_edit_applied = report.final_edit_applied,
                    "Job delivered"
                );
            }
            Err(e) => {
                metrics::DELIVERIES.with_label_values(&["failed"]).inc();
                warn!(correlation_id = %correlation_id, error = %e, "Delivery failed");
            }
        }
        result
    }

    async fn deliver_inner(
        &self,
        job: &JobDescriptor,
        mut artifacts: Vec<GeneratedArtifact>,
        status: &mut StatusMessage,
        token: &AccessToken,
    ) -> Result<DeliveryReport, DeliveryError> {
        status.mark_loading().await?;

        let metadata = if self.storage.supports_metadata() {
            Some(self.object_metadata(job, token).await)
        } else {
            None
        };

        artifacts.sort_by_key(|artifact| artifact.index);
        let mut stored = Vec::with_capacity(artifacts.len());
        let mut images = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let GeneratedArtifact { index, key, bytes } = artifact;

            match self.storage.put_object(&key, bytes, PNG_CONTENT_TYPE).await {
                Ok(()) => {
                    metrics::UPLOADS.with_label_values(&["stored"]).inc();
                }
                Err(StorageError::AlreadyExists(_)) => {
                    // Keys derive from the correlation id: a redelivered job
                    // finds its own earlier upload.
                    metrics::UPLOADS.with_label_values(&["already_exists"]).inc();
                    info!(
                        correlation_id = %job.correlation_id(),
                        key = %key,
                        "Object already stored"
                    );
                }
                Err(source) => {
                    metrics::UPLOADS.with_label_values(&["failed"]).inc();
                    status.mark_errored().await?;
                    return Err(DeliveryError::Upload {
                        key,
                        stored,
                        source,
                    });
                }
            }

            if let Some(metadata) = &metadata {
                if let Err(source) = self.storage.set_metadata(&key, metadata).await {
                    stored.push(key.clone());
                    status.mark_errored().await?;
                    return Err(DeliveryError::Metadata {
                        key,
                        stored,
                        source,
                    });
                }
            }

            images.push(DeliveredImage {
                index,
                url: self.storage.public_url(&key),
            });
            stored.push(key);
        }

        let outcome = status.mark_delivered(job.prompt(), &images).await?;
        if let EditOutcome::EditFailed(reason) = &outcome {
            warn!(
                correlation_id = %job.correlation_id(),
                error = %reason,
                "Images stored but final status edit failed"
            );
        }

        Ok(DeliveryReport {
            correlation_id: *job.correlation_id(),
            images,
            final_edit_applied: outcome.is_applied(),
        })
    }

    async fn object_metadata(
        &self,
        job: &JobDescriptor,
        token: &AccessToken,
    ) -> HashMap<String, String> {
        let name = match self
            .chat
            .user_display_name(token, job.requester_id())
            .await
        {
            Ok(name) => name,
            Err(e) => {
                warn!(
                    correlation_id = %job.correlation_id(),
                    error = %e,
                    "Requester name lookup failed"
                );
                UNKNOWN_REQUESTER_NAME.to_string()
            }
        };

        HashMap::from([
            ("prompt".to_string(), job.prompt().to_string()),
            ("userId".to_string(), job.requester_id().to_string()),
            ("name".to_string(), name),
        ])
    }
}
