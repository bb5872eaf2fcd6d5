use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::render::{render_delivered, render_progress, DeliveredImage};
use super::state::JobStatus;
use crate::chat::{ChatClient, ChatError, MessageBlock};
use crate::credentials::AccessToken;
use crate::job::{CorrelationId, JobDescriptor};
use crate::metrics;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// Result of the remote edit that accompanied a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The state advanced but the message still shows the previous content.
    EditFailed(String),
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The single chat message of one job, and the authority over its state.
///
/// Owned by one pipeline stage at a time, so transitions never race.
pub struct StatusMessage {
    chat: Arc<dyn ChatClient>,
    token: AccessToken,
    conversation_id: String,
    message_ref: String,
    correlation_id: CorrelationId,
    state: JobStatus,
}

impl StatusMessage {
    /// Post the placeholder for a new job in the Queued state.
    pub async fn post(
        chat: Arc<dyn ChatClient>,
        token: AccessToken,
        conversation_id: &str,
        correlation_id: CorrelationId,
    ) -> Result<Self, ChatError> {
        let posted = chat
            .post_message(&token, conversation_id, &render_progress(JobStatus::Queued))
            .await?;
        debug!(
            correlation_id = %correlation_id,
            message_ref = %posted.message_ref,
            "Status message posted"
        );
        Ok(Self {
            chat,
            token,
            conversation_id: posted.conversation_id,
            message_ref: posted.message_ref,
            correlation_id,
            state: JobStatus::Queued,
        })
    }

    /// Take over the placeholder of a job received from the queue.
    pub fn resume(chat: Arc<dyn ChatClient>, token: AccessToken, job: &JobDescriptor) -> Self {
        Self {
            chat,
            token,
            conversation_id: job.conversation_id().to_string(),
            message_ref: job.message_ref().to_string(),
            correlation_id: *job.correlation_id(),
            state: JobStatus::Queued,
        }
    }

    pub fn state(&self) -> JobStatus {
        self.state
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn message_ref(&self) -> &str {
        &self.message_ref
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub async fn mark_generating(&mut self) -> Result<EditOutcome, StatusError> {
        self.transition(JobStatus::Generating, render_progress(JobStatus::Generating))
            .await
    }

    pub async fn mark_loading(&mut self) -> Result<EditOutcome, StatusError> {
        self.transition(JobStatus::Loading, render_progress(JobStatus::Loading))
            .await
    }

    /// Replace the placeholder with the stored images.
    pub async fn mark_delivered(
        &mut self,
        prompt: &str,
        images: &[DeliveredImage],
    ) -> Result<EditOutcome, StatusError> {
        let blocks = render_delivered(&self.correlation_id, prompt, images);
        self.transition(JobStatus::Delivered, blocks).await
    }

    /// Show the generic failure notice.
    pub async fn mark_errored(&mut self) -> Result<EditOutcome, StatusError> {
        self.transition(JobStatus::Errored, render_progress(JobStatus::Errored))
            .await
    }

    async fn transition(
        &mut self,
        next: JobStatus,
        blocks: Vec<MessageBlock>,
    ) -> Result<EditOutcome, StatusError> {
        if !self.state.can_transition_to(next) {
            return Err(StatusError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        let previous = self.state;
        self.state = next;

        let result = self
            .chat
            .update_message(&self.token, &self.conversation_id, &self.message_ref, &blocks)
            .await;

        match result {
            Ok(()) => {
                metrics::STATUS_EDITS
                    .with_label_values(&[next.as_str(), "applied"])
                    .inc();
                debug!(
                    correlation_id = %self.correlation_id,
                    from = %previous,
                    to = %next,
                    "Status updated"
                );
                Ok(EditOutcome::Applied)
            }
            Err(e) => {
                metrics::STATUS_EDITS
                    .with_label_values(&[next.as_str(), "failed"])
                    .inc();
                warn!(
                    correlation_id = %self.correlation_id,
                    from = %previous,
                    to = %next,
                    error = %e,
                    "Status edit failed"
                );
                Ok(EditOutcome::EditFailed(e.to_string()))
            }
        }
    }
}
