use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::command::{route_command, CommandKind, CommandRequest};
use crate::chat::{authorize_url, ChatError, MessageBlock};
use crate::config::ChatConfig;
use crate::credentials::{AccessToken, CredentialError, CredentialStore};
use crate::job::{encode_job, parse_prompt, CodecError, CorrelationId, JobDescriptor};
use crate::metrics;
use crate::queue::QueueError;
use crate::registry::{ClientRegistry, RegistryError};
use crate::status::{StatusMessage, GENERIC_FAILURE_NOTICE};

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Credential lookup failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Client unavailable: {0}")]
    Client(#[from] RegistryError),

    #[error("Failed to echo command: {0}")]
    Echo(ChatError),

    #[error("Failed to post status message: {0}")]
    Placeholder(ChatError),

    #[error("Failed to encode job: {0}")]
    Encode(#[from] CodecError),

    #[error("Failed to publish job: {0}")]
    Publish(#[from] QueueError),
}

/// A job accepted by intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReceipt {
    pub correlation_id: CorrelationId,
    pub message_id: String,
    pub image_count: u32,
    pub conversation_id: String,
    pub message_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Queued(JobReceipt),
    /// The requester has no stored credential; `message` tells them where to
    /// authorize.
    NotAuthorized { message: String },
}

/// Handles inbound commands.
pub struct IntakeService {
    registry: ClientRegistry,
    credentials: Arc<dyn CredentialStore>,
    authorize_url: String,
    echo_command: bool,
}

impl IntakeService {
    pub fn new(
        registry: ClientRegistry,
        credentials: Arc<dyn CredentialStore>,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            registry,
            credentials,
            authorize_url: authorize_url(&chat.authorize_url, &chat.client_id),
            echo_command: chat.echo_command,
        }
    }

    /// The "please authorize" reply.
    pub fn authorize_message(&self) -> String {
        format!(
            "Oh no! It looks like you're not yet authorized, please follow the link below and try again!\n{}",
            self.authorize_url
        )
    }

    /// Validate, post the placeholder for, and publish one command.
    pub async fn submit(&self, request: &CommandRequest) -> Result<IntakeOutcome, IntakeError> {
        let result = self.submit_inner(request).await;
        let label = match &result {
            Ok(IntakeOutcome::Queued(_)) => "queued",
            Ok(IntakeOutcome::NotAuthorized { .. }) => "unauthorized",
            Err(IntakeError::UnknownCommand(_)) => "unknown_command",
            Err(_) => "failed",
        };
        metrics::JOBS_SUBMITTED.with_label_values(&[label]).inc();
        result
    }

    async fn submit_inner(&self, request: &CommandRequest) -> Result<IntakeOutcome, IntakeError> {
        match route_command(&request.command)? {
            CommandKind::Generate => {}
        }

        let Some(token) = self.credentials.token_for(&request.requester_id)? else {
            info!(requester_id = %request.requester_id, "Requester not authorized");
            return Ok(IntakeOutcome::NotAuthorized {
                message: self.authorize_message(),
            });
        };

        self.generate(request, token).await.map(IntakeOutcome::Queued)
    }

    async fn generate(
        &self,
        request: &CommandRequest,
        token: AccessToken,
    ) -> Result<JobReceipt, IntakeError> {
        let chat = self.registry.chat().ready().await?;

        if self.echo_command {
            chat.post_message(
                &token,
                &request.conversation_id,
                &[MessageBlock::plain(request.echo_text())],
            )
            .await
            .map_err(IntakeError::Echo)?;
        }

        let parsed = parse_prompt(&request.text);
        let correlation_id = CorrelationId::new();
        let mut status =
            StatusMessage::post(chat, token, &request.conversation_id, correlation_id)
                .await
                .map_err(IntakeError::Placeholder)?;

        let job = JobDescriptor::with_id(
            correlation_id,
            parsed,
            status.conversation_id(),
            status.message_ref(),
            &request.requester_id,
        );

        let published = match encode_job(&job) {
            Ok(payload) => match self.registry.queue().ready().await {
                Ok(queue) => queue.publish(payload).await.map_err(IntakeError::from),
                Err(e) => Err(IntakeError::from(e)),
            },
            Err(e) => Err(IntakeError::from(e)),
        };

        let message_id = match published {
            Ok(message_id) => message_id,
            Err(e) => {
                warn!(correlation_id = %correlation_id, error = %e, "Job not queued");
                let _ = status.mark_errored().await;
                return Err(e);
            }
        };

        info!(
            correlation_id = %correlation_id,
            message_id = %message_id,
            image_count = job.image_count(),
            requester_id = %request.requester_id,
            "Job queued"
        );

        Ok(JobReceipt {
            correlation_id,
            message_id,
            image_count: job.image_count(),
            conversation_id: job.conversation_id().to_string(),
            message_ref: job.message_ref().to_string(),
        })
    }

    /// Tell the requester a command failed, through its response URL.
    ///
    /// The requester only ever sees the generic notice.
    pub async fn report_failure(&self, request: &CommandRequest, error: &IntakeError) {
        if request.response_url.is_empty() {
            return;
        }
        let Some(chat) = self.registry.chat().get() else {
            warn!(error = %error, "Chat client not ready, failure not reported");
            return;
        };
        if let Err(e) = chat
            .respond(&request.response_url, GENERIC_FAILURE_NOTICE)
            .await
        {
            warn!(error = %e, "Failed to report failure to requester");
        }
    }
}
