use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::{DispatchItem, WorkerStats};
use crate::credentials::CredentialStore;
use crate::job::decode_job;
use crate::metrics;
use crate::queue::{JobQueue, QueueError, ReceivedMessage};

/// What happened to one received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Acknowledged and handed to the dispatcher.
    Forwarded,
    /// Undecodable; negatively acknowledged for redelivery.
    Nacked,
    /// Acknowledged but not processable (no requester credential).
    Dropped,
    /// The dispatcher is gone.
    Closed,
}

/// Pulls messages from the queue and feeds the dispatcher.
pub struct ReceiveLoop {
    queue: Arc<dyn JobQueue>,
    credentials: Arc<dyn CredentialStore>,
    handoff: mpsc::Sender<DispatchItem>,
    max_messages: usize,
    stats: Arc<WorkerStats>,
}

impl ReceiveLoop {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        credentials: Arc<dyn CredentialStore>,
        handoff: mpsc::Sender<DispatchItem>,
        max_messages: usize,
    ) -> Self {
        Self::with_stats(queue, credentials, handoff, max_messages, Arc::default())
    }

    pub(crate) fn with_stats(
        queue: Arc<dyn JobQueue>,
        credentials: Arc<dyn CredentialStore>,
        handoff: mpsc::Sender<DispatchItem>,
        max_messages: usize,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            queue,
            credentials,
            handoff,
            max_messages,
            stats,
        }
    }

    /// Pull one batch and handle every message in it.
    ///
    /// Every message of the batch is acknowledged (or nacked) before the
    /// first job is forwarded, so a full hand-off channel never holds back
    /// an ack.
    pub async fn poll_once(&self) -> Result<Vec<ReceiveOutcome>, QueueError> {
        let messages = self.queue.pull(self.max_messages).await?;
        let mut outcomes = Vec::with_capacity(messages.len());
        let mut accepted = Vec::with_capacity(messages.len());
        for message in messages {
            match self.accept(message).await {
                Ok(item) => accepted.push(item),
                Err(outcome) => outcomes.push(outcome),
            }
        }

        for item in accepted {
            let outcome = self.forward(item).await;
            outcomes.push(outcome);
            if outcome == ReceiveOutcome::Closed {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Decode, acknowledge, and forward one message.
    pub async fn handle(&self, message: ReceivedMessage) -> ReceiveOutcome {
        match self.accept(message).await {
            Ok(item) => self.forward(item).await,
            Err(outcome) => outcome,
        }
    }

    /// Decode and acknowledge one message, resolving its requester token.
    async fn accept(&self, message: ReceivedMessage) -> Result<DispatchItem, ReceiveOutcome> {
        let job = match decode_job(&message.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    attempt = message.delivery_attempt,
                    error = %e,
                    "Undecodable job payload, nacking"
                );
                if let Err(e) = self.queue.nack(&message.ack_id).await {
                    warn!(message_id = %message.message_id, error = %e, "Nack failed");
                }
                WorkerStats::bump(&self.stats.nacked);
                metrics::JOBS_RECEIVED.with_label_values(&["nacked"]).inc();
                return Err(ReceiveOutcome::Nacked);
            }
        };

        // Acknowledged as soon as it decodes, before any processing.
        if let Err(e) = self.queue.ack(&message.ack_id).await {
            warn!(
                correlation_id = %job.correlation_id(),
                error = %e,
                "Ack failed, message may be redelivered"
            );
        }
        WorkerStats::bump(&self.stats.received);

        let token = match self.credentials.token_for(job.requester_id()) {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!(
                    correlation_id = %job.correlation_id(),
                    requester_id = %job.requester_id(),
                    "No credential for requester, dropping job"
                );
                WorkerStats::bump(&self.stats.dropped);
                metrics::JOBS_RECEIVED.with_label_values(&["dropped"]).inc();
                return Err(ReceiveOutcome::Dropped);
            }
            Err(e) => {
                warn!(
                    correlation_id = %job.correlation_id(),
                    error = %e,
                    "Credential lookup failed, dropping job"
                );
                WorkerStats::bump(&self.stats.dropped);
                metrics::JOBS_RECEIVED.with_label_values(&["dropped"]).inc();
                return Err(ReceiveOutcome::Dropped);
            }
        };

        metrics::JOBS_RECEIVED.with_label_values(&["accepted"]).inc();
        debug!(
            correlation_id = %job.correlation_id(),
            attempt = message.delivery_attempt,
            "Job received"
        );
        Ok(DispatchItem { job, token })
    }

    async fn forward(&self, item: DispatchItem) -> ReceiveOutcome {
        match self.handoff.send(item).await {
            Ok(()) => ReceiveOutcome::Forwarded,
            Err(_) => ReceiveOutcome::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::job::{encode_job, parse_prompt, JobDescriptor};
    use crate::queue::InMemoryQueue;
    use crate::testing::MockCredentialStore;

    fn setup() -> (Arc<InMemoryQueue>, ReceiveLoop, mpsc::Receiver<DispatchItem>) {
        let queue = Arc::new(InMemoryQueue::new());
        let credentials = Arc::new(MockCredentialStore::with_user("U42", "xoxp-42"));
        let (tx, rx) = mpsc::channel(4);
        let receiver = ReceiveLoop::new(queue.clone(), credentials, tx, 10);
        (queue, receiver, rx)
    }

    fn job(requester: &str) -> JobDescriptor {
        JobDescriptor::new(parse_prompt("x2 a red fox"), "C1", "1.2", requester)
    }

    #[tokio::test]
    async fn test_decoded_job_is_acked_and_forwarded() {
        let (queue, receiver, mut rx) = setup();
        let job = job("U42");
        queue.publish(encode_job(&job).unwrap()).await.unwrap();

        let outcomes = receiver.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![ReceiveOutcome::Forwarded]);
        assert_eq!(queue.outstanding_len().await, 0);

        let item = rx.recv().await.unwrap();
        assert_eq!(item.job, job);
        assert_eq!(item.token.expose(), "xoxp-42");
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_nacked() {
        let (queue, receiver, mut rx) = setup();
        queue.publish(b"not a job".to_vec()).await.unwrap();

        let outcomes = receiver.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![ReceiveOutcome::Nacked]);
        assert_eq!(queue.ready_len().await, 1);
        assert!(rx.try_recv().is_err());

        let redelivered = queue.pull(1).await.unwrap();
        assert_eq!(redelivered[0].delivery_attempt, 2);
    }

    #[tokio::test]
    async fn test_job_without_credential_is_dropped_after_ack() {
        let (queue, receiver, mut rx) = setup();
        queue
            .publish(encode_job(&job("U404")).unwrap())
            .await
            .unwrap();

        let outcomes = receiver.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![ReceiveOutcome::Dropped]);
        assert_eq!(queue.outstanding_len().await, 0);
        assert_eq!(queue.ready_len().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_dispatcher() {
        let (queue, receiver, rx) = setup();
        drop(rx);
        queue.publish(encode_job(&job("U42")).unwrap()).await.unwrap();

        let outcomes = receiver.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![ReceiveOutcome::Closed]);
    }

    #[tokio::test]
    async fn test_batch_is_acked_before_handoff_blocks() {
        let queue = Arc::new(InMemoryQueue::new());
        let credentials = Arc::new(MockCredentialStore::with_user("U42", "xoxp-42"));
        let (tx, mut rx) = mpsc::channel(1);
        let receiver = Arc::new(ReceiveLoop::new(queue.clone(), credentials, tx, 10));
        for _ in 0..3 {
            queue.publish(encode_job(&job("U42")).unwrap()).await.unwrap();
        }

        // Nobody drains the channel, so the second forward blocks.
        let polling = {
            let receiver = receiver.clone();
            tokio::spawn(async move { receiver.poll_once().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!polling.is_finished());
        assert_eq!(queue.outstanding_len().await, 0);
        assert_eq!(queue.ready_len().await, 0);

        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        let outcomes = polling.await.unwrap().unwrap();
        assert_eq!(outcomes, vec![ReceiveOutcome::Forwarded; 3]);
    }
}
