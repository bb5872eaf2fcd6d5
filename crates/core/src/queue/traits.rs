use async_trait::async_trait;

use super::error::QueueError;

/// A message handed out by [`JobQueue::pull`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Handle for `ack`/`nack`; valid for this delivery only.
    pub ack_id: String,
    pub message_id: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on each redelivery.
    pub delivery_attempt: u32,
}

/// An at-least-once message queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns the name of this queue implementation.
    fn name(&self) -> &str;

    /// Publish a payload and return the message id assigned by the queue.
    async fn publish(&self, payload: Vec<u8>) -> Result<String, QueueError>;

    /// Receive up to `max` messages.
    ///
    /// May wait until at least one message is available; an empty result is
    /// allowed.
    async fn pull(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Confirm processing; the message is not delivered again.
    async fn ack(&self, ack_id: &str) -> Result<(), QueueError>;

    /// Release the message for redelivery.
    async fn nack(&self, ack_id: &str) -> Result<(), QueueError>;
}
