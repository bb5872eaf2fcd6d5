//! Mock job queue for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::queue::{InMemoryQueue, JobQueue, QueueError, ReceivedMessage};

/// An [`InMemoryQueue`] with publish recording and failure injection.
#[derive(Debug, Default)]
pub struct MockQueue {
    inner: InMemoryQueue,
    published: Arc<RwLock<Vec<Vec<u8>>>>,
    next_publish_error: Arc<RwLock<Option<QueueError>>>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads of successful publishes.
    pub async fn published(&self) -> Vec<Vec<u8>> {
        self.published.read().await.clone()
    }

    /// Configure the next publish to fail with the given error.
    pub async fn set_next_publish_error(&self, error: QueueError) {
        *self.next_publish_error.write().await = Some(error);
    }
}

#[async_trait]
impl JobQueue for MockQueue {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<String, QueueError> {
        if let Some(error) = self.next_publish_error.write().await.take() {
            return Err(error);
        }
        self.published.write().await.push(payload.clone());
        self.inner.publish(payload).await
    }

    async fn pull(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.inner.pull(max).await
    }

    async fn ack(&self, ack_id: &str) -> Result<(), QueueError> {
        self.inner.ack(ack_id).await
    }

    async fn nack(&self, ack_id: &str) -> Result<(), QueueError> {
        self.inner.nack(ack_id).await
    }
}
