//! In-process queue for single-process deployments and tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

use super::error::QueueError;
use super::traits::{JobQueue, ReceivedMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    payload: Vec<u8>,
    attempts: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    outstanding: HashMap<String, StoredMessage>,
}

/// At-least-once queue held in memory.
///
/// Pulled messages stay outstanding until acked; a nack puts them back at the
/// front with the attempt counter incremented. Contents are lost when the
/// process exits.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    available: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting to be pulled.
    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    /// Messages pulled but neither acked nor nacked.
    pub async fn outstanding_len(&self) -> usize {
        self.state.lock().await.outstanding.len()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<String, QueueError> {
        let message_id = Uuid::new_v4().to_string();
        self.state.lock().await.ready.push_back(StoredMessage {
            message_id: message_id.clone(),
            payload,
            attempts: 0,
        });
        self.available.notify_one();
        debug!(message_id = %message_id, "Message published");
        Ok(message_id)
    }

    async fn pull(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        loop {
            {
                let mut state = self.state.lock().await;
                if !state.ready.is_empty() {
                    let take = max.max(1).min(state.ready.len());
                    let mut received = Vec::with_capacity(take);
                    let drained: Vec<StoredMessage> = state.ready.drain(..take).collect();
                    for mut message in drained {
                        message.attempts += 1;
                        let ack_id = Uuid::new_v4().to_string();
                        received.push(ReceivedMessage {
                            ack_id: ack_id.clone(),
                            message_id: message.message_id.clone(),
                            payload: message.payload.clone(),
                            delivery_attempt: message.attempts,
                        });
                        state.outstanding.insert(ack_id, message);
                    }
                    if !state.ready.is_empty() {
                        self.available.notify_one();
                    }
                    return Ok(received);
                }
            }
            self.available.notified().await;
        }
    }

    async fn ack(&self, ack_id: &str) -> Result<(), QueueError> {
        self.state
            .lock()
            .await
            .outstanding
            .remove(ack_id)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownAckId(ack_id.to_string()))
    }

    async fn nack(&self, ack_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let message = state
            .outstanding
            .remove(ack_id)
            .ok_or_else(|| QueueError::UnknownAckId(ack_id.to_string()))?;
        state.ready.push_front(message);
        drop(state);
        self.available.notify_one();
        Ok(())
    }
}
