//! Google Cloud Pub/Sub over its REST API.
//!
//! Works against the hosted service (with a bearer token) and against the
//! local emulator (no token).

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::error::QueueError;
use super::traits::{JobQueue, ReceivedMessage};
use crate::config::QueueConfig;

pub struct PubSubQueue {
    client: Client,
    topic_path: String,
    subscription_path: String,
    endpoint: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceived>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceived {
    ack_id: String,
    message: WireMessage,
    #[serde(default)]
    delivery_attempt: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: String,
    message_id: String,
}

impl PubSubQueue {
    pub fn new(config: &QueueConfig, project_id: &str) -> Result<Self, QueueError> {
        // No client timeout: pulls are long polls.
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            topic_path: format!("projects/{}/topics/{}", project_id, config.topic),
            subscription_path: format!(
                "projects/{}/subscriptions/{}",
                project_id, config.subscription
            ),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Build the client and check that the subscription exists.
    pub async fn connect(config: &QueueConfig, project_id: &str) -> Result<Self, QueueError> {
        let queue = Self::new(config, project_id)?;
        let url = format!("{}/v1/{}", queue.endpoint, queue.subscription_path);
        let response = queue.authorize(queue.client.get(&url)).send().await?;

        let status = response.status();
        if status == 404 {
            return Err(QueueError::NotFound(queue.subscription_path.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::status(status.as_u16(), body));
        }
        debug!(subscription = %queue.subscription_path, "Pub/Sub subscription found");
        Ok(queue)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post(&self, path: &str, verb: &str, body: Value) -> Result<reqwest::Response, QueueError> {
        let url = format!("{}/v1/{}:{}", self.endpoint, path, verb);
        let response = self.authorize(self.client.post(&url)).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::status(status.as_u16(), body));
        }
        Ok(response)
    }
}

fn decode_received(wire: WireReceived) -> Result<ReceivedMessage, QueueError> {
    let payload = BASE64
        .decode(wire.message.data.as_bytes())
        .map_err(|e| QueueError::Parse(format!("message {}: {}", wire.message.message_id, e)))?;
    Ok(ReceivedMessage {
        ack_id: wire.ack_id,
        message_id: wire.message.message_id,
        payload,
        delivery_attempt: wire.delivery_attempt.unwrap_or(1),
    })
}

/// Decode a pulled batch message by message.
///
/// Returns the decoded messages and the ack ids of the ones that did not
/// decode.
fn decode_batch(received: Vec<WireReceived>) -> (Vec<ReceivedMessage>, Vec<String>) {
    let mut messages = Vec::with_capacity(received.len());
    let mut rejected = Vec::new();
    for wire in received {
        let ack_id = wire.ack_id.clone();
        match decode_received(wire) {
            Ok(message) => messages.push(message),
            Err(e) => {
                warn!(error = %e, "Undecodable Pub/Sub message, nacking");
                rejected.push(ack_id);
            }
        }
    }
    (messages, rejected)
}

#[async_trait]
impl JobQueue for PubSubQueue {
    fn name(&self) -> &str {
        "pubsub"
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<String, QueueError> {
        let body = json!({ "messages": [{ "data": BASE64.encode(&payload) }] });
        let response = self.post(&self.topic_path, "publish", body).await?;
        let published: PublishResponse = response
            .json()
            .await
            .map_err(|e| QueueError::Parse(e.to_string()))?;
        published
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::Parse("publish returned no message id".to_string()))
    }

    async fn pull(&self, max: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        let body = json!({ "maxMessages": max.max(1) });
        let response = self.post(&self.subscription_path, "pull", body).await?;
        let pulled: PullResponse = response
            .json()
            .await
            .map_err(|e| QueueError::Parse(e.to_string()))?;

        let (messages, rejected) = decode_batch(pulled.received_messages);
        for ack_id in rejected {
            if let Err(e) = self.nack(&ack_id).await {
                warn!(error = %e, "Nack failed");
            }
        }
        Ok(messages)
    }

    async fn ack(&self, ack_id: &str) -> Result<(), QueueError> {
        let body = json!({ "ackIds": [ack_id] });
        self.post(&self.subscription_path, "acknowledge", body).await?;
        Ok(())
    }

    async fn nack(&self, ack_id: &str) -> Result<(), QueueError> {
        let body = json!({ "ackIds": [ack_id], "ackDeadlineSeconds": 0 });
        self.post(&self.subscription_path, "modifyAckDeadline", body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueBackend;

    fn config() -> QueueConfig {
        QueueConfig {
            backend: QueueBackend::Pubsub,
            endpoint: "http://localhost:8085/".to_string(),
            topic: "jobs".to_string(),
            subscription: "jobs-worker".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resource_paths() {
        let queue = PubSubQueue::new(&config(), "my-project").unwrap();
        assert_eq!(queue.topic_path, "projects/my-project/topics/jobs");
        assert_eq!(
            queue.subscription_path,
            "projects/my-project/subscriptions/jobs-worker"
        );
        assert_eq!(queue.endpoint, "http://localhost:8085");
    }

    #[test]
    fn test_decode_pull_response() {
        let body = json!({
            "receivedMessages": [{
                "ackId": "ack-1",
                "message": {"data": BASE64.encode(b"{\"k\":1}"), "messageId": "42"},
                "deliveryAttempt": 3
            }]
        });
        let pulled: PullResponse = serde_json::from_value(body).unwrap();
        let messages: Vec<_> = pulled
            .received_messages
            .into_iter()
            .map(decode_received)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(messages[0].ack_id, "ack-1");
        assert_eq!(messages[0].message_id, "42");
        assert_eq!(messages[0].payload, b"{\"k\":1}");
        assert_eq!(messages[0].delivery_attempt, 3);
    }

    #[test]
    fn test_empty_pull_response() {
        let pulled: PullResponse = serde_json::from_value(json!({})).unwrap();
        assert!(pulled.received_messages.is_empty());
    }

    #[test]
    fn test_invalid_base64_is_parse_error() {
        let wire = WireReceived {
            ack_id: "a".into(),
            message: WireMessage {
                data: "***".into(),
                message_id: "1".into(),
            },
            delivery_attempt: None,
        };
        assert!(matches!(decode_received(wire), Err(QueueError::Parse(_))));
    }

    #[test]
    fn test_bad_message_does_not_fail_batch() {
        let body = json!({
            "receivedMessages": [
                {"ackId": "ack-1", "message": {"data": BASE64.encode(b"one"), "messageId": "1"}},
                {"ackId": "ack-2", "message": {"data": "***", "messageId": "2"}},
                {"ackId": "ack-3", "message": {"data": BASE64.encode(b"three"), "messageId": "3"}}
            ]
        });
        let pulled: PullResponse = serde_json::from_value(body).unwrap();
        let (messages, rejected) = decode_batch(pulled.received_messages);

        let ids: Vec<_> = messages.iter().map(|m| m.ack_id.as_str()).collect();
        assert_eq!(ids, vec!["ack-1", "ack-3"]);
        assert_eq!(messages[1].payload, b"three");
        assert_eq!(rejected, vec!["ack-2".to_string()]);
    }
}
