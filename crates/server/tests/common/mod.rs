//! Common test utilities for router-level tests with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock clients injected, so slash commands can run end to end without
//! the chat platform, a generation backend, or cloud storage.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use diffusion_core::chat::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use diffusion_core::testing::{
    MockChatClient, MockCredentialStore, MockImageGenerator, MockObjectStore, MockQueue,
};
use diffusion_core::{ClientRegistry, PipelineWorker, WorkerSettings};
use diffusion_server::state::AppState;

/// Re-export fixtures for test convenience
pub use diffusion_core::testing::fixtures;

/// Test fixture with an in-process router and controllable mocks.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_command_is_queued() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.command("/diffusion", "x2 a red fox").await;
///
///     assert_eq!(response.status, StatusCode::OK);
///     assert_eq!(fixture.queue.published().await.len(), 1);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub queue: Arc<MockQueue>,
    pub chat: Arc<MockChatClient>,
    pub storage: Arc<MockObjectStore>,
    pub generator: Arc<MockImageGenerator>,
    pub credentials: Arc<MockCredentialStore>,
    pub worker: Option<Arc<PipelineWorker>>,
    /// Temporary directory backing the config paths
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

impl TestFixture {
    /// A fixture whose requester [`fixtures::REQUESTER_ID`] is authorized.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let queue = Arc::new(MockQueue::new());
        let chat = Arc::new(MockChatClient::new());
        let storage = Arc::new(MockObjectStore::new());
        let generator = Arc::new(MockImageGenerator::new());
        let credentials = Arc::new(MockCredentialStore::new());
        if test_config.authorized {
            credentials.insert(fixtures::REQUESTER_ID, "xoxp-42");
        }

        let (registry, _fatal) =
            ClientRegistry::with_clients(queue.clone(), storage.clone(), chat.clone());

        let worker = test_config.enable_worker.then(|| {
            let worker = Arc::new(PipelineWorker::new(
                WorkerSettings::default(),
                registry.clone(),
                credentials.clone(),
                generator.clone(),
            ));
            worker.start();
            worker
        });

        let state = Arc::new(AppState::new(
            fixtures::config(temp_dir.path()),
            registry,
            credentials.clone(),
            worker.clone(),
        ));
        let router = diffusion_server::api::create_router(state);

        Self {
            router,
            queue,
            chat,
            storage,
            generator,
            credentials,
            worker,
            temp_dir,
        }
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a signed slash command from the default requester.
    pub async fn command(&self, command: &str, text: &str) -> TestResponse {
        let body = form_body(&[
            ("command", command),
            ("text", text),
            ("channel_id", fixtures::CONVERSATION_ID),
            ("user_id", fixtures::REQUESTER_ID),
            ("response_url", fixtures::RESPONSE_URL),
        ]);
        self.post_signed("/slack/commands", &body).await
    }

    /// Send a form body signed with the configured signing secret.
    pub async fn post_signed(&self, path: &str, body: &str) -> TestResponse {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header(TIMESTAMP_HEADER, &timestamp)
            .header(
                SIGNATURE_HEADER,
                sign(fixtures::SIGNING_SECRET, &timestamp, body.as_bytes()),
            )
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a form body without signature headers.
    pub async fn post_unsigned(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            text: String::from_utf8_lossy(&body_bytes).into_owned(),
        }
    }

    /// Poll until `condition` holds, failing the test after five seconds.
    pub async fn wait_until<F, Fut>(&self, mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached");
    }
}

impl Drop for TestFixture {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            if worker.is_running() {
                worker.stop();
            }
        }
    }
}

/// URL-encode form fields the way the platform posts them.
pub fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Store a credential for the default requester
    pub authorized: bool,
    /// Run the pipeline worker against the mocks
    pub enable_worker: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            authorized: true,
            enable_worker: false,
        }
    }
}

impl TestConfig {
    pub fn with_worker() -> Self {
        Self {
            enable_worker: true,
            ..Self::default()
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            authorized: false,
            ..Self::default()
        }
    }
}
