//! Testing utilities and mock implementations.
//!
//! Every external collaborator of the pipeline has a mock here, so the full
//! intake → queue → dispatcher → delivery flow can run without a chat
//! platform, a generation backend or cloud storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use diffusion_core::testing::{MockChatClient, MockImageGenerator, MockObjectStore};
//!
//! let chat = Arc::new(MockChatClient::new());
//! let generator = Arc::new(MockImageGenerator::new());
//! let storage = Arc::new(MockObjectStore::new());
//!
//! generator.set_latency(Duration::from_millis(50)).await;
//! storage.fail_put("abc_1.png", StorageError::Http("reset".into())).await;
//! ```

mod mock_chat;
mod mock_credentials;
mod mock_generator;
mod mock_queue;
mod mock_storage;

pub use mock_chat::{MockChatClient, RecordedEdit, RecordedPost};
pub use mock_credentials::MockCredentialStore;
pub use mock_generator::{MockImageGenerator, RecordedGeneration};
pub use mock_queue::MockQueue;
pub use mock_storage::MockObjectStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::{
        ChatConfig, Config, CredentialsConfig, GenerationConfig, ProjectConfig, QueueConfig,
        ServerConfig, StorageBackend, StorageConfig, WorkerConfig,
    };
    use crate::intake::CommandRequest;
    use crate::job::{parse_prompt, JobDescriptor};

    pub const SIGNING_SECRET: &str = "test-signing-secret";
    pub const REQUESTER_ID: &str = "U42";
    pub const CONVERSATION_ID: &str = "C123";
    pub const RESPONSE_URL: &str = "https://hooks.slack.test/commands/T1/1/abc";

    pub fn chat_config() -> ChatConfig {
        ChatConfig {
            api_url: "https://slack.com/api".to_string(),
            authorize_url: "https://slack.com/oauth/v2/authorize".to_string(),
            client_id: "123.456".to_string(),
            client_secret: "client-secret".to_string(),
            signing_secret: SIGNING_SECRET.to_string(),
            echo_command: true,
        }
    }

    /// A valid config using the in-memory queue and filesystem storage under `root`.
    pub fn config(root: &Path) -> Config {
        Config {
            project: ProjectConfig {
                id: "test-project".to_string(),
            },
            chat: chat_config(),
            storage: StorageConfig {
                backend: StorageBackend::Filesystem,
                bucket: "images".to_string(),
                api_url: "https://storage.googleapis.com".to_string(),
                public_host: "localhost".to_string(),
                access_token: None,
                root: root.join("objects"),
            },
            generation: GenerationConfig {
                api_host: "https://api.stability.ai".to_string(),
                api_key: "sk-test".to_string(),
                engine: "stable-diffusion-512-v2-0".to_string(),
                width: 512,
                height: 512,
                cfg_scale: 7.0,
                steps: 50,
                clip_guidance_preset: "FAST_BLUE".to_string(),
            },
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            credentials: CredentialsConfig {
                path: root.join("credentials.db"),
            },
            worker: WorkerConfig::default(),
        }
    }

    /// A `/diffusion` command from [`REQUESTER_ID`] in [`CONVERSATION_ID`].
    pub fn command_request(text: &str) -> CommandRequest {
        CommandRequest {
            command: "/diffusion".to_string(),
            text: text.to_string(),
            conversation_id: CONVERSATION_ID.to_string(),
            requester_id: REQUESTER_ID.to_string(),
            response_url: RESPONSE_URL.to_string(),
        }
    }

    /// A job as intake would have queued it.
    pub fn job(text: &str) -> JobDescriptor {
        JobDescriptor::new(
            parse_prompt(text),
            CONVERSATION_ID,
            "1700000000.000001",
            REQUESTER_ID,
        )
    }
}
