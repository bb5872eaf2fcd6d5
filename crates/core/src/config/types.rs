use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub project: ProjectConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Cloud project identity shared by the queue and storage backends.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub id: String,
}

/// Chat platform (Slack) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Web API base URL
    #[serde(default = "default_chat_api_url")]
    pub api_url: String,
    /// OAuth authorize page the "please authorize" reply links to
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Secret used to verify inbound request signatures
    pub signing_secret: String,
    /// Echo the requester's command into the conversation before queueing
    #[serde(default = "default_true")]
    pub echo_command: bool,
}

fn default_chat_api_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_authorize_url() -> String {
    "https://slack.com/oauth/v2/authorize".to_string()
}

fn default_true() -> bool {
    true
}

/// Available queue backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// In-process queue, intake and worker must share the process
    #[default]
    Memory,
    /// Google Cloud Pub/Sub over REST
    Pubsub,
}

/// Job queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: QueueBackend,
    /// Pub/Sub REST endpoint (point at the emulator for local runs)
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subscription: String,
    /// Bearer token for the Pub/Sub API (None when talking to the emulator)
    #[serde(default)]
    pub access_token: Option<String>,
    /// Messages requested per pull
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Capacity of the hand-off channel between the receive loop and the dispatcher
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,
}

fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_max_messages() -> usize {
    10
}

fn default_handoff_capacity() -> usize {
    16
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            endpoint: default_pubsub_endpoint(),
            topic: String::new(),
            subscription: String::new(),
            access_token: None,
            max_messages: default_max_messages(),
            handoff_capacity: default_handoff_capacity(),
        }
    }
}

/// Available object store backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Gcs,
    Filesystem,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub bucket: String,
    /// JSON API base URL
    #[serde(default = "default_storage_api_url")]
    pub api_url: String,
    /// Host used to build public object URLs
    #[serde(default = "default_public_host")]
    pub public_host: String,
    #[serde(default)]
    pub access_token: Option<String>,
    /// Root directory for the filesystem backend
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_storage_api_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_public_host() -> String {
    "storage.googleapis.com".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("objects")
}

/// Image generation backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    pub api_key: String,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_clip_guidance")]
    pub clip_guidance_preset: String,
}

fn default_api_host() -> String {
    "https://api.stability.ai".to_string()
}

fn default_engine() -> String {
    "stable-diffusion-512-v2-0".to_string()
}

fn default_dimension() -> u32 {
    512
}

fn default_cfg_scale() -> f32 {
    7.0
}

fn default_steps() -> u32 {
    50
}

fn default_clip_guidance() -> String {
    "FAST_BLUE".to_string()
}

/// Credential store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("diffusion.db")
}

/// Background worker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Run the receive loop and dispatcher in this process
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before retrying a failed pull (milliseconds)
    #[serde(default = "default_pull_retry")]
    pub pull_retry_ms: u64,
}

fn default_pull_retry() -> u64 {
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pull_retry_ms: default_pull_retry(),
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub project_id: String,
    pub server: ServerConfig,
    pub chat: SanitizedChatConfig,
    pub queue: SanitizedQueueConfig,
    pub storage: SanitizedStorageConfig,
    pub generation: SanitizedGenerationConfig,
    pub worker_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedChatConfig {
    pub api_url: String,
    pub client_id: String,
    pub client_secret_configured: bool,
    pub signing_secret_configured: bool,
    pub echo_command: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQueueConfig {
    pub backend: QueueBackend,
    pub topic: String,
    pub subscription: String,
    pub access_token_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub public_host: String,
    pub access_token_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGenerationConfig {
    pub api_host: String,
    pub engine: String,
    pub width: u32,
    pub height: u32,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            project_id: config.project.id.clone(),
            server: config.server.clone(),
            chat: SanitizedChatConfig {
                api_url: config.chat.api_url.clone(),
                client_id: config.chat.client_id.clone(),
                client_secret_configured: !config.chat.client_secret.is_empty(),
                signing_secret_configured: !config.chat.signing_secret.is_empty(),
                echo_command: config.chat.echo_command,
            },
            queue: SanitizedQueueConfig {
                backend: config.queue.backend,
                topic: config.queue.topic.clone(),
                subscription: config.queue.subscription.clone(),
                access_token_configured: config.queue.access_token.is_some(),
            },
            storage: SanitizedStorageConfig {
                backend: config.storage.backend,
                bucket: config.storage.bucket.clone(),
                public_host: config.storage.public_host.clone(),
                access_token_configured: config.storage.access_token.is_some(),
            },
            generation: SanitizedGenerationConfig {
                api_host: config.generation.api_host.clone(),
                engine: config.generation.engine.clone(),
                width: config.generation.width,
                height: config.generation.height,
                api_key_configured: !config.generation.api_key.is_empty(),
            },
            worker_enabled: config.worker.enabled,
        }
    }
}
