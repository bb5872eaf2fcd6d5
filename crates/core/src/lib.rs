pub mod chat;
pub mod config;
pub mod credentials;
pub mod delivery;
pub mod generation;
pub mod intake;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod status;
pub mod storage;
pub mod testing;
pub mod worker;

pub use chat::{ChatClient, ChatError, MessageBlock, SlackClient};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, QueueBackend,
    SanitizedConfig, StorageBackend,
};
pub use credentials::{
    AccessToken, AuthorizedUser, CredentialError, CredentialStore, SqliteCredentialStore,
};
pub use delivery::{DeliveryError, DeliveryReport, DeliveryWorker};
pub use generation::{GenerationError, GenerationRequest, ImageGenerator, StabilityGenerator};
pub use intake::{CommandRequest, IntakeError, IntakeOutcome, IntakeService, JobReceipt};
pub use job::{parse_prompt, CorrelationId, GeneratedArtifact, JobDescriptor, ParsedPrompt};
pub use queue::{InMemoryQueue, JobQueue, PubSubQueue, QueueError, ReceivedMessage};
pub use registry::{ClientReadiness, ClientRegistry, FatalError, FatalSignal, RegistryError};
pub use status::{JobStatus, StatusMessage};
pub use storage::{FsObjectStore, GcsObjectStore, ObjectStore, StorageError};
pub use worker::{PipelineWorker, WorkerSettings, WorkerStatus};
