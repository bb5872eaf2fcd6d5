use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diffusion_core::{
    load_config, validate_config, ChatClient, ClientRegistry, Config, CredentialStore,
    FsObjectStore, GcsObjectStore, ImageGenerator, InMemoryQueue, JobQueue, ObjectStore,
    PipelineWorker, PubSubQueue, QueueBackend, QueueError, SlackClient, SqliteCredentialStore,
    StabilityGenerator, StorageBackend, WorkerSettings,
};
use diffusion_server::api::create_router;
use diffusion_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DIFFUSION_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        queue = ?config.queue.backend,
        storage = ?config.storage.backend,
        "Configuration loaded successfully"
    );

    // Create SQLite credential store
    let credentials: Arc<dyn CredentialStore> = Arc::new(
        SqliteCredentialStore::new(&config.credentials.path)
            .context("Failed to create credential store")?,
    );
    info!("Credential store initialized at {:?}", config.credentials.path);

    // Start constructing the external clients
    let (registry, mut fatal) = ClientRegistry::new();
    initialize_clients(&registry, &config).context("Failed to start client construction")?;

    let generator: Arc<dyn ImageGenerator> = Arc::new(
        StabilityGenerator::new(&config.generation)
            .context("Failed to create generation client")?,
    );
    info!(engine = %config.generation.engine, "Generation backend configured");

    // Start the worker
    let worker = if config.worker.enabled {
        let worker = Arc::new(PipelineWorker::new(
            WorkerSettings::from_config(&config),
            registry.clone(),
            Arc::clone(&credentials),
            generator,
        ));
        worker.start();
        Some(worker)
    } else {
        if config.queue.backend == QueueBackend::Memory {
            warn!("Worker disabled with the in-memory queue; queued jobs will not be processed");
        } else {
            info!("Worker disabled in config");
        }
        None
    };

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        registry,
        credentials,
        worker.clone(),
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    };

    // A client that fails to construct takes the process down
    let outcome = tokio::select! {
        result = server => result.context("Server error"),
        Some(failure) = fatal.recv() => Err(anyhow::anyhow!("{}", failure)),
    };

    if let Some(worker) = &worker {
        info!("Stopping worker...");
        worker.stop();
    }
    info!("Server shutting down...");

    outcome
}

/// Spawn the single construction attempt of each external client.
fn initialize_clients(registry: &ClientRegistry, config: &Config) -> Result<()> {
    let queue_config = config.queue.clone();
    let project_id = config.project.id.clone();
    registry.queue().initialize(async move {
        let queue: Arc<dyn JobQueue> = match queue_config.backend {
            QueueBackend::Memory => Arc::new(InMemoryQueue::new()),
            QueueBackend::Pubsub => {
                Arc::new(PubSubQueue::connect(&queue_config, &project_id).await?)
            }
        };
        Ok::<_, QueueError>(queue)
    })?;

    let storage_config = config.storage.clone();
    registry.storage().initialize(async move {
        let store: Arc<dyn ObjectStore> = match storage_config.backend {
            StorageBackend::Gcs => Arc::new(GcsObjectStore::connect(&storage_config).await?),
            StorageBackend::Filesystem => Arc::new(
                FsObjectStore::connect(
                    &storage_config.root,
                    &storage_config.bucket,
                    &storage_config.public_host,
                )
                .await?,
            ),
        };
        Ok::<_, diffusion_core::StorageError>(store)
    })?;

    let chat_config = config.chat.clone();
    registry.chat().initialize(async move {
        let chat: Arc<dyn ChatClient> = Arc::new(SlackClient::connect(&chat_config).await?);
        Ok::<_, diffusion_core::ChatError>(chat)
    })?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
