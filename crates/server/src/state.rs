use std::sync::Arc;

use diffusion_core::{
    registry::ClientReadiness, ClientRegistry, Config, CredentialStore, IntakeService,
    PipelineWorker, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: ClientRegistry,
    credentials: Arc<dyn CredentialStore>,
    intake: IntakeService,
    worker: Option<Arc<PipelineWorker>>,
}

impl AppState {
    pub fn new(
        config: Config,
        registry: ClientRegistry,
        credentials: Arc<dyn CredentialStore>,
        worker: Option<Arc<PipelineWorker>>,
    ) -> Self {
        let intake = IntakeService::new(registry.clone(), Arc::clone(&credentials), &config.chat);
        Self {
            config,
            registry,
            credentials,
            intake,
            worker,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Secret used to verify inbound command signatures.
    pub fn signing_secret(&self) -> &str {
        &self.config.chat.signing_secret
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn readiness(&self) -> ClientReadiness {
        self.registry.readiness()
    }

    pub fn credentials(&self) -> &dyn CredentialStore {
        self.credentials.as_ref()
    }

    pub fn intake(&self) -> &IntakeService {
        &self.intake
    }

    pub fn worker(&self) -> Option<&Arc<PipelineWorker>> {
        self.worker.as_ref()
    }
}
