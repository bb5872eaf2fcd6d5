use super::{types::Config, ConfigError, QueueBackend};

/// Validate configuration
///
/// Every value the pipeline needs at request time must be present here; a
/// missing value stops the process at startup instead of failing requests.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    require("project.id", &config.project.id)?;
    require("chat.client_id", &config.chat.client_id)?;
    require("chat.client_secret", &config.chat.client_secret)?;
    require("chat.signing_secret", &config.chat.signing_secret)?;
    require("storage.bucket", &config.storage.bucket)?;
    require("generation.api_key", &config.generation.api_key)?;
    require("generation.api_host", &config.generation.api_host)?;

    if config.queue.backend == QueueBackend::Pubsub {
        require("queue.topic", &config.queue.topic)?;
        require("queue.subscription", &config.queue.subscription)?;
    }

    if config.queue.handoff_capacity == 0 {
        return Err(invalid("queue.handoff_capacity must be at least 1"));
    }
    if config.queue.max_messages == 0 {
        return Err(invalid("queue.max_messages must be at least 1"));
    }

    for (name, value) in [
        ("generation.width", config.generation.width),
        ("generation.height", config.generation.height),
    ] {
        if value == 0 || value % 64 != 0 {
            return Err(invalid(&format!(
                "{} must be a positive multiple of 64, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

fn require(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(&format!("{} is required", name)));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
