use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Both concurrency ceilings are at least 1
/// - The batch size limit is at least 1
/// - Resource thresholds are non-negative numbers
/// - Backend URL and model are set when the backend section is present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let orchestrator = &config.orchestrator;

    if orchestrator.max_concurrent_items == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_items must be at least 1".to_string(),
        ));
    }

    if orchestrator.max_backend_calls == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_backend_calls must be at least 1".to_string(),
        ));
    }

    if orchestrator.max_items == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_items must be at least 1".to_string(),
        ));
    }

    let threshold = orchestrator.resources.low_memory_threshold_gb;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "orchestrator.resources.low_memory_threshold_gb must be a non-negative number, got {}",
            threshold
        )));
    }

    // Backend validation
    if let Some(ref backend) = config.backend {
        if backend.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.url cannot be empty".to_string(),
            ));
        }
        if backend.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.model cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
