use super::{types::Config, ConfigError, TransportBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Poll interval and lease timeout are positive
/// - Broker settings are usable when the broker backend is selected
/// - The validator pattern compiles
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Processor validation
    if config.processor.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "processor.poll_interval_ms must be greater than 0".to_string(),
        ));
    }
    if config.processor.lease_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "processor.lease_timeout_secs must be greater than 0".to_string(),
        ));
    }

    // Broker validation only matters when it is the active backend
    if config.processor.backend == TransportBackend::Broker {
        let broker = &config.broker;
        if broker.bootstrap_servers.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "broker.bootstrap_servers must list at least one endpoint".to_string(),
            ));
        }
        if broker.topic.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "broker.topic cannot be empty".to_string(),
            ));
        }
        if broker.group_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "broker.group_id cannot be empty".to_string(),
            ));
        }
    }

    // Validator validation
    if let Some(pattern) = config.validator.required_pattern.as_deref() {
        if let Err(e) = regex_lite::Regex::new(pattern) {
            return Err(ConfigError::ValidationError(format!(
                "validator.required_pattern is not a valid regex: {}",
                e
            )));
        }
    }

    Ok(())
}
