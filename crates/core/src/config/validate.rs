use std::collections::HashSet;

use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Retry attempts, timeout and consumer concurrency are positive
/// - Subject prefix and queue group are not empty
/// - Platform entries are unique and have an endpoint
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    if config.bus.subject_prefix.trim().is_empty() {
        return invalid("bus.subject_prefix cannot be empty");
    }
    if config.bus.queue_group.trim().is_empty() {
        return invalid("bus.queue_group cannot be empty");
    }
    if config.bus.max_deliveries == 0 {
        return invalid("bus.max_deliveries cannot be 0");
    }

    if config.deployment.max_retry_attempts == 0 {
        return invalid("deployment.max_retry_attempts cannot be 0");
    }
    if config.deployment.timeout_secs == 0 {
        return invalid("deployment.timeout_secs cannot be 0");
    }

    if config.consumer.max_in_flight == 0 {
        return invalid("consumer.max_in_flight cannot be 0");
    }

    let mut seen = HashSet::new();
    for entry in &config.platforms {
        if !seen.insert(&entry.platform) {
            return invalid(format!("platform '{}' configured twice", entry.platform));
        }
        if entry.endpoint.trim().is_empty() {
            return invalid(format!("platform '{}' has an empty endpoint", entry.platform));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlatformConfig;
    use crate::models::Platform;

    fn platform(platform: Platform, endpoint: &str) -> PlatformConfig {
        PlatformConfig {
            platform,
            endpoint: endpoint.to_string(),
            api_key: None,
            health_url: None,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = Config::default();
        config.deployment.max_retry_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_in_flight_fails() {
        let mut config = Config::default();
        config.consumer.max_in_flight = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_queue_group_fails() {
        let mut config = Config::default();
        config.bus.queue_group = " ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_platform_fails() {
        let mut config = Config::default();
        config.platforms = vec![
            platform(Platform::Meta, "http://a/deploy"),
            platform(Platform::Meta, "http://b/deploy"),
        ];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_validate_empty_endpoint_fails() {
        let mut config = Config::default();
        config.platforms = vec![platform(Platform::GoogleAds, "")];
        assert!(validate_config(&config).is_err());
    }
}
