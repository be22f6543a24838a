use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "CONNECTORS_CONFIG";

/// Config file read when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "connectors.toml";

const ENV_PREFIX: &str = "CONNECTORS_";

/// Map a flat variable from the previous deployment layout to its config key.
pub fn legacy_key(name: &str) -> Option<&'static str> {
    let key = match name.to_ascii_uppercase().as_str() {
        "PORT" => "server.port",
        "LOG_LEVEL" => "logging.level",
        "ENVIRONMENT" => "environment",
        "NATS_URL" => "bus.url",
        "NATS_SUBJECT_PREFIX" => "bus.subject_prefix",
        "NATS_QUEUE_GROUP" => "bus.queue_group",
        "MAX_RETRY_ATTEMPTS" => "deployment.max_retry_attempts",
        "RETRY_DELAY_SECONDS" => "deployment.retry_delay_secs",
        "DEPLOYMENT_TIMEOUT_SECONDS" => "deployment.timeout_secs",
        _ => return None,
    };
    Some(key)
}

/// Layered sources: defaults, then the TOML file, then `CONNECTORS_*`, then
/// legacy flat variables.
fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["CONFIG"])
                .split("__"),
        )
        .merge(Env::raw().filter_map(|name| legacy_key(name.as_str()).map(Into::into)))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment(Some(path))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration the way the service does at startup.
///
/// An explicit `CONNECTORS_CONFIG` must exist; the default file is optional.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => load_config(&PathBuf::from(path)),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            figment(path.exists().then_some(path))
                .extract()
                .map_err(|e| ConfigError::ParseError(e.to_string()))
        }
    }
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[server]
port = 9000

[bus]
backend = "memory"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.bus.backend, BusBackend::Memory);
    }

    #[test]
    fn test_load_config_from_str_bad_backend() {
        let toml = r#"
[bus]
backend = "kafka"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/connectors.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[server]
host = "127.0.0.1"

[bus]
subject_prefix = "staging"

[[platforms]]
platform = "meta"
endpoint = "http://meta-client/deploy"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.bus.subject_prefix, "staging");
        assert_eq!(config.platforms.len(), 1);
        // Untouched sections keep their defaults
        assert_eq!(config.consumer.max_in_flight, 4);
    }

    #[test]
    fn test_prefixed_env_overrides_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[deployment]
retry_delay_secs = 10
"#
        )
        .unwrap();

        std::env::set_var("CONNECTORS_DEPLOYMENT__RETRY_DELAY_SECS", "1");
        let config = load_config(temp_file.path());
        std::env::remove_var("CONNECTORS_DEPLOYMENT__RETRY_DELAY_SECS");

        assert_eq!(config.unwrap().deployment.retry_delay_secs, 1);
    }

    #[test]
    fn test_legacy_key_mapping() {
        assert_eq!(legacy_key("PORT"), Some("server.port"));
        assert_eq!(legacy_key("nats_url"), Some("bus.url"));
        assert_eq!(
            legacy_key("DEPLOYMENT_TIMEOUT_SECONDS"),
            Some("deployment.timeout_secs")
        );
        assert_eq!(legacy_key("HOME"), None);
    }
}
