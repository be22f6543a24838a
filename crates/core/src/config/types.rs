use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::bus::DEFAULT_MAX_DELIVERIES;
use crate::models::Platform;
pub use crate::orchestrator::{ConsumerConfig, DeploymentConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Deployment environment name (e.g. "development", "production")
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub deployment: DeploymentConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    /// Registered ad platforms
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            environment: default_environment(),
            bus: BusConfig::default(),
            deployment: DeploymentConfig::default(),
            consumer: ConsumerConfig::default(),
            platforms: Vec::new(),
        }
    }
}

fn default_environment() -> String {
    "development".to_string()
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
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8002
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive; RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Available bus backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusBackend {
    #[default]
    Nats,
    /// In-process bus, for local runs without a broker
    Memory,
}

impl BusBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nats => "nats",
            Self::Memory => "memory",
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default)]
    pub backend: BusBackend,
    /// Broker URL (nats backend only)
    #[serde(default = "default_bus_url")]
    pub url: String,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "default_queue_group")]
    pub queue_group: String,
    /// Override for the inbound approval subject
    #[serde(default)]
    pub approvals_subject: Option<String>,
    /// Override for the per-platform status subject
    #[serde(default)]
    pub status_subject: Option<String>,
    /// Override for the aggregate completion subject
    #[serde(default)]
    pub completed_subject: Option<String>,
    /// Deliveries before a nacked message is dead-lettered (memory backend)
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::default(),
            url: default_bus_url(),
            subject_prefix: default_subject_prefix(),
            queue_group: default_queue_group(),
            approvals_subject: None,
            status_subject: None,
            completed_subject: None,
            max_deliveries: default_max_deliveries(),
        }
    }
}

fn default_bus_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_subject_prefix() -> String {
    "zamc".to_string()
}

fn default_queue_group() -> String {
    "connectors".to_string()
}

fn default_max_deliveries() -> u32 {
    DEFAULT_MAX_DELIVERIES
}

/// One ad platform reachable through a platform-client endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    pub platform: Platform,
    /// Deployment endpoint (receives the deployment request as JSON)
    pub endpoint: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Health endpoint; health is assumed when absent
    #[serde(default)]
    pub health_url: Option<String>,
    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub environment: String,
    pub bus: SanitizedBusConfig,
    pub deployment: DeploymentConfig,
    pub consumer: ConsumerConfig,
    pub platforms: Vec<SanitizedPlatformConfig>,
}

/// Bus config with credentials stripped from the URL
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBusConfig {
    pub backend: String,
    pub url: String,
    pub subject_prefix: String,
    pub queue_group: String,
}

/// Platform config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPlatformConfig {
    pub platform: String,
    pub endpoint: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,
    pub request_timeout_secs: u64,
}

/// Drop `user:pass@` from a URL.
fn redact_userinfo(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***@{}", &url[..scheme_end + 3], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            logging: config.logging.clone(),
            environment: config.environment.clone(),
            bus: SanitizedBusConfig {
                backend: config.bus.backend.as_str().to_string(),
                url: redact_userinfo(&config.bus.url),
                subject_prefix: config.bus.subject_prefix.clone(),
                queue_group: config.bus.queue_group.clone(),
            },
            deployment: config.deployment.clone(),
            consumer: config.consumer.clone(),
            platforms: config
                .platforms
                .iter()
                .map(|p| SanitizedPlatformConfig {
                    platform: p.platform.to_string(),
                    endpoint: p.endpoint.clone(),
                    api_key_configured: p.api_key.as_ref().is_some_and(|k| !k.is_empty()),
                    health_url: p.health_url.clone(),
                    request_timeout_secs: p.request_timeout_secs,
                })
                .collect(),
        }
    }
}
