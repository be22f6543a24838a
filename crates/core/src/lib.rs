pub mod bus;
pub mod config;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod testing;

pub use bus::{
    BusError, Delivery, Disposition, EventBus, MemoryBus, NatsBus, Subjects, Subscription,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, BusBackend,
    BusConfig, Config, ConfigError, LoggingConfig, PlatformConfig, SanitizedConfig,
};
pub use metrics::OrchestratorMetrics;
pub use models::{
    AssetStatus, AssetStatusChangedEvent, BusMessage, ContentType, DeploymentRequest,
    DeploymentResult, DeploymentStatus, DeploymentStatusChangedEvent, Metadata, Platform,
};
pub use orchestrator::{
    aggregate_status, ApprovalListener, ConsumerConfig, DeploymentConfig,
    DeploymentOrchestrator, DeploymentStatsSnapshot, DeploymentSummary, OrchestratorError,
    HEALTHY,
};
pub use platform::{AdPlatform, PlatformError, PlatformRegistry, WebhookPlatform};
