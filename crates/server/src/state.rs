use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use zamc_connectors_core::{Config, DeploymentOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<DeploymentOrchestrator>,
    ready: AtomicBool,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<DeploymentOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
            ready: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    pub fn orchestrator(&self) -> &DeploymentOrchestrator {
        self.orchestrator.as_ref()
    }

    /// Whether the approval listener is consuming.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
