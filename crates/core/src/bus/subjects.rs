//! Subject names used by this service.

use serde::Serialize;

use crate::config::BusConfig;

/// The three subjects the service touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subjects {
    /// Inbound asset status changes.
    pub approvals: String,
    /// Outbound per-platform deployment progress.
    pub deployment_status: String,
    /// Outbound aggregate deployment outcome.
    pub deployment_completed: String,
}

impl Subjects {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            approvals: format!("{prefix}.events.asset.status_changed"),
            deployment_status: format!("{prefix}.events.asset.deployment_status_changed"),
            deployment_completed: format!("{prefix}.events.asset.deployment_completed"),
        }
    }

    /// Prefix-derived subjects with any per-subject overrides applied.
    pub fn from_config(config: &BusConfig) -> Self {
        let defaults = Self::with_prefix(&config.subject_prefix);
        Self {
            approvals: config
                .approvals_subject
                .clone()
                .unwrap_or(defaults.approvals),
            deployment_status: config
                .status_subject
                .clone()
                .unwrap_or(defaults.deployment_status),
            deployment_completed: config
                .completed_subject
                .clone()
                .unwrap_or(defaults.deployment_completed),
        }
    }
}

impl Default for Subjects {
    fn default() -> Self {
        Self::with_prefix("zamc")
    }
}
