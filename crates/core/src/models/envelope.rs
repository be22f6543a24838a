//! Typed envelope for everything this service puts on, or takes off, the bus.

use serde::{Deserialize, Serialize};

use super::asset::AssetStatusChangedEvent;
use super::deployment::DeploymentStatusChangedEvent;

/// A bus message, discriminated by its `event_type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum BusMessage {
    /// An asset changed status upstream; `approved` triggers deployment.
    #[serde(rename = "asset.status_changed")]
    AssetStatusChanged(AssetStatusChangedEvent),

    /// Progress of one platform deployment.
    #[serde(rename = "asset.deployment_status_changed")]
    DeploymentStatusChanged(DeploymentStatusChangedEvent),

    /// Aggregate outcome of all platform deployments for one approval.
    #[serde(rename = "asset.deployment_completed")]
    DeploymentCompleted(AssetStatusChangedEvent),
}

impl BusMessage {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AssetStatusChanged(_) => "asset.status_changed",
            Self::DeploymentStatusChanged(_) => "asset.deployment_status_changed",
            Self::DeploymentCompleted(_) => "asset.deployment_completed",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
