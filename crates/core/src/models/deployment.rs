//! Deployment request/result types and the per-platform status event.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::{AssetStatus, AssetStatusChangedEvent, ContentType, Metadata, Platform};

/// A request to deploy one asset to one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub asset_id: Uuid,
    pub project_id: Uuid,
    pub strategy_id: Uuid,
    pub platform: Platform,
    pub content_type: ContentType,
    pub title: String,
    pub content: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl DeploymentRequest {
    /// Build the request for `platform` from an approval event.
    pub fn for_platform(event: &AssetStatusChangedEvent, platform: Platform) -> Self {
        Self {
            asset_id: event.asset_id,
            project_id: event.project_id,
            strategy_id: event.strategy_id,
            platform,
            content_type: event.content_type,
            title: event.title.clone(),
            content: event.content.clone(),
            metadata: event.metadata.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Status of a single platform deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurements of one platform deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentMetrics {
    /// Wall time across all attempts, including retry waits.
    pub duration_ms: u64,
    /// Attempts consumed beyond the first.
    pub retry_count: u32,
    pub data_sent: u64,
    pub data_received: u64,
}

/// Outcome of one deployment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub asset_id: Uuid,
    pub platform: Platform,
    pub status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub deployed_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: DeploymentMetrics,
}

impl DeploymentResult {
    /// A successful result with no platform identifiers yet.
    pub fn success(asset_id: Uuid, platform: Platform) -> Self {
        Self {
            asset_id,
            platform,
            status: DeploymentStatus::Success,
            platform_id: None,
            platform_url: None,
            error: None,
            deployed_at: Utc::now(),
            metrics: DeploymentMetrics::default(),
        }
    }

    /// A failed result carrying `error`.
    pub fn failed(asset_id: Uuid, platform: Platform, error: impl Into<String>) -> Self {
        Self {
            status: DeploymentStatus::Failed,
            error: Some(error.into()),
            ..Self::success(asset_id, platform)
        }
    }

    /// A result for a deployment interrupted by shutdown.
    pub fn cancelled(asset_id: Uuid, platform: Platform) -> Self {
        Self {
            status: DeploymentStatus::Cancelled,
            error: Some("deployment cancelled".to_string()),
            ..Self::success(asset_id, platform)
        }
    }

    pub fn with_platform_id(mut self, id: impl Into<String>) -> Self {
        self.platform_id = Some(id.into());
        self
    }

    pub fn with_platform_url(mut self, url: impl Into<String>) -> Self {
        self.platform_url = Some(url.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == DeploymentStatus::Failed
    }
}

/// Per-platform deployment progress, published once per result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatusChangedEvent {
    pub asset_id: Uuid,
    pub project_id: Uuid,
    pub strategy_id: Uuid,
    pub platform: Platform,
    /// Asset status implied by this platform's result.
    pub status: AssetStatus,
    pub prev_status: AssetStatus,
    pub deployment_result: DeploymentResult,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentStatusChangedEvent {
    /// Build the status event for `result` relative to the triggering event.
    ///
    /// Success maps to `deployed` and failure to `failed`; any other result
    /// leaves the asset in its original status.
    pub fn from_result(origin: &AssetStatusChangedEvent, result: DeploymentResult) -> Self {
        let status = match result.status {
            DeploymentStatus::Success => AssetStatus::Deployed,
            DeploymentStatus::Failed => AssetStatus::Failed,
            _ => origin.status,
        };

        Self {
            asset_id: origin.asset_id,
            project_id: origin.project_id,
            strategy_id: origin.strategy_id,
            platform: result.platform.clone(),
            status,
            prev_status: origin.status,
            deployment_result: result,
            timestamp: Utc::now(),
        }
    }
}
