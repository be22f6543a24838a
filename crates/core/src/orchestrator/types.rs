//! Types for the deployment orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::bus::BusError;
use crate::models::{AssetStatus, DeploymentResult, Platform};

/// Errors that abort processing of an approval event.
///
/// Platform failures are not errors at this level; they become `failed`
/// results and the event still completes.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Shutdown interrupted the deployment.
    #[error("deployment of asset {asset_id} cancelled during {platform}")]
    Cancelled { asset_id: Uuid, platform: Platform },

    /// The aggregate event was not accepted by the bus.
    #[error("failed to publish {event_type}: {source}")]
    Publish {
        event_type: &'static str,
        #[source]
        source: BusError,
    },

    /// An outbound event could not be serialised.
    #[error("failed to encode {event_type}: {source}")]
    Encode {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl OrchestratorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Outcome of one approval event across all its platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub asset_id: Uuid,
    /// Status published in the aggregate event.
    pub final_status: AssetStatus,
    /// One result per distinct requested platform, in request order.
    pub results: Vec<DeploymentResult>,
    pub successful: usize,
    pub failed: usize,
}

impl DeploymentSummary {
    pub fn new(asset_id: Uuid, results: Vec<DeploymentResult>) -> Self {
        let successful = results.iter().filter(|r| r.is_success()).count();
        let failed = results.iter().filter(|r| r.is_failed()).count();
        Self {
            asset_id,
            final_status: super::aggregate::aggregate_status(&results),
            results,
            successful,
            failed,
        }
    }

    pub fn result_for(&self, platform: &Platform) -> Option<&DeploymentResult> {
        self.results.iter().find(|r| &r.platform == platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let asset_id = Uuid::new_v4();
        let summary = DeploymentSummary::new(
            asset_id,
            vec![
                DeploymentResult::success(asset_id, Platform::GoogleAds),
                DeploymentResult::failed(asset_id, Platform::Meta, "quota"),
            ],
        );

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.final_status, AssetStatus::Failed);
        assert_eq!(
            summary.result_for(&Platform::Meta).unwrap().error.as_deref(),
            Some("quota")
        );
    }

    #[test]
    fn test_cancelled_error_display() {
        let err = OrchestratorError::Cancelled {
            asset_id: Uuid::nil(),
            platform: Platform::Meta,
        };
        assert!(err.is_cancelled());
        assert_eq!(
            err.to_string(),
            "deployment of asset 00000000-0000-0000-0000-000000000000 cancelled during meta"
        );
    }
}
