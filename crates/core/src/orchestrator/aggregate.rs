//! Asset status derived from per-platform results.

use crate::models::{AssetStatus, DeploymentResult};

/// `Failed` if any platform failed, `Deployed` otherwise.
///
/// An empty result set counts as deployed: nothing was requested, so
/// nothing failed.
pub fn aggregate_status(results: &[DeploymentResult]) -> AssetStatus {
    if results.iter().any(|r| r.is_failed()) {
        AssetStatus::Failed
    } else {
        AssetStatus::Deployed
    }
}
