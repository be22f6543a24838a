//! Trait definitions for the platform module.

use async_trait::async_trait;

use super::error::PlatformError;
use crate::models::{DeploymentRequest, DeploymentResult, Platform};

/// An advertising platform that assets can be deployed to.
///
/// Implementations are shared across concurrent deployments and must not
/// keep per-request state.
#[async_trait]
pub trait AdPlatform: Send + Sync {
    /// The platform this implementation serves.
    fn platform(&self) -> Platform;

    /// Deploys one asset. A single attempt; retries belong to the caller.
    async fn deploy_asset(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, PlatformError>;

    /// Checks that the platform is reachable.
    async fn health_check(&self) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoPlatform;

    #[async_trait]
    impl AdPlatform for EchoPlatform {
        fn platform(&self) -> Platform {
            Platform::Meta
        }

        async fn deploy_asset(
            &self,
            request: &DeploymentRequest,
        ) -> Result<DeploymentResult, PlatformError> {
            Ok(DeploymentResult::success(request.asset_id, self.platform())
                .with_platform_id(format!("echo_{}", request.asset_id)))
        }

        async fn health_check(&self) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let platform: Arc<dyn AdPlatform> = Arc::new(EchoPlatform);
        let request = crate::testing::fixtures::deployment_request(Platform::Meta);

        let result = platform.deploy_asset(&request).await.unwrap();
        assert!(result.is_success());
        assert_eq!(
            result.platform_id,
            Some(format!("echo_{}", request.asset_id))
        );
        assert!(platform.health_check().await.is_ok());
    }
}
