//! Platform lookup table.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::error::PlatformError;
use super::traits::AdPlatform;
use super::webhook::WebhookPlatform;
use crate::config::PlatformConfig;
use crate::models::Platform;

/// Maps each [`Platform`] to the implementation that serves it.
///
/// Built once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    platforms: BTreeMap<Platform, Arc<dyn AdPlatform>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build webhook-backed platforms from configuration.
    pub fn from_config(configs: &[PlatformConfig]) -> Result<Self, PlatformError> {
        let mut registry = Self::new();
        for config in configs {
            let platform = WebhookPlatform::new(
                config.platform.clone(),
                &config.endpoint,
                config.api_key.clone(),
                config.health_url.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )?;
            info!(platform = %config.platform, endpoint = %config.endpoint, "Registered platform");
            registry.register(Arc::new(platform));
        }
        Ok(registry)
    }

    /// Register an implementation, replacing any previous one for its platform.
    pub fn register(&mut self, platform: Arc<dyn AdPlatform>) {
        self.platforms.insert(platform.platform(), platform);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, platform: Arc<dyn AdPlatform>) -> Self {
        self.register(platform);
        self
    }

    pub fn get(&self, platform: &Platform) -> Option<Arc<dyn AdPlatform>> {
        self.platforms.get(platform).cloned()
    }

    /// Registered platforms, in stable order.
    pub fn platforms(&self) -> Vec<Platform> {
        self.platforms.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Health of every registered platform.
    pub async fn health_check_all(&self) -> Vec<(Platform, Result<(), PlatformError>)> {
        let checks = self.platforms.iter().map(|(platform, implementation)| {
            let platform = platform.clone();
            let implementation = Arc::clone(implementation);
            async move { (platform, implementation.health_check().await) }
        });
        futures::future::join_all(checks).await
    }
}
