//! Mock ad platform for testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::{DeploymentRequest, DeploymentResult, Platform};
use crate::platform::{AdPlatform, PlatformError};

/// A recorded deployment attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The request that was submitted.
    pub request: DeploymentRequest,
    /// When the attempt started (tokio clock, so virtual under paused time).
    pub at: Instant,
    /// Whether the attempt succeeded.
    pub success: bool,
}

/// Mock implementation of the AdPlatform trait.
///
/// Provides controllable behavior for testing:
/// - Script the next outcomes (errors are consumed in order)
/// - Fail every attempt
/// - Simulate slow platforms
/// - Track attempts with timestamps
///
/// # Example
///
/// ```rust,ignore
/// use zamc_connectors_core::testing::MockPlatform;
///
/// let meta = MockPlatform::new(Platform::Meta);
/// meta.fail_next(2, PlatformError::Transient("503".into())).await;
///
/// // Third attempt succeeds
/// let calls = meta.recorded_calls().await;
/// ```
#[derive(Debug)]
pub struct MockPlatform {
    platform: Platform,
    /// Recorded attempts.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Errors returned by upcoming attempts, in order.
    scripted_errors: Arc<RwLock<VecDeque<PlatformError>>>,
    /// If set, every attempt fails with this error once the script is empty.
    always_fail: Arc<RwLock<Option<PlatformError>>>,
    /// Simulated latency per attempt.
    delay: Arc<RwLock<Duration>>,
    /// Result of health checks.
    healthy: Arc<RwLock<bool>>,
}

impl MockPlatform {
    /// Create a mock that succeeds immediately.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            calls: Arc::new(RwLock::new(Vec::new())),
            scripted_errors: Arc::new(RwLock::new(VecDeque::new())),
            always_fail: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            healthy: Arc::new(RwLock::new(true)),
        }
    }

    /// Get all recorded attempts.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Get the number of attempts made.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Make the next `count` attempts fail with `error`.
    pub async fn fail_next(&self, count: usize, error: PlatformError) {
        let mut scripted = self.scripted_errors.write().await;
        for _ in 0..count {
            scripted.push_back(error.clone());
        }
    }

    /// Make every attempt fail with `error`, or clear with `None`.
    pub async fn set_always_fail(&self, error: Option<PlatformError>) {
        *self.always_fail.write().await = error;
    }

    /// Set the simulated duration of each attempt.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Set the health check outcome.
    pub async fn set_healthy(&self, healthy: bool) {
        *self.healthy.write().await = healthy;
    }
}

#[async_trait]
impl AdPlatform for MockPlatform {
    fn platform(&self) -> Platform {
        self.platform.clone()
    }

    async fn deploy_asset(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, PlatformError> {
        let at = Instant::now();

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted_errors.write().await.pop_front();
        let error = match scripted {
            Some(error) => Some(error),
            None => self.always_fail.read().await.clone(),
        };

        self.calls.write().await.push(RecordedCall {
            request: request.clone(),
            at,
            success: error.is_none(),
        });

        match error {
            Some(error) => Err(error),
            None => Ok(DeploymentResult::success(request.asset_id, self.platform.clone())
                .with_platform_id(format!("{}_{}", self.platform, request.asset_id.simple()))
                .with_platform_url(format!(
                    "https://ads.example.com/{}/{}",
                    self.platform, request.asset_id
                ))),
        }
    }

    async fn health_check(&self) -> Result<(), PlatformError> {
        if *self.healthy.read().await {
            Ok(())
        } else {
            Err(PlatformError::Unavailable(format!(
                "{} mock marked unhealthy",
                self.platform
            )))
        }
    }
}
