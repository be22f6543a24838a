//! Deployment orchestrator implementation.
//!
//! Turns one approval event into per-platform deployments:
//! - Platforms: sequential within an event, in request order
//! - Attempts: bounded retries, each under a fresh timeout
//! - Reporting: one status event per platform, then one aggregate event

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Subjects};
use crate::metrics::OrchestratorMetrics;
use crate::models::{
    AssetStatusChangedEvent, BusMessage, DeploymentRequest, DeploymentResult, DeploymentStatus,
    DeploymentStatusChangedEvent, Platform,
};
use crate::platform::{PlatformError, PlatformRegistry};

use super::config::DeploymentConfig;
use super::stats::{DeploymentStats, DeploymentStatsSnapshot, EventOutcome};
use super::types::{DeploymentSummary, OrchestratorError};

/// Health value reported for a working component.
pub const HEALTHY: &str = "healthy";

/// Deploys approved assets and reports the outcome on the bus.
pub struct DeploymentOrchestrator {
    config: DeploymentConfig,
    registry: PlatformRegistry,
    bus: Arc<dyn EventBus>,
    subjects: Subjects,
    stats: DeploymentStats,
    metrics: OrchestratorMetrics,
}

/// Drop repeated platforms, keeping first occurrences in order.
fn distinct_platforms(asset: &AssetStatusChangedEvent) -> Vec<Platform> {
    let mut seen = HashSet::new();
    let mut platforms = Vec::with_capacity(asset.metadata.platforms.len());
    for platform in &asset.metadata.platforms {
        if seen.insert(platform) {
            platforms.push(platform.clone());
        } else {
            warn!(
                asset_id = %asset.asset_id,
                platform = %platform,
                "Platform requested more than once, deploying once"
            );
        }
    }
    platforms
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl DeploymentOrchestrator {
    pub fn new(
        config: DeploymentConfig,
        registry: PlatformRegistry,
        bus: Arc<dyn EventBus>,
        subjects: Subjects,
        metrics: OrchestratorMetrics,
    ) -> Self {
        Self {
            config,
            registry,
            bus,
            subjects,
            stats: DeploymentStats::new(),
            metrics,
        }
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &OrchestratorMetrics {
        &self.metrics
    }

    pub fn stats(&self) -> DeploymentStatsSnapshot {
        self.stats.snapshot()
    }

    /// Count an inbound message by what became of it.
    pub fn record_event(&self, outcome: EventOutcome) {
        self.stats.record_event(outcome);
        self.metrics
            .events
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Deploy `event` to every platform it names.
    ///
    /// Returns `Ok(None)` for anything other than an approval. Platform
    /// failures do not make this fail; they show up in the summary and in
    /// the aggregate status. Errors mean the event should be redelivered.
    pub async fn handle_approval_event(
        &self,
        event: &AssetStatusChangedEvent,
        cancel: &CancellationToken,
    ) -> Result<Option<DeploymentSummary>, OrchestratorError> {
        if !event.is_approved() {
            debug!(
                asset_id = %event.asset_id,
                status = %event.status,
                "Ignoring non-approval status change"
            );
            return Ok(None);
        }

        let platforms = distinct_platforms(event);
        info!(
            asset_id = %event.asset_id,
            platforms = ?platforms.iter().map(Platform::as_str).collect::<Vec<_>>(),
            "Deploying approved asset"
        );

        let mut results = Vec::with_capacity(platforms.len());
        for platform in platforms {
            let request = DeploymentRequest::for_platform(event, platform.clone());
            let result = self.deploy_to_platform(&request, cancel).await;

            self.record_result(&result);
            self.publish_status(event, &result).await;

            if result.status == DeploymentStatus::Cancelled {
                warn!(
                    asset_id = %event.asset_id,
                    platform = %platform,
                    "Deployment cancelled, abandoning event"
                );
                return Err(OrchestratorError::Cancelled {
                    asset_id: event.asset_id,
                    platform,
                });
            }
            results.push(result);
        }

        let summary = DeploymentSummary::new(event.asset_id, results);
        let completed = BusMessage::DeploymentCompleted(event.transition_to(summary.final_status));
        if let Err(e) = self
            .publish(&self.subjects.deployment_completed, &completed)
            .await
        {
            self.record_publish_failure(completed.event_type());
            error!(
                asset_id = %event.asset_id,
                error = %e,
                "Failed to publish deployment outcome"
            );
            return Err(e);
        }

        info!(
            asset_id = %event.asset_id,
            final_status = %summary.final_status,
            successful = summary.successful,
            failed = summary.failed,
            "Asset deployment completed"
        );
        Ok(Some(summary))
    }

    /// Deploy one request, retrying retryable failures.
    ///
    /// Always yields a result: `success`, `failed` once attempts run out or
    /// the error is final, or `cancelled` if `cancel` fires first.
    pub async fn deploy_to_platform(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> DeploymentResult {
        let started = Instant::now();
        let platform = request.platform.as_str();

        let Some(implementation) = self.registry.get(&request.platform) else {
            let error = PlatformError::Unsupported(request.platform.clone());
            warn!(asset_id = %request.asset_id, platform, "No implementation registered");
            self.metrics
                .attempts
                .with_label_values(&[platform, error.kind()])
                .inc();
            let mut result =
                DeploymentResult::failed(request.asset_id, request.platform.clone(), error.to_string());
            result.metrics.duration_ms = elapsed_ms(started);
            return result;
        };

        let max_attempts = self.config.max_retry_attempts.max(1);
        let timeout = self.config.timeout();
        let mut last_error = None;
        let mut attempts_made = 0;

        for attempt in 1..=max_attempts {
            attempts_made = attempt;
            debug!(asset_id = %request.asset_id, platform, attempt, "Deployment attempt");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = tokio::time::timeout(timeout, implementation.deploy_asset(request)) => Some(outcome),
            };

            let error = match outcome {
                None => return self.cancelled(request, started, attempt),
                Some(Ok(Ok(mut result))) => {
                    result.asset_id = request.asset_id;
                    result.platform = request.platform.clone();
                    result.status = DeploymentStatus::Success;
                    result.error = None;
                    result.metrics.retry_count = attempt - 1;
                    result.metrics.duration_ms = elapsed_ms(started);
                    self.metrics
                        .attempts
                        .with_label_values(&[platform, "success"])
                        .inc();
                    info!(
                        asset_id = %request.asset_id,
                        platform,
                        attempt,
                        platform_id = ?result.platform_id,
                        "Deployment succeeded"
                    );
                    return result;
                }
                Some(Ok(Err(e))) => e,
                Some(Err(_)) => PlatformError::Timeout(timeout),
            };

            self.metrics
                .attempts
                .with_label_values(&[platform, error.kind()])
                .inc();
            let retryable = error.is_retryable();
            warn!(
                asset_id = %request.asset_id,
                platform,
                attempt,
                max_attempts,
                retryable,
                error = %error,
                "Deployment attempt failed"
            );
            last_error = Some(error);

            if !retryable {
                break;
            }
            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return self.cancelled(request, started, attempt),
                    _ = tokio::time::sleep(self.config.retry_delay()) => {}
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "deployment failed".to_string());
        error!(
            asset_id = %request.asset_id,
            platform,
            attempts = attempts_made,
            error = %message,
            "Deployment failed"
        );

        let mut result =
            DeploymentResult::failed(request.asset_id, request.platform.clone(), message);
        result.metrics.retry_count = attempts_made.saturating_sub(1);
        result.metrics.duration_ms = elapsed_ms(started);
        result
    }

    fn cancelled(
        &self,
        request: &DeploymentRequest,
        started: Instant,
        attempt: u32,
    ) -> DeploymentResult {
        info!(
            asset_id = %request.asset_id,
            platform = %request.platform,
            attempt,
            "Deployment cancelled"
        );
        let mut result = DeploymentResult::cancelled(request.asset_id, request.platform.clone());
        result.metrics.retry_count = attempt.saturating_sub(1);
        result.metrics.duration_ms = elapsed_ms(started);
        result
    }

    /// Health of the bus and of every registered platform.
    ///
    /// Values are [`HEALTHY`] or `"unhealthy: <reason>"`.
    pub async fn health_check(&self) -> BTreeMap<String, String> {
        let mut health = BTreeMap::new();

        let bus = match self.bus.health_check().await {
            Ok(()) => HEALTHY.to_string(),
            Err(e) => format!("unhealthy: {e}"),
        };
        health.insert(format!("bus.{}", self.bus.name()), bus);

        for (platform, outcome) in self.registry.health_check_all().await {
            let status = match outcome {
                Ok(()) => HEALTHY.to_string(),
                Err(e) => format!("unhealthy: {e}"),
            };
            health.insert(format!("platform.{platform}"), status);
        }

        health
    }

    fn record_result(&self, result: &DeploymentResult) {
        self.stats.record_result(result);
        let platform = result.platform.as_str();
        let status = result.status.as_str();
        self.metrics
            .deployments
            .with_label_values(&[platform, status])
            .inc();
        self.metrics
            .duration
            .with_label_values(&[platform, status])
            .observe(result.metrics.duration_ms as f64 / 1000.0);
    }

    fn record_publish_failure(&self, event_type: &str) {
        self.stats.record_publish_failure();
        self.metrics
            .publish_failures
            .with_label_values(&[event_type])
            .inc();
    }

    async fn publish(&self, subject: &str, message: &BusMessage) -> Result<(), OrchestratorError> {
        let event_type = message.event_type();
        let payload = message
            .encode()
            .map_err(|source| OrchestratorError::Encode { event_type, source })?;
        self.bus
            .publish(subject, payload)
            .await
            .map_err(|source| OrchestratorError::Publish { event_type, source })
    }

    /// Publish the per-platform status. Failures are logged and counted only.
    async fn publish_status(&self, origin: &AssetStatusChangedEvent, result: &DeploymentResult) {
        let message = BusMessage::DeploymentStatusChanged(DeploymentStatusChangedEvent::from_result(
            origin,
            result.clone(),
        ));

        if let Err(e) = self
            .publish(&self.subjects.deployment_status, &message)
            .await
        {
            self.record_publish_failure(message.event_type());
            error!(
                asset_id = %origin.asset_id,
                platform = %result.platform,
                error = %e,
                "Failed to publish deployment status"
            );
        }
    }
}
