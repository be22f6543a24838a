//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Platform deployments (outcomes, attempts, duration)
//! - Approval events (by outcome, in flight)
//! - Bus publishes that failed
//!
//! Collectors are owned by [`OrchestratorMetrics`] rather than held in
//! statics so that each orchestrator (and each test) gets its own set. The
//! server registers them into its process registry.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};

/// Deployment metrics recorded by the orchestrator and approval listener.
#[derive(Clone)]
pub struct OrchestratorMetrics {
    /// Completed platform deployments by platform and final status.
    pub deployments: IntCounterVec,
    /// Individual attempts by platform and outcome.
    pub attempts: IntCounterVec,
    /// Wall time of a platform deployment across all attempts.
    pub duration: HistogramVec,
    /// Approval listener outcomes.
    pub events: IntCounterVec,
    /// Events currently being processed.
    pub events_in_flight: IntGauge,
    /// Publishes the broker did not accept, by event type.
    pub publish_failures: IntCounterVec,
}

impl OrchestratorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            deployments: IntCounterVec::new(
                Opts::new(
                    "connectors_deployments_total",
                    "Platform deployments by final status",
                ),
                &["platform", "status"], // "success", "failed", "cancelled"
            )?,
            attempts: IntCounterVec::new(
                Opts::new(
                    "connectors_deployment_attempts_total",
                    "Platform deployment attempts by outcome",
                ),
                &["platform", "outcome"], // "success" or the error kind
            )?,
            duration: HistogramVec::new(
                HistogramOpts::new(
                    "connectors_deployment_duration_seconds",
                    "Wall time of a platform deployment including retries",
                )
                .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
                &["platform", "status"],
            )?,
            events: IntCounterVec::new(
                Opts::new("connectors_events_total", "Approval events by outcome"),
                &["outcome"], // "processed", "ignored", "malformed", "nacked"
            )?,
            events_in_flight: IntGauge::new(
                "connectors_events_in_flight",
                "Approval events currently being processed",
            )?,
            publish_failures: IntCounterVec::new(
                Opts::new(
                    "connectors_publish_failures_total",
                    "Bus publishes that were not accepted",
                ),
                &["event_type"],
            )?,
        })
    }

    /// Register every collector with `registry`.
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.deployments.clone()))?;
        registry.register(Box::new(self.attempts.clone()))?;
        registry.register(Box::new(self.duration.clone()))?;
        registry.register(Box::new(self.events.clone()))?;
        registry.register(Box::new(self.events_in_flight.clone()))?;
        registry.register(Box::new(self.publish_failures.clone()))?;
        Ok(())
    }
}
