//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the connectors service:
//! - HTTP request metrics (latency, counts)
//! - Bus and platform health (collected dynamically)
//! - Deployment metrics owned by the orchestrator, registered at startup

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use zamc_connectors_core::{OrchestratorMetrics, HEALTHY};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "connectors_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("connectors_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "connectors_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Component Health
// =============================================================================

/// 1 if the component is healthy, 0 otherwise (collected dynamically).
pub static COMPONENT_UP: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("connectors_component_up", "Component health (1 = healthy)"),
        &["component"],
    )
    .unwrap()
});

/// Registered ad platforms.
pub static PLATFORMS_REGISTERED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "connectors_platforms_registered",
        "Number of registered ad platforms",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Health
    registry.register(Box::new(COMPONENT_UP.clone())).unwrap();
    registry
        .register(Box::new(PLATFORMS_REGISTERED.clone()))
        .unwrap();
}

/// Add the orchestrator's deployment metrics to the global registry.
pub fn register_orchestrator_metrics(
    metrics: &OrchestratorMetrics,
) -> Result<(), prometheus::Error> {
    metrics.register(&REGISTRY)
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so health gauges reflect the moment of the scrape.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let orchestrator = state.orchestrator();
    PLATFORMS_REGISTERED.set(orchestrator.registry().len() as i64);

    for (component, status) in orchestrator.health_check().await {
        COMPONENT_UP
            .with_label_values(&[&component])
            .set(i64::from(status == HEALTHY));
    }
}
