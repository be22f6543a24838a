use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use zamc_connectors_core::{DeploymentStatsSnapshot, SanitizedConfig, HEALTHY};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

const SERVICE_NAME: &str = "zamc-connectors";

/// Endpoints listed by the service descriptor.
const ENDPOINTS: &[&str] = &["/health", "/ready", "/stats", "/metrics", "/config"];

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub endpoints: &'static [&'static str],
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.environment().to_string(),
        started_at: state.started_at(),
        endpoints: ENDPOINTS,
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// Component health; 503 when any component reports unhealthy.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let components = state.orchestrator().health_check().await;
    let healthy = components.values().all(|status| status == HEALTHY);

    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            components,
            timestamp: Utc::now(),
        }),
    )
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
}

pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    let ready = state.is_ready();
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(ReadyResponse { ready }))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<DeploymentStatsSnapshot> {
    Json(state.orchestrator().stats())
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    collect_dynamic_metrics(&state).await;

    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}
