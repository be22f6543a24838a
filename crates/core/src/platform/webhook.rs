//! HTTP bridge to an external platform-client service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use super::error::PlatformError;
use super::traits::AdPlatform;
use crate::models::{DeploymentRequest, DeploymentResult, Platform};

/// Body returned by a platform-client service on success. Every field is
/// optional; an empty body is a success without identifiers.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WebhookResponse {
    platform_id: Option<String>,
    platform_url: Option<String>,
    data_sent: Option<u64>,
    data_received: Option<u64>,
}

/// Deploys by POSTing the [`DeploymentRequest`] as JSON to an endpoint.
///
/// Status mapping: 2xx is success, 429 is [`PlatformError::RateLimited`],
/// 5xx is [`PlatformError::Transient`], any other status is
/// [`PlatformError::Rejected`]. A 2xx is a success whatever its body says.
pub struct WebhookPlatform {
    platform: Platform,
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    health_url: Option<Url>,
    request_timeout: Duration,
}

fn parse_url(platform: &Platform, url: &str) -> Result<Url, PlatformError> {
    Url::parse(url).map_err(|e| {
        PlatformError::Unavailable(format!("invalid URL for {platform}: {url} ({e})"))
    })
}

impl WebhookPlatform {
    pub fn new(
        platform: Platform,
        endpoint: &str,
        api_key: Option<String>,
        health_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let endpoint = parse_url(&platform, endpoint)?;
        let health_url = health_url
            .as_deref()
            .map(|url| parse_url(&platform, url))
            .transpose()?;

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PlatformError::Unavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            platform,
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
            health_url,
            request_timeout,
        })
    }

    fn classify(&self, error: reqwest::Error) -> PlatformError {
        if error.is_timeout() {
            PlatformError::Timeout(self.request_timeout)
        } else if error.is_connect() {
            PlatformError::Unavailable(error.to_string())
        } else {
            PlatformError::Transient(error.to_string())
        }
    }
}

fn snippet(body: &[u8]) -> String {
    String::from_utf8_lossy(body).chars().take(200).collect()
}

#[async_trait]
impl AdPlatform for WebhookPlatform {
    fn platform(&self) -> Platform {
        self.platform.clone()
    }

    async fn deploy_asset(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, PlatformError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| PlatformError::Rejected(format!("unserializable request: {e}")))?;
        let sent = body.len() as u64;

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(platform = %self.platform, asset_id = %request.asset_id, "Posting deployment");
        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PlatformError::RateLimited(snippet(&bytes)));
        }
        if status.is_server_error() {
            return Err(PlatformError::Transient(format!(
                "HTTP {}: {}",
                status,
                snippet(&bytes)
            )));
        }
        if !status.is_success() {
            return Err(PlatformError::Rejected(format!(
                "HTTP {}: {}",
                status,
                snippet(&bytes)
            )));
        }

        // The platform accepted the deployment; a body we cannot read only
        // costs the identifiers, never a second deployment.
        let parsed: WebhookResponse = if bytes.is_empty() {
            WebhookResponse::default()
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(
                    platform = %self.platform,
                    asset_id = %request.asset_id,
                    status = %status,
                    error = %e,
                    body = %snippet(&bytes),
                    "Unreadable success response, deployment recorded without identifiers"
                );
                WebhookResponse::default()
            })
        };

        let mut result = DeploymentResult::success(request.asset_id, self.platform.clone());
        result.platform_id = parsed.platform_id;
        result.platform_url = parsed.platform_url;
        result.metrics.data_sent = parsed.data_sent.unwrap_or(sent);
        result.metrics.data_received = parsed.data_received.unwrap_or(bytes.len() as u64);
        Ok(result)
    }

    async fn health_check(&self) -> Result<(), PlatformError> {
        let Some(url) = &self.health_url else {
            return Ok(());
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PlatformError::Unavailable(format!(
                "health check returned HTTP {}",
                response.status()
            )))
        }
    }
}
