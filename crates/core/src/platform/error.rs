//! Error types for the platform module.

use std::time::Duration;
use thiserror::Error;

use crate::models::Platform;

/// Errors returned by ad platform implementations.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// Network hiccup or platform-side 5xx.
    #[error("Transient platform error: {0}")]
    Transient(String),

    /// The platform throttled us.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The attempt did not finish in time.
    #[error("Deployment timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The platform refused the asset; resubmitting the same request will
    /// not help.
    #[error("Rejected by platform: {0}")]
    Rejected(String),

    /// No implementation is registered for this platform.
    #[error("Unsupported platform: {0}")]
    Unsupported(Platform),

    /// The platform or its client service is down.
    #[error("Platform unavailable: {0}")]
    Unavailable(String),
}

impl PlatformError {
    /// Returns true if a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient(_) | Self::RateLimited(_) | Self::Timeout(_) | Self::Unavailable(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::RateLimited(_) => "rate_limited",
            Self::Timeout(_) => "timeout",
            Self::Rejected(_) => "rejected",
            Self::Unsupported(_) => "unsupported",
            Self::Unavailable(_) => "unavailable",
        }
    }
}
