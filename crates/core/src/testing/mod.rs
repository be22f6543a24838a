//! Testing utilities and mock implementations.
//!
//! This module provides mocks for the two external collaborators, the ad
//! platforms and the event bus, so deployments can be exercised end to end
//! without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use zamc_connectors_core::testing::{fixtures, MockPlatform, RecordingBus};
//!
//! let meta = Arc::new(MockPlatform::new(Platform::Meta));
//! let bus = RecordingBus::new();
//!
//! // Configure mock behavior
//! meta.fail_next(2, PlatformError::Transient("503".into())).await;
//! bus.fail_subject("zamc.events.asset.deployment_status_changed").await;
//!
//! // Build a DeploymentOrchestrator around them...
//! ```

mod mock_platform;
mod recording_bus;

pub use mock_platform::{MockPlatform, RecordedCall};
pub use recording_bus::{RecordedPublish, RecordingBus};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::models::{
        AssetStatus, AssetStatusChangedEvent, ContentType, CreativeSpecs, DeploymentRequest,
        Metadata, Platform,
    };

    /// Create an approved asset event targeting `platforms`.
    pub fn approval_event(platforms: &[Platform]) -> AssetStatusChangedEvent {
        AssetStatusChangedEvent {
            asset_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            strategy_id: Uuid::new_v4(),
            status: AssetStatus::Approved,
            prev_status: Some(AssetStatus::Review),
            content_type: ContentType::SocialMedia,
            title: "Spring launch".to_string(),
            content: "Meet the new collection.".to_string(),
            metadata: Metadata {
                platforms: platforms.to_vec(),
                target_audience: "early adopters".to_string(),
                budget: 500.0,
                campaign_type: "awareness".to_string(),
                keywords: vec!["launch".to_string(), "spring".to_string()],
                creative_specs: CreativeSpecs {
                    headline: "Spring is here".to_string(),
                    call_to_action: "Shop now".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
            timestamp: Utc::now(),
        }
    }

    /// Create a deployment request for `platform`.
    pub fn deployment_request(platform: Platform) -> DeploymentRequest {
        let event = approval_event(std::slice::from_ref(&platform));
        DeploymentRequest::for_platform(&event, platform)
    }
}
