//! Deployment orchestrator for approved assets.
//!
//! The orchestrator turns approval events into platform deployments:
//! - **Platforms**: Sequential within one event, with retry and timeout
//! - **Events**: Concurrent, bounded by the [`ApprovalListener`]
//! - **Reporting**: Per-platform status events, then one aggregate event

mod aggregate;
mod config;
mod listener;
mod runner;
mod stats;
mod types;

pub use aggregate::aggregate_status;
pub use config::{ConsumerConfig, DeploymentConfig};
pub use listener::{handle_delivery, ApprovalListener};
pub use runner::{DeploymentOrchestrator, HEALTHY};
pub use stats::{DeploymentStats, DeploymentStatsSnapshot, EventOutcome, PlatformStats};
pub use types::{DeploymentSummary, OrchestratorError};
