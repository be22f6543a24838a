//! Event and deployment data model.
//!
//! Everything here is plain serde data; the JSON shapes are what other
//! services see on the bus.

mod asset;
mod deployment;
mod envelope;

pub use asset::{
    AssetStatus, AssetStatusChangedEvent, ContentType, CreativeSpecs, Demographics, Metadata,
    Platform,
};
pub use deployment::{
    DeploymentMetrics, DeploymentRequest, DeploymentResult, DeploymentStatus,
    DeploymentStatusChangedEvent,
};
pub use envelope::BusMessage;
