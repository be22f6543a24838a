//! Advertising platform capability.
//!
//! The orchestrator only sees [`AdPlatform`]. Concrete platform clients live
//! outside this service; [`WebhookPlatform`] reaches them over HTTP and
//! [`PlatformRegistry`] maps platform identifiers to implementations.

mod error;
mod registry;
mod traits;
mod webhook;

pub use error::PlatformError;
pub use registry::PlatformRegistry;
pub use traits::AdPlatform;
pub use webhook::WebhookPlatform;
