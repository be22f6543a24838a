//! Event bus contract and adapters.
//!
//! The service consumes approvals and publishes deployment progress through
//! an [`EventBus`]. Two adapters are provided:
//! - [`NatsBus`]: the production transport
//! - [`MemoryBus`]: in-process, for local runs and tests

mod error;
mod memory;
mod nats;
mod subjects;
mod traits;

pub use error::BusError;
pub use memory::{DeadLetter, DeadLetterReason, MemoryBus, PublishedMessage, DEFAULT_MAX_DELIVERIES};
pub use nats::NatsBus;
pub use subjects::Subjects;
pub use traits::{
    Acknowledger, Delivery, Disposition, EventBus, NoopAcknowledger, Subscription,
    DEFAULT_SUBSCRIPTION_BUFFER,
};
