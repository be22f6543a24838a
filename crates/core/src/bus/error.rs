//! Error types for the bus module.

use thiserror::Error;

/// Errors raised by event bus adapters.
#[derive(Debug, Error)]
pub enum BusError {
    /// Could not establish a connection to the broker.
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Subscription was refused.
    #[error("Failed to subscribe to {subject}: {reason}")]
    Subscribe { subject: String, reason: String },

    /// Broker did not accept a publish.
    #[error("Failed to publish to {subject}: {reason}")]
    Publish { subject: String, reason: String },

    /// Acknowledgement could not be delivered.
    #[error("Failed to settle message: {0}")]
    Settle(String),

    /// Connection exists but is not usable.
    #[error("Bus not connected: {0}")]
    NotConnected(String),

    /// The connection could not be shut down cleanly.
    #[error("Failed to close connection: {0}")]
    Close(String),

    /// The bus was closed.
    #[error("Bus closed")]
    Closed,
}

impl BusError {
    pub fn publish(subject: &str, reason: impl ToString) -> Self {
        Self::Publish {
            subject: subject.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe(subject: &str, reason: impl ToString) -> Self {
        Self::Subscribe {
            subject: subject.to_string(),
            reason: reason.to_string(),
        }
    }
}
