//! Trait definitions for the bus module.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::BusError;

/// Publish/subscribe transport with queue-group load balancing.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Returns the name of this bus implementation.
    fn name(&self) -> &str;

    /// Publishes a payload. Success means the broker accepted it, nothing more.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribes as a member of `queue_group`.
    ///
    /// Every message on `subject` is delivered to exactly one member of the
    /// group.
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Subscription, BusError>;

    /// Checks that the connection is usable.
    async fn health_check(&self) -> Result<(), BusError>;

    /// Releases the connection.
    async fn close(&self) -> Result<(), BusError>;
}

/// How a delivery was settled by its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed; do not redeliver.
    Ack,
    /// Not processed; eligible for redelivery.
    Nack,
    /// Never processable; do not redeliver.
    Term,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Nack => "nack",
            Self::Term => "term",
        }
    }
}

/// Transport-side settlement of one delivery.
#[async_trait]
pub trait Acknowledger: Send {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), BusError>;
}

/// Acknowledger for transports without settlement.
pub struct NoopAcknowledger;

#[async_trait]
impl Acknowledger for NoopAcknowledger {
    async fn settle(self: Box<Self>, _disposition: Disposition) -> Result<(), BusError> {
        Ok(())
    }
}

/// One message handed to a subscriber. Settle it exactly once.
pub struct Delivery {
    pub subject: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on each redelivery.
    pub attempt: u32,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        subject: impl Into<String>,
        payload: Vec<u8>,
        attempt: u32,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            subject: subject.into(),
            payload,
            attempt,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), BusError> {
        self.acker.settle(Disposition::Ack).await
    }

    pub async fn nack(self) -> Result<(), BusError> {
        self.acker.settle(Disposition::Nack).await
    }

    pub async fn term(self) -> Result<(), BusError> {
        self.acker.settle(Disposition::Term).await
    }

    pub async fn settle(self, disposition: Disposition) -> Result<(), BusError> {
        self.acker.settle(disposition).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("subject", &self.subject)
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Deliveries a subscription buffers ahead of its consumer.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 64;

/// A live subscription. Dropping it unsubscribes.
///
/// Backed by a bounded channel: a consumer that stops pulling stops the
/// transport from handing it more work.
pub struct Subscription {
    subject: String,
    queue_group: String,
    rx: mpsc::Receiver<Delivery>,
    forwarder: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        subject: impl Into<String>,
        queue_group: impl Into<String>,
        rx: mpsc::Receiver<Delivery>,
    ) -> Self {
        Self {
            subject: subject.into(),
            queue_group: queue_group.into(),
            rx,
            forwarder: None,
        }
    }

    /// Attach the task feeding this subscription; it is aborted on drop.
    pub fn with_forwarder(mut self, handle: JoinHandle<()>) -> Self {
        self.forwarder = Some(handle);
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }

    /// Waits for the next delivery. `None` once the transport side is gone.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Stop taking deliveries and return the ones already buffered.
    ///
    /// The returned deliveries are unsettled; the caller decides their fate,
    /// normally `nack` so another member picks them up.
    pub fn close(&mut self) -> Vec<Delivery> {
        self.rx.close();
        let mut pending = Vec::new();
        while let Ok(delivery) = self.rx.try_recv() {
            pending.push(delivery);
        }
        pending
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }
}
