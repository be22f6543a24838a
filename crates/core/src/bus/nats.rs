//! NATS adapter for the [`EventBus`] contract.

use async_nats::connection::State;
use async_nats::{Client, ConnectOptions, Event};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::BusError;
use super::traits::{
    Acknowledger, Delivery, Disposition, EventBus, Subscription, DEFAULT_SUBSCRIPTION_BUFFER,
};

/// [`EventBus`] backed by a NATS connection.
#[derive(Clone)]
pub struct NatsBus {
    client: Client,
    url: String,
    subscription_buffer: usize,
}

impl NatsBus {
    /// Connect to `url`, logging connection state changes.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = ConnectOptions::new()
            .event_callback(|event| async move {
                match event {
                    Event::Connected => info!("NATS connected"),
                    Event::Disconnected => warn!("NATS disconnected"),
                    Event::ClientError(e) => warn!(error = %e, "NATS client error"),
                    other => debug!(event = %other, "NATS connection event"),
                }
            })
            .connect(url)
            .await
            .map_err(|e| BusError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!(url, "Connected to NATS");
        Ok(Self {
            client,
            url: url.to_string(),
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        })
    }

    /// Deliveries buffered per subscription before the forwarder waits.
    pub fn with_subscription_buffer(mut self, capacity: usize) -> Self {
        self.subscription_buffer = capacity.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// The reply subject if it is a JetStream ack subject.
///
/// Any other reply belongs to a request/reply publisher and must not
/// receive settlement tokens.
fn jetstream_reply(reply: Option<&str>) -> Option<&str> {
    reply.filter(|r| r.starts_with("$JS.ACK."))
}

/// Delivery count encoded in a JetStream ack subject, 1 for plain NATS.
///
/// `$JS.ACK.<stream>.<consumer>.<delivered>.<stream_seq>.<consumer_seq>.<ts>.<pending>`
fn delivery_attempt(reply: Option<&str>) -> u32 {
    jetstream_reply(reply)
        .and_then(|r| r.split('.').nth(4))
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

struct NatsAcker {
    client: Client,
    /// JetStream ack subject, `None` for core NATS deliveries.
    ack_subject: Option<String>,
}

#[async_trait]
impl Acknowledger for NatsAcker {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), BusError> {
        // Core NATS has no settlement.
        let Some(reply) = self.ack_subject else {
            return Ok(());
        };

        let body: &'static [u8] = match disposition {
            Disposition::Ack => b"+ACK",
            Disposition::Nack => b"-NAK",
            Disposition::Term => b"+TERM",
        };

        self.client
            .publish(reply, Bytes::from_static(body))
            .await
            .map_err(|e| BusError::Settle(e.to_string()))
    }
}

#[async_trait]
impl EventBus for NatsBus {
    fn name(&self) -> &str {
        "nats"
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BusError::publish(subject, e))
    }

    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Subscription, BusError> {
        let mut subscriber = self
            .client
            .queue_subscribe(subject.to_string(), queue_group.to_string())
            .await
            .map_err(|e| BusError::subscribe(subject, e))?;

        info!(subject, queue_group, "Subscribed");

        let (tx, rx) = mpsc::channel(self.subscription_buffer);
        let client = self.client.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let reply = message.reply.as_deref();
                let delivery = Delivery::new(
                    message.subject.to_string(),
                    message.payload.to_vec(),
                    delivery_attempt(reply),
                    Box::new(NatsAcker {
                        client: client.clone(),
                        ack_subject: jetstream_reply(reply).map(str::to_string),
                    }),
                );
                // Waits while the consumer's buffer is full.
                if let Err(mpsc::error::SendError(unwanted)) = tx.send(delivery).await {
                    if let Err(e) = unwanted.nack().await {
                        debug!(error = %e, "Failed to return delivery after subscription closed");
                    }
                    break;
                }
            }
            debug!("NATS subscription forwarder finished");
        });

        Ok(Subscription::new(subject, queue_group, rx).with_forwarder(forwarder))
    }

    async fn health_check(&self) -> Result<(), BusError> {
        match self.client.connection_state() {
            State::Connected => Ok(()),
            other => Err(BusError::NotConnected(format!("{other:?}"))),
        }
    }

    /// Drain every subscription, flush pending publishes and close the
    /// connection. Open subscriptions end once their buffers are consumed.
    async fn close(&self) -> Result<(), BusError> {
        self.client
            .drain()
            .await
            .map_err(|e| BusError::Close(e.to_string()))?;
        info!("NATS connection drained and closed");
        Ok(())
    }
}
