//! Approval listener: feeds bus deliveries to the orchestrator.

use std::sync::Arc;

use prometheus::IntGauge;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{Delivery, Disposition, Subscription};
use crate::models::BusMessage;

use super::config::ConsumerConfig;
use super::runner::DeploymentOrchestrator;
use super::stats::EventOutcome;

/// Consumes approval events with bounded concurrency.
///
/// Settlement rules:
/// - undecodable payload: `term`, the message can never succeed
/// - anything but an approval: `ack` and drop
/// - approval processed (whatever the platform outcomes): `ack`
/// - processing aborted (shutdown, aggregate publish failure): `nack`
pub struct ApprovalListener {
    orchestrator: Arc<DeploymentOrchestrator>,
    max_in_flight: usize,
}

impl ApprovalListener {
    pub fn new(orchestrator: Arc<DeploymentOrchestrator>, config: &ConsumerConfig) -> Self {
        Self {
            orchestrator,
            max_in_flight: config.max_in_flight.max(1),
        }
    }

    /// Process deliveries until `cancel` fires or the subscription ends,
    /// then wait for in-flight events to settle.
    pub async fn run(&self, mut subscription: Subscription, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        info!(
            subject = subscription.subject(),
            queue_group = subscription.queue_group(),
            max_in_flight = self.max_in_flight,
            "Approval listener started"
        );

        loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Event handler task failed");
                }
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                delivery = subscription.next() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        warn!("Subscription closed by the bus");
                        break;
                    }
                },
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                handle_delivery(&orchestrator, delivery, &cancel).await;
            });
        }

        // Buffered but never started: hand back so another member takes them.
        let pending = subscription.close();
        if !pending.is_empty() {
            info!(count = pending.len(), "Returning buffered deliveries to the bus");
        }
        for delivery in pending {
            self.orchestrator.record_event(EventOutcome::Nacked);
            let subject = delivery.subject.clone();
            if let Err(e) = delivery.nack().await {
                warn!(subject = %subject, error = %e, "Failed to return buffered delivery");
            }
        }
        drop(subscription);

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight events");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Event handler task failed");
            }
        }
        info!("Approval listener stopped");
    }
}

/// Holds the in-flight gauge up for its lifetime, unwinding included.
struct InFlight(IntGauge);

impl InFlight {
    fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Process one delivery and settle it. Returns the disposition used.
pub async fn handle_delivery(
    orchestrator: &DeploymentOrchestrator,
    delivery: Delivery,
    cancel: &CancellationToken,
) -> Disposition {
    let disposition = match BusMessage::decode(&delivery.payload) {
        Err(e) => {
            warn!(
                subject = %delivery.subject,
                attempt = delivery.attempt,
                error = %e,
                "Malformed message, terminating"
            );
            orchestrator.record_event(EventOutcome::Malformed);
            Disposition::Term
        }
        Ok(BusMessage::AssetStatusChanged(event)) => {
            let outcome = {
                let _in_flight = InFlight::enter(&orchestrator.metrics().events_in_flight);
                orchestrator.handle_approval_event(&event, cancel).await
            };

            match outcome {
                Ok(Some(_)) => {
                    orchestrator.record_event(EventOutcome::Processed);
                    Disposition::Ack
                }
                Ok(None) => {
                    orchestrator.record_event(EventOutcome::Ignored);
                    Disposition::Ack
                }
                Err(e) => {
                    warn!(
                        asset_id = %event.asset_id,
                        attempt = delivery.attempt,
                        error = %e,
                        "Event processing aborted, returning to bus"
                    );
                    orchestrator.record_event(EventOutcome::Nacked);
                    Disposition::Nack
                }
            }
        }
        Ok(other) => {
            debug!(event_type = other.event_type(), "Ignoring non-trigger event");
            orchestrator.record_event(EventOutcome::Ignored);
            Disposition::Ack
        }
    };

    let subject = delivery.subject.clone();
    if let Err(e) = delivery.settle(disposition).await {
        warn!(
            subject = %subject,
            disposition = disposition.as_str(),
            error = %e,
            "Failed to settle message"
        );
    }
    disposition
}
