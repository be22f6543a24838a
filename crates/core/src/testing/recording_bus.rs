//! Recording event bus for testing.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::bus::{BusError, EventBus, MemoryBus, Subscription};
use crate::models::BusMessage;

/// A recorded publish for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPublish {
    pub subject: String,
    pub payload: Vec<u8>,
    /// Whether the publish was accepted.
    pub accepted: bool,
}

impl RecordedPublish {
    /// Decode the payload as a bus envelope.
    pub fn message(&self) -> Option<BusMessage> {
        BusMessage::decode(&self.payload).ok()
    }
}

/// Bus that records every publish and can refuse selected ones.
///
/// Accepted publishes and all subscriptions go through an inner
/// [`MemoryBus`], so queue-group behavior is real.
#[derive(Clone, Default)]
pub struct RecordingBus {
    inner: MemoryBus,
    publishes: Arc<RwLock<Vec<RecordedPublish>>>,
    failing_subjects: Arc<RwLock<HashSet<String>>>,
    fail_all: Arc<RwLock<bool>>,
    unhealthy: Arc<RwLock<Option<String>>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The memory bus behind this recorder.
    pub fn inner(&self) -> &MemoryBus {
        &self.inner
    }

    /// Get all publish attempts, accepted or not.
    pub async fn recorded_publishes(&self) -> Vec<RecordedPublish> {
        self.publishes.read().await.clone()
    }

    /// Decoded envelopes accepted on `subject`.
    pub async fn messages_on(&self, subject: &str) -> Vec<BusMessage> {
        self.publishes
            .read()
            .await
            .iter()
            .filter(|p| p.accepted && p.subject == subject)
            .filter_map(RecordedPublish::message)
            .collect()
    }

    /// Refuse every publish to `subject`.
    pub async fn fail_subject(&self, subject: &str) {
        self.failing_subjects
            .write()
            .await
            .insert(subject.to_string());
    }

    /// Refuse every publish.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Make health checks fail with `reason`, or pass with `None`.
    pub async fn set_unhealthy(&self, reason: Option<&str>) {
        *self.unhealthy.write().await = reason.map(str::to_string);
    }
}

#[async_trait]
impl EventBus for RecordingBus {
    fn name(&self) -> &str {
        "recording"
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let refused = *self.fail_all.read().await
            || self.failing_subjects.read().await.contains(subject);

        self.publishes.write().await.push(RecordedPublish {
            subject: subject.to_string(),
            payload: payload.clone(),
            accepted: !refused,
        });

        if refused {
            return Err(BusError::publish(subject, "injected failure"));
        }
        self.inner.publish(subject, payload).await
    }

    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Subscription, BusError> {
        self.inner.queue_subscribe(subject, queue_group).await
    }

    async fn health_check(&self) -> Result<(), BusError> {
        match self.unhealthy.read().await.as_ref() {
            Some(reason) => Err(BusError::NotConnected(reason.clone())),
            None => self.inner.health_check().await,
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        self.inner.close().await
    }
}
