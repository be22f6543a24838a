//! In-process event bus.
//!
//! Implements the full [`EventBus`] contract without a broker: exact-match
//! subjects, round-robin queue groups, redelivery on `nack` up to a delivery
//! limit, and a dead-letter list for terminated or exhausted messages. Used
//! for local runs and integration tests.
//!
//! Member buffers are bounded. `publish` waits for room in the chosen
//! member's buffer; observers are lossy taps and miss messages when full.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::BusError;
use super::traits::{
    Acknowledger, Delivery, Disposition, EventBus, NoopAcknowledger, Subscription,
    DEFAULT_SUBSCRIPTION_BUFFER,
};

/// Default number of deliveries before a nacked message is dead-lettered.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

const HISTORY_LIMIT: usize = 1024;

/// A message accepted by [`MemoryBus::publish`].
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    pub published_at: DateTime<Utc>,
}

/// Why a message ended up in the dead-letter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The consumer terminated it.
    Terminated,
    /// It was nacked on its final allowed delivery.
    MaxDeliveries,
    /// It was nacked and no group member was left to take it.
    NoSubscribers,
}

/// A message the bus gave up on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub subject: String,
    pub queue_group: String,
    pub payload: Vec<u8>,
    pub deliveries: u32,
    pub reason: DeadLetterReason,
}

#[derive(Default)]
struct QueueGroup {
    members: Vec<mpsc::Sender<Delivery>>,
    next: usize,
}

#[derive(Default)]
struct Topic {
    groups: HashMap<String, QueueGroup>,
    observers: Vec<mpsc::Sender<Delivery>>,
}

#[derive(Default)]
struct State {
    closed: bool,
    topics: HashMap<String, Topic>,
    history: VecDeque<PublishedMessage>,
    dead_letters: Vec<DeadLetter>,
}

struct Shared {
    state: Mutex<State>,
    max_deliveries: u32,
    subscription_buffer: usize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process [`EventBus`].
#[derive(Clone)]
pub struct MemoryBus {
    shared: Arc<Shared>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_DELIVERIES, DEFAULT_SUBSCRIPTION_BUFFER)
    }

    pub fn with_max_deliveries(max_deliveries: u32) -> Self {
        Self::with_limits(max_deliveries, DEFAULT_SUBSCRIPTION_BUFFER)
    }

    /// Bus with a delivery limit and a per-subscription buffer size.
    pub fn with_limits(max_deliveries: u32, subscription_buffer: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                max_deliveries: max_deliveries.max(1),
                subscription_buffer: subscription_buffer.max(1),
            }),
        }
    }

    /// Receive a copy of every message on `subject`, outside any queue group.
    ///
    /// Observer deliveries need no settlement.
    pub fn observe(&self, subject: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.shared.subscription_buffer);
        self.shared
            .state()
            .topics
            .entry(subject.to_string())
            .or_default()
            .observers
            .push(tx);
        Subscription::new(subject, "", rx)
    }

    /// Messages accepted so far, oldest first (bounded history).
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.shared.state().history.iter().cloned().collect()
    }

    /// Messages accepted on `subject`, oldest first.
    pub fn published_on(&self, subject: &str) -> Vec<PublishedMessage> {
        self.shared
            .state()
            .history
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared.state().dead_letters.clone()
    }

    /// Live members of `queue_group` on `subject`.
    pub fn member_count(&self, subject: &str, queue_group: &str) -> usize {
        self.shared
            .state()
            .topics
            .get(subject)
            .and_then(|t| t.groups.get(queue_group))
            .map(|g| g.members.iter().filter(|m| !m.is_closed()).count())
            .unwrap_or(0)
    }
}

fn new_delivery(
    shared: &Arc<Shared>,
    subject: &str,
    queue_group: &str,
    payload: Vec<u8>,
    attempt: u32,
) -> Delivery {
    Delivery::new(
        subject,
        payload.clone(),
        attempt,
        Box::new(MemoryAcker {
            shared: Arc::downgrade(shared),
            subject: subject.to_string(),
            queue_group: queue_group.to_string(),
            payload,
            attempt,
        }),
    )
}

/// Why [`try_route`] could not place a delivery.
enum Unrouted {
    /// Every live member's buffer is full.
    Full(Delivery),
    /// The group has no live member.
    NoMembers(Delivery),
}

/// Place `delivery` with the first member, in round-robin order, that has
/// buffer room. Never waits.
fn try_route(
    state: &mut State,
    subject: &str,
    queue_group: &str,
    mut delivery: Delivery,
) -> Result<(), Unrouted> {
    let Some(group) = state
        .topics
        .get_mut(subject)
        .and_then(|t| t.groups.get_mut(queue_group))
    else {
        return Err(Unrouted::NoMembers(delivery));
    };

    // Subscriptions dropped or closed since the last publish.
    group.members.retain(|member| !member.is_closed());
    let len = group.members.len();
    if len == 0 {
        return Err(Unrouted::NoMembers(delivery));
    }

    for offset in 0..len {
        let idx = (group.next + offset) % len;
        match group.members[idx].try_send(delivery) {
            Ok(()) => {
                group.next = idx + 1;
                return Ok(());
            }
            Err(mpsc::error::TrySendError::Full(returned))
            | Err(mpsc::error::TrySendError::Closed(returned)) => delivery = returned,
        }
    }

    Err(Unrouted::Full(delivery))
}

/// The member whose turn it is, advancing the round-robin cursor.
fn next_member(
    state: &mut State,
    subject: &str,
    queue_group: &str,
) -> Option<mpsc::Sender<Delivery>> {
    let group = state
        .topics
        .get_mut(subject)
        .and_then(|t| t.groups.get_mut(queue_group))?;
    if group.members.is_empty() {
        return None;
    }
    let idx = group.next % group.members.len();
    group.next = idx + 1;
    Some(group.members[idx].clone())
}

/// Hand `delivery` to the group, waiting for buffer room when every member
/// is full. Gives the delivery back when the group has no live member.
async fn route(
    shared: &Arc<Shared>,
    subject: &str,
    queue_group: &str,
    mut delivery: Delivery,
) -> Result<(), Delivery> {
    loop {
        let member = {
            let mut state = shared.state();
            match try_route(&mut state, subject, queue_group, delivery) {
                Ok(()) => return Ok(()),
                Err(Unrouted::NoMembers(returned)) => return Err(returned),
                Err(Unrouted::Full(returned)) => {
                    delivery = returned;
                    next_member(&mut state, subject, queue_group)
                }
            }
        };

        let Some(member) = member else {
            return Err(delivery);
        };
        match member.send(delivery).await {
            Ok(()) => return Ok(()),
            // Closed while we waited; pick again.
            Err(mpsc::error::SendError(returned)) => delivery = returned,
        }
    }
}

fn dead_letter(
    state: &mut State,
    subject: &str,
    queue_group: &str,
    payload: Vec<u8>,
    deliveries: u32,
    reason: DeadLetterReason,
) {
    warn!(
        subject,
        queue_group,
        deliveries,
        ?reason,
        "Message moved to dead letters"
    );
    state.dead_letters.push(DeadLetter {
        subject: subject.to_string(),
        queue_group: queue_group.to_string(),
        payload,
        deliveries,
        reason,
    });
}

struct MemoryAcker {
    shared: Weak<Shared>,
    subject: String,
    queue_group: String,
    payload: Vec<u8>,
    attempt: u32,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn settle(self: Box<Self>, disposition: Disposition) -> Result<(), BusError> {
        let shared = self.shared.upgrade().ok_or(BusError::Closed)?;
        let MemoryAcker {
            subject,
            queue_group,
            payload,
            attempt,
            ..
        } = *self;
        let mut state = shared.state();

        match disposition {
            Disposition::Ack => {}
            Disposition::Term => dead_letter(
                &mut state,
                &subject,
                &queue_group,
                payload,
                attempt,
                DeadLetterReason::Terminated,
            ),
            Disposition::Nack if state.closed => {}
            Disposition::Nack if attempt >= shared.max_deliveries => dead_letter(
                &mut state,
                &subject,
                &queue_group,
                payload,
                attempt,
                DeadLetterReason::MaxDeliveries,
            ),
            Disposition::Nack => {
                debug!(subject = %subject, attempt, "Redelivering nacked message");
                let delivery = new_delivery(&shared, &subject, &queue_group, payload, attempt + 1);
                match try_route(&mut state, &subject, &queue_group, delivery) {
                    Ok(()) => {}
                    Err(Unrouted::NoMembers(returned)) => dead_letter(
                        &mut state,
                        &subject,
                        &queue_group,
                        returned.payload,
                        attempt,
                        DeadLetterReason::NoSubscribers,
                    ),
                    // The settling consumer may hold the slot the redelivery
                    // needs, so wait for room off its task.
                    Err(Unrouted::Full(returned)) => {
                        drop(state);
                        let shared = Arc::clone(&shared);
                        tokio::spawn(async move {
                            if let Err(unrouted) =
                                route(&shared, &subject, &queue_group, returned).await
                            {
                                dead_letter(
                                    &mut shared.state(),
                                    &subject,
                                    &queue_group,
                                    unrouted.payload,
                                    attempt,
                                    DeadLetterReason::NoSubscribers,
                                );
                            }
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let groups: Vec<String> = {
            let mut state = self.shared.state();
            if state.closed {
                return Err(BusError::Closed);
            }

            if state.history.len() == HISTORY_LIMIT {
                state.history.pop_front();
            }
            state.history.push_back(PublishedMessage {
                subject: subject.to_string(),
                payload: payload.clone(),
                published_at: Utc::now(),
            });

            match state.topics.get_mut(subject) {
                Some(topic) => {
                    topic.observers.retain(|observer| {
                        let copy =
                            Delivery::new(subject, payload.clone(), 1, Box::new(NoopAcknowledger));
                        match observer.try_send(copy) {
                            Ok(()) => true,
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                debug!(subject, "Observer buffer full, copy dropped");
                                true
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => false,
                        }
                    });
                    topic.groups.keys().cloned().collect()
                }
                None => Vec::new(),
            }
        };

        for group in groups {
            let delivery = new_delivery(&self.shared, subject, &group, payload.clone(), 1);
            if route(&self.shared, subject, &group, delivery).await.is_err() {
                debug!(subject, queue_group = %group, "No live members, message dropped");
            }
        }

        Ok(())
    }

    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Subscription, BusError> {
        let mut state = self.shared.state();
        if state.closed {
            return Err(BusError::subscribe(subject, "bus closed"));
        }

        let (tx, rx) = mpsc::channel(self.shared.subscription_buffer);
        state
            .topics
            .entry(subject.to_string())
            .or_default()
            .groups
            .entry(queue_group.to_string())
            .or_default()
            .members
            .push(tx);

        Ok(Subscription::new(subject, queue_group, rx))
    }

    async fn health_check(&self) -> Result<(), BusError> {
        if self.shared.state().closed {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        let mut state = self.shared.state();
        state.closed = true;
        // Dropping the senders ends every open subscription.
        state.topics.clear();
        Ok(())
    }
}
