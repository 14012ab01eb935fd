// ============================================
// File: crates/dnsfleet-server/src/services/broker.rs
// ============================================
//! # Event Broker
//!
//! ## Creation Reason
//! Live views (health dashboards) subscribe to topics and receive every
//! update published after they subscribed. Publishers must never wait on
//! slow subscribers.
//!
//! ## Main Functionality
//! - `EventBroker`: Topic → subscriber channels, subscriber counter
//! - `Subscription`: One subscriber's bounded receive side
//! - Coalesced "subscribers changed" signal for the health scheduler
//!
//! ## Delivery Semantics
//! ```text
//! publish(topic) ──read lock──► try_send to each channel of topic
//!                                   │
//!                                   ├── ok       → delivered
//!                                   ├── full     → dropped for that subscriber
//!                                   └── closed   → ignored
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Unregistering happens under the WRITE lock and drops the senders
//!   inside that critical section; publishers holding the read lock can
//!   never observe a half-removed subscriber
//! - The change signal is a single stored permit: many changes between two
//!   waits collapse into one wake-up. Consumers must re-read the count.
//!
//! ## Last Modified
//! v0.1.0 - Initial broker

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace};

// ============================================
// Constants
// ============================================

/// Topic carrying the aggregate health summary.
pub const TOPIC_HEALTH_SUMMARY: &str = "health_summary";

/// Topic carrying the per-node health list.
pub const TOPIC_NODE_HEALTH: &str = "node_health";

/// Default number of buffered events per subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

// ============================================
// Event
// ============================================

/// One published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Topic it was published on
    pub topic: Arc<str>,
    /// Serialized payload, usually JSON
    pub payload: Arc<str>,
}

// ============================================
// EventBroker
// ============================================

type Channels = HashMap<String, HashMap<u64, mpsc::Sender<Event>>>;

struct Inner {
    topics: RwLock<Channels>,
    next_id: AtomicU64,
    subscribers: AtomicUsize,
    changed: Notify,
    capacity: usize,
}

impl Inner {
    fn signal_change(&self) {
        self.changed.notify_one();
    }
}

/// In-process topic pub/sub.
///
/// Cheap to clone; clones share the same topics.
///
/// # Example
/// ```
/// use dnsfleet_server::services::broker::EventBroker;
///
/// # #[tokio::main]
/// # async fn main() {
/// let broker = EventBroker::default();
/// let mut sub = broker.subscribe(["health_summary"]);
/// broker.publish("health_summary", r#"{"online":1}"#);
/// let event = sub.recv().await.unwrap();
/// assert_eq!(&*event.payload, r#"{"online":1}"#);
/// # }
/// ```
#[derive(Clone)]
pub struct EventBroker {
    inner: Arc<Inner>,
}

impl EventBroker {
    /// Creates a broker buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                subscribers: AtomicUsize::new(0),
                changed: Notify::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Registers a subscriber for every topic in `topics`.
    pub fn subscribe<I, S>(&self, topics: I) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics: Vec<String> = topics
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut channels = self.inner.topics.write();
            for topic in &topics {
                channels.entry(topic.clone()).or_default().insert(id, tx.clone());
            }
        }
        let count = self.inner.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.signal_change();
        debug!(subscription = id, ?topics, subscribers = count, "Subscribed");

        Subscription {
            id,
            topics,
            receiver: rx,
            broker: Arc::clone(&self.inner),
            cancelled: false,
        }
    }

    /// Delivers `payload` to every current subscriber of `topic`.
    ///
    /// Never blocks. Returns how many subscribers received the event.
    pub fn publish(&self, topic: &str, payload: impl Into<Arc<str>>) -> usize {
        let channels = self.inner.topics.read();
        let Some(subscribers) = channels.get(topic) else {
            return 0;
        };
        let event = Event {
            topic: Arc::from(topic),
            payload: payload.into(),
        };

        let mut delivered = 0;
        for (id, tx) in subscribers {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(subscription = id, topic, "Subscriber buffer full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }

    /// Number of subscribers registered for `topic`.
    #[must_use]
    pub fn topic_subscribers(&self, topic: &str) -> usize {
        self.inner.topics.read().get(topic).map_or(0, HashMap::len)
    }

    /// Waits until the subscriber set changed since the last wait.
    pub async fn changed(&self) {
        self.inner.changed.notified().await;
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for EventBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroker")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

// ============================================
// Subscription
// ============================================

/// Receive side of one subscriber.
///
/// Dropping it cancels the subscription.
pub struct Subscription {
    id: u64,
    topics: Vec<String>,
    receiver: mpsc::Receiver<Event>,
    broker: Arc<Inner>,
    cancelled: bool,
}

impl Subscription {
    /// Waits for the next event.
    ///
    /// Returns `None` once cancelled and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Topics this subscription listens on.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Unregisters from every topic. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;

        {
            let mut channels = self.broker.topics.write();
            for topic in &self.topics {
                if let Some(subscribers) = channels.get_mut(topic) {
                    // Dropping the sender here closes the channel under the lock
                    subscribers.remove(&self.id);
                    if subscribers.is_empty() {
                        channels.remove(topic);
                    }
                }
            }
        }
        self.receiver.close();

        let count = self.broker.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
        self.broker.signal_change();
        debug!(subscription = self.id, subscribers = count, "Unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topics", &self.topics)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
