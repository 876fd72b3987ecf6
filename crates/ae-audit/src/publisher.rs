//! # Audit Publisher
//!
//! Defines the publishing side of the audit bus.

use crate::events::{AuditEvent, AuditFilter};
use crate::subscriber::{AuditStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait for publishing audit events.
///
/// Implementations must return promptly: publishing happens on the protocol
/// path and may never delay it.
pub trait AuditPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// The number of subscribers that will see the event.
    fn publish(&self, event: AuditEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the audit bus.
///
/// Uses `tokio::sync::broadcast`: sending never blocks and lagging receivers
/// lose the oldest events.
pub struct InMemoryAuditBus {
    /// Broadcast sender for events.
    sender: broadcast::Sender<AuditEvent>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryAuditBus {
    /// Create a new audit bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new audit bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: AuditFilter) -> Subscription {
        debug!(topics = ?filter.topics, modules = ?filter.modules, "Audit subscription created");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Get a stream of events matching a filter.
    #[must_use]
    pub fn stream(&self, filter: AuditFilter) -> AuditStream {
        AuditStream::new(self.sender.subscribe(), filter)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryAuditBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditPublisher for InMemoryAuditBus {
    fn publish(&self, event: AuditEvent) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();

        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(topic = ?topic, receivers, "Audit event published");
                receivers
            }
            Err(_) => {
                trace!(topic = ?topic, "Audit event dropped (no subscribers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
