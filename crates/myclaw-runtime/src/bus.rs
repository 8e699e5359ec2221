//! Broadcast-based event bus.
//!
//! Publication is non-blocking and never fails into the publisher: with no
//! subscribers the event is simply dropped, and a panicking or lagging
//! subscriber task can only lose its own events. Per-receiver delivery is
//! FIFO in publish order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use myclaw_core::events::AgentEvent;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process publish/subscribe fan-out for [`AgentEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
    published: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers the event reached.
    pub fn publish(&self, event: AgentEvent) -> usize {
        let _ = self.published.fetch_add(1, Ordering::SeqCst);
        self.tx.send(event).unwrap_or(0)
    }

    /// Total events published so far. Subscribers use this to flush
    /// deterministically.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Subscribe to events published after this call. Dropping the receiver
    /// unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
