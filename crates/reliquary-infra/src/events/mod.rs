//! Event bus
//!
//! [`Publisher`] fans every published event out to its listeners in
//! subscription order. Listeners are called synchronously on the publishing
//! task against a snapshot of the subscription list, so a listener may
//! subscribe or unsubscribe without deadlocking the bus. Listeners have no
//! way to report back to the producer.

mod listeners;

pub use listeners::{ChannelListener, LoggingListener, RecordingListener};

use reliquary_core::{Event, EventPayload};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "sub-{}", self.0)
    }
}

type Subscriptions = Vec<(SubscriptionId, Arc<dyn EventListener>)>;

#[derive(Default)]
struct PublisherInner {
    listeners: RwLock<Subscriptions>,
    next_id: AtomicU64,
}

/// Cheap to clone; clones share one subscription list.
#[derive(Clone, Default)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, listener));

        tracing::debug!(subscription = %id, "Event listener subscribed");
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        let removed = listeners.len() != before;

        if removed {
            tracing::debug!(subscription = %id, "Event listener unsubscribed");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Build the event for `payload` and deliver it to every listener.
    pub fn publish(&self, payload: EventPayload) -> Event {
        let event = Event::new(payload);
        let listeners = self.snapshot();

        tracing::trace!(
            event_id = %event.id,
            event = %event.name,
            listeners = listeners.len(),
            "Publishing event"
        );

        for (_, listener) in &listeners {
            listener.on_event(&event);
        }
        event
    }

    fn snapshot(&self) -> Subscriptions {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
