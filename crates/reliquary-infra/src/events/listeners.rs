use super::EventListener;
use reliquary_core::{Event, EventName};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Forwards events to a bounded channel for asynchronous consumers. Events are
/// dropped with a warning when the channel is full or closed.
pub struct ChannelListener {
    tx: mpsc::Sender<Event>,
}

impl ChannelListener {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &Event) {
        if let Err(e) = self.tx.try_send(event.clone()) {
            tracing::warn!(
                event_id = %event.id,
                event = %event.name,
                error = %e,
                "Dropping event for channel listener"
            );
        }
    }
}

/// Keeps every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn events_named(&self, name: EventName) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    pub fn count(&self, name: EventName) -> usize {
        self.events_named(name).len()
    }

    pub fn names(&self) -> Vec<EventName> {
        self.events().iter().map(|e| e.name).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Logs every event at info level, with the payload at debug level.
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &Event) {
        tracing::info!(
            event_id = %event.id,
            event = %event.name,
            published_at = %event.published_at,
            "Event published"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            match serde_json::to_string(&event.payload) {
                Ok(payload) => {
                    tracing::debug!(event_id = %event.id, payload = %payload, "Event payload")
                }
                Err(e) => tracing::debug!(
                    event_id = %event.id,
                    error = %e,
                    "Event payload not serializable"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_core::models::ResourceId;
    use reliquary_core::EventPayload;

    fn acl_deleted() -> Event {
        Event::new(EventPayload::AclDeleted {
            id: ResourceId::new("acl-1"),
            access_to: ResourceId::new("w-1"),
        })
    }

    #[tokio::test]
    async fn channel_listener_forwards_events() {
        let (listener, mut rx) = ChannelListener::new(4);
        let event = acl_deleted();
        listener.on_event(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
        assert_eq!(received.name, EventName::AclDeleted);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (listener, _rx) = ChannelListener::new(1);
        listener.on_event(&acl_deleted());
        listener.on_event(&acl_deleted());
    }

    #[test]
    fn recording_listener_filters_by_name() {
        let recorder = RecordingListener::new();
        recorder.on_event(&acl_deleted());
        LoggingListener.on_event(&acl_deleted());

        assert_eq!(recorder.count(EventName::AclDeleted), 1);
        assert_eq!(recorder.count(EventName::ObjectDeleted), 0);
        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
