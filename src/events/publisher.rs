use super::types::UploadEvent;
use tokio::sync::broadcast;

/// Broadcast publisher for upload events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    /// Prefixed name, e.g. `BGUpload-completed`
    pub name: String,
    pub event: UploadEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns whether at least one receiver got it; having
    /// no receivers is not an error.
    pub fn publish(&self, name: impl Into<String>, event: UploadEvent) -> bool {
        let published = PublishedEvent {
            name: name.into(),
            event,
            published_at: chrono::Utc::now(),
        };
        self.sender.send(published).is_ok()
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::bridge::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
