pub mod publisher;
pub mod store;
pub mod types;

// Re-export key types for convenience
pub use publisher::{EventPublisher, PublishedEvent};
pub use store::LatestEventStore;
pub use types::UploadEvent;
