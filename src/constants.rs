//! # System Constants
//!
//! Event names, file names and platform defaults shared by the session manager
//! and the event bridge.

/// Upload event type names, appended to a namespace prefix (`BGUpload-progress`).
pub mod events {
    pub const PROGRESS: &str = "progress";
    pub const COMPLETED: &str = "completed";
    pub const ERROR: &str = "error";
    pub const CANCELLED: &str = "cancelled";

    /// Every event type a bridge module can emit, in registration order.
    pub const ALL: [&str; 4] = [PROGRESS, CANCELLED, ERROR, COMPLETED];
}

/// Defaults for the background session configuration
pub mod session {
    pub const DEFAULT_IDENTIFIER_PREFIX: &str = "background-upload";
    pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;
    /// Seven days, the longest a background resource is allowed to take
    pub const DEFAULT_RESOURCE_TIMEOUT_SECONDS: u64 = 7 * 24 * 60 * 60;
}

/// Event bridge defaults
pub mod bridge {
    /// File holding the latest event per task between launches
    pub const EVENT_STORE_FILE: &str = "events.json";
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;
    /// Responses at or above this status complete as `error`
    pub const DEFAULT_ERROR_STATUS_THRESHOLD: u16 = 300;
    pub const SESSION_MISSING_MESSAGE: &str = "Target session does not exist.";
}

/// Builds the emitted event name for a namespace prefix and event type
pub fn event_name(prefix: &str, event_type: &str) -> String {
    format!("{prefix}-{event_type}")
}
