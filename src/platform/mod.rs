//! # Platform Transfer Seam
//!
//! The host platform owns the real background transfer service: it moves bytes
//! out of process, survives app suspension and relaunches the app to deliver
//! events. This module describes only what the session manager needs from it.
//!
//! ## Contract
//!
//! - Opening a session with an identifier the platform already tracks reattaches
//!   to it; its in-flight tasks are reported by [`PlatformSession::outstanding_tasks`].
//! - Every task carries the description it was created with (the application
//!   task ID) so events can be correlated after a relaunch.
//! - Events are delivered to the [`SessionEventSink`] from a platform-owned
//!   context, never synchronously from inside `open_session` or `upload_task`.

pub mod events;

use crate::transfer::{FileReference, UploadRequest};
use std::sync::Arc;
use std::time::Duration;

pub use events::{SessionEvent, SessionEventSink, TransferError, TransferProgress};

/// Platform-assigned task identifier, unique within one session
pub type PlatformTaskId = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("Platform refused to open session '{identifier}': {reason}")]
    SessionUnavailable { identifier: String, reason: String },

    #[error("Session '{identifier}' has been invalidated")]
    SessionInvalidated { identifier: String },

    #[error("File is not readable: {path}")]
    FileUnreadable { path: String },

    #[error("Unknown platform task {0}")]
    UnknownTask(PlatformTaskId),

    #[error("Task rejected: {0}")]
    Rejected(String),
}

/// Background session settings handed to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfiguration {
    pub identifier: String,
    /// Transfers continue while the app is suspended or terminated
    pub background: bool,
    pub sends_launch_events: bool,
    pub discretionary: bool,
    pub allows_cellular_access: bool,
    pub request_timeout: Duration,
    pub resource_timeout: Duration,
}

impl SessionConfiguration {
    pub fn background(identifier: impl Into<String>, config: &crate::config::UploadConfig) -> Self {
        Self {
            identifier: identifier.into(),
            background: true,
            sends_launch_events: config.sends_launch_events,
            discretionary: config.discretionary,
            allows_cellular_access: config.allows_cellular_access,
            request_timeout: config.request_timeout(),
            resource_timeout: config.resource_timeout(),
        }
    }
}

/// A task the platform is still tracking for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTaskInfo {
    pub task: PlatformTaskId,
    pub description: Option<String>,
    pub total_bytes_sent: u64,
}

/// Factory for background sessions
pub trait TransferPlatform: Send + Sync {
    fn open_session(
        &self,
        configuration: &SessionConfiguration,
        events: Arc<dyn SessionEventSink>,
    ) -> Result<Arc<dyn PlatformSession>, PlatformError>;
}

/// One open background session
pub trait PlatformSession: Send + Sync {
    fn identifier(&self) -> &str;

    /// Create a suspended upload task reading its body from `file`
    fn upload_task(
        &self,
        request: &UploadRequest,
        file: &FileReference,
        description: &str,
    ) -> Result<PlatformTaskId, PlatformError>;

    fn resume(&self, task: PlatformTaskId) -> Result<(), PlatformError>;

    /// Tasks created by any previous incarnation of this session that have not finished
    fn outstanding_tasks(&self) -> Vec<PlatformTaskInfo>;

    /// Stop accepting work. With `cancel_outstanding` running tasks are cancelled,
    /// otherwise they are allowed to finish first.
    fn invalidate(&self, cancel_outstanding: bool);
}
