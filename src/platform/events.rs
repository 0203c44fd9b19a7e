use super::PlatformTaskId;
use serde::{Deserialize, Serialize};

/// Failure reported by the platform for a single transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferError {
    /// Cancelled by the app, the user or the OS (force quit while in flight)
    #[error("cancelled")]
    Cancelled,

    #[error("The request timed out.")]
    TimedOut,

    #[error("{message}")]
    Network { code: i64, message: String },
}

impl TransferError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Body upload progress for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Bytes sent since the previous progress event
    pub bytes_sent: u64,
    pub total_bytes_sent: u64,
    /// Zero when the platform does not know the body length
    pub total_bytes_expected: u64,
}

impl TransferProgress {
    pub fn fraction(&self) -> Option<f64> {
        if self.total_bytes_expected == 0 {
            None
        } else {
            Some(self.total_bytes_sent as f64 / self.total_bytes_expected as f64)
        }
    }
}

/// Lifecycle events the platform delivers for a session.
///
/// Task events carry both the platform task id and the task description; the
/// description is the application task ID the task was created with.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ReceivedResponse {
        task: PlatformTaskId,
        description: Option<String>,
        status: u16,
    },
    ReceivedData {
        task: PlatformTaskId,
        description: Option<String>,
        data: Vec<u8>,
    },
    SentBodyData {
        task: PlatformTaskId,
        description: Option<String>,
        progress: TransferProgress,
    },
    TaskCompleted {
        task: PlatformTaskId,
        description: Option<String>,
        status: Option<u16>,
        error: Option<TransferError>,
    },
    BecameInvalid {
        error: Option<TransferError>,
    },
    /// Every event queued for the session while the app was in the background
    /// has been delivered
    FinishedBackgroundEvents,
}

impl SessionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReceivedResponse { .. } => "received_response",
            Self::ReceivedData { .. } => "received_data",
            Self::SentBodyData { .. } => "sent_body_data",
            Self::TaskCompleted { .. } => "task_completed",
            Self::BecameInvalid { .. } => "became_invalid",
            Self::FinishedBackgroundEvents => "finished_background_events",
        }
    }
}

/// Receiver the platform calls for every session event
pub trait SessionEventSink: Send + Sync {
    fn handle_event(&self, event: SessionEvent);
}
