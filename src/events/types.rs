use crate::constants::events;
use serde::{Deserialize, Serialize};

/// Event surfaced to the application for one upload task.
///
/// Serialized with an `eventType` tag and the task under `ID`, the shape the
/// application layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "lowercase")]
pub enum UploadEvent {
    Progress {
        #[serde(rename = "ID")]
        id: String,
        #[serde(rename = "bytesSent")]
        bytes_sent: u64,
    },
    Completed {
        #[serde(rename = "ID")]
        id: String,
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Error {
        #[serde(rename = "ID")]
        id: String,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Cancelled {
        #[serde(rename = "ID")]
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl UploadEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Progress { id, .. }
            | Self::Completed { id, .. }
            | Self::Error { id, .. }
            | Self::Cancelled { id, .. } => id,
        }
    }

    /// Event type without namespace prefix
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Progress { .. } => events::PROGRESS,
            Self::Completed { .. } => events::COMPLETED,
            Self::Error { .. } => events::ERROR,
            Self::Cancelled { .. } => events::CANCELLED,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}
