//! # Upload Task Tracking
//!
//! Correlates application task IDs with platform task handles for the active
//! session, and tracks each task through
//! `Created -> Sending -> {Completed | Failed}`.
//!
//! A record exists from the moment a task ID is reserved until the platform
//! reports a terminal state; terminal records are removed, so an ID can be
//! reused once its previous task has finished.

use crate::platform::PlatformTaskId;
use crate::transfer::{FileReference, UploadRequest};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// ID reserved, platform task not yet started
    Created,
    /// Body is being transmitted by the platform
    Sending,
    Completed,
    Failed,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn transition(self, event: TaskEvent) -> Result<TaskState, StateTransitionError> {
        match (self, event) {
            (Self::Created, TaskEvent::Start) => Ok(Self::Sending),
            (Self::Sending, TaskEvent::Complete) => Ok(Self::Completed),
            (Self::Created | Self::Sending, TaskEvent::Fail) => Ok(Self::Failed),
            (from, event) => Err(StateTransitionError { from, event }),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Sending => write!(f, "sending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Events that can trigger task state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    Start,
    Complete,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid task transition from {from} on {event:?}")]
pub struct StateTransitionError {
    pub from: TaskState,
    pub event: TaskEvent,
}

/// Tracking entry for one upload
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub task_id: String,
    /// Owned by the platform session; `None` until the platform accepted the task
    pub platform_task: Option<PlatformTaskId>,
    /// `None` for tasks rediscovered after a relaunch
    pub request: Option<UploadRequest>,
    pub file: Option<FileReference>,
    pub state: TaskState,
    pub total_bytes_sent: u64,
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    fn reserved(task_id: &str, request: &UploadRequest, file: &FileReference) -> Self {
        Self {
            task_id: task_id.to_string(),
            platform_task: None,
            request: Some(request.clone()),
            file: Some(file.clone()),
            state: TaskState::Created,
            total_bytes_sent: 0,
            created_at: Utc::now(),
        }
    }

    fn rediscovered(task_id: &str, platform_task: PlatformTaskId, total_bytes_sent: u64) -> Self {
        Self {
            task_id: task_id.to_string(),
            platform_task: Some(platform_task),
            request: None,
            file: None,
            state: TaskState::Sending,
            total_bytes_sent,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of recording a terminal event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTask {
    pub task_id: String,
    pub state: TaskState,
    /// False when the task was not being tracked (already finished or unknown)
    pub was_tracked: bool,
}

/// Concurrent map of active tasks plus the platform-to-application index
#[derive(Debug, Default)]
pub struct TaskTable {
    records: DashMap<String, TaskRecord>,
    by_platform_task: DashMap<PlatformTaskId, String>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `task_id` in state `Created`. Fails if the ID is already active.
    pub fn reserve(&self, task_id: &str, request: &UploadRequest, file: &FileReference) -> bool {
        match self.records.entry(task_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(TaskRecord::reserved(task_id, request, file));
                true
            }
        }
    }

    /// Bind the platform handle to a reserved task and move it to `Sending`
    pub fn start(
        &self,
        task_id: &str,
        platform_task: PlatformTaskId,
    ) -> Result<(), StateTransitionError> {
        if let Some(mut record) = self.records.get_mut(task_id) {
            record.state = record.state.transition(TaskEvent::Start)?;
            record.platform_task = Some(platform_task);
            self.by_platform_task
                .insert(platform_task, task_id.to_string());
        }
        Ok(())
    }

    /// Drop a reservation the platform refused
    pub fn release(&self, task_id: &str) {
        if let Some((_, record)) = self.records.remove(task_id) {
            if let Some(platform_task) = record.platform_task {
                self.by_platform_task.remove(&platform_task);
            }
        }
    }

    /// Track a task found in the platform session after a relaunch.
    /// Returns false if the ID is already tracked.
    pub fn adopt(&self, task_id: &str, platform_task: PlatformTaskId, total_bytes_sent: u64) -> bool {
        match self.records.entry(task_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(TaskRecord::rediscovered(
                    task_id,
                    platform_task,
                    total_bytes_sent,
                ));
                self.by_platform_task
                    .insert(platform_task, task_id.to_string());
                true
            }
        }
    }

    /// Application task ID for a platform event, preferring the task description
    pub fn resolve(&self, platform_task: PlatformTaskId, description: Option<&str>) -> Option<String> {
        description
            .map(str::to_string)
            .or_else(|| self.by_platform_task.get(&platform_task).map(|id| id.clone()))
    }

    pub fn record_progress(&self, task_id: &str, total_bytes_sent: u64) {
        if let Some(mut record) = self.records.get_mut(task_id) {
            record.total_bytes_sent = total_bytes_sent;
        }
    }

    /// Apply the terminal event and forget the task
    pub fn finish(&self, task_id: &str, succeeded: bool) -> FinishedTask {
        let event = if succeeded {
            TaskEvent::Complete
        } else {
            TaskEvent::Fail
        };
        let terminal = if succeeded {
            TaskState::Completed
        } else {
            TaskState::Failed
        };

        match self.records.remove(task_id) {
            Some((_, record)) => {
                if let Some(platform_task) = record.platform_task {
                    self.by_platform_task.remove(&platform_task);
                }
                let state = record.state.transition(event).unwrap_or(terminal);
                FinishedTask {
                    task_id: task_id.to_string(),
                    state,
                    was_tracked: true,
                }
            }
            None => FinishedTask {
                task_id: task_id.to_string(),
                state: terminal,
                was_tracked: false,
            },
        }
    }

    pub fn state(&self, task_id: &str) -> Option<TaskState> {
        self.records.get(task_id).map(|record| record.state)
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.records.get(task_id).map(|record| record.clone())
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.records.contains_key(task_id)
    }

    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
        self.by_platform_task.clear();
    }
}
