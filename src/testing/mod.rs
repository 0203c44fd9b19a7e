//! # Test Platform
//!
//! An in-process [`TransferPlatform`] that records every task and lets tests
//! play the part of the OS: deliver responses, progress and completions, drain
//! background events or invalidate a session.
//!
//! Session state is keyed by identifier and outlives the managers that opened
//! it, so dropping a manager and building a new one against the same platform
//! behaves like an app relaunch: unfinished tasks are reported as outstanding.
//!
//! ```rust
//! use background_upload::config::UploadConfig;
//! use background_upload::session::BgUploadManager;
//! use background_upload::testing::{MockTransferPlatform, RecordingDelegate};
//! use background_upload::transfer::{FileReference, UploadRequest};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = Arc::new(MockTransferPlatform::new());
//! let manager = BgUploadManager::new(platform.clone(), UploadConfig::default());
//! let delegate = Arc::new(RecordingDelegate::default());
//! manager.create_session(delegate.clone());
//!
//! let request = UploadRequest::put("https://uploads.example.com/u1")?;
//! let file = FileReference::parse("/tmp/u1.bin")?;
//! assert!(manager.create_task_with_request(&request, &file, "u1"));
//!
//! let identifier = manager.session_identifier();
//! platform.complete_task(&identifier, "u1", Some(200), None);
//! assert_eq!(delegate.completions().len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::platform::{
    PlatformError, PlatformSession, PlatformTaskId, PlatformTaskInfo, SessionConfiguration,
    SessionEvent, SessionEventSink, TransferError, TransferPlatform, TransferProgress,
};
use crate::session::TransferDelegate;
use crate::transfer::{FileReference, UploadRequest};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A task as the mock platform sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTask {
    pub task: PlatformTaskId,
    pub description: String,
    pub url: String,
    pub method: String,
    pub file: String,
    pub resumed: bool,
    pub total_bytes_sent: u64,
    pub finished: bool,
}

#[derive(Default)]
struct SessionState {
    sink: Option<Arc<dyn SessionEventSink>>,
    /// Sink of the previous open, kept to replay late events of that instance
    replaced_sink: Option<Arc<dyn SessionEventSink>>,
    configuration: Option<SessionConfiguration>,
    tasks: BTreeMap<PlatformTaskId, MockTask>,
    next_task: PlatformTaskId,
    invalidated: bool,
    invalidate_when_idle: bool,
    opens: usize,
}

impl SessionState {
    fn unfinished(&self, description: &str) -> Option<PlatformTaskId> {
        self.tasks
            .values()
            .rev()
            .find(|t| !t.finished && t.description == description)
            .map(|t| t.task)
    }

    fn has_unfinished(&self) -> bool {
        self.tasks.values().any(|t| !t.finished)
    }
}

type SharedState = Arc<Mutex<SessionState>>;

#[derive(Default)]
pub struct MockTransferPlatform {
    sessions: Mutex<HashMap<String, SharedState>>,
    fail_open: AtomicBool,
    require_existing_files: AtomicBool,
}

impl MockTransferPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `open_session` fail
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Reject upload tasks whose file does not exist
    pub fn set_require_existing_files(&self, require: bool) {
        self.require_existing_files.store(require, Ordering::SeqCst);
    }

    /// How often a session with `identifier` was opened
    pub fn open_count(&self, identifier: &str) -> usize {
        self.state(identifier).map(|s| s.lock().opens).unwrap_or(0)
    }

    pub fn configuration(&self, identifier: &str) -> Option<SessionConfiguration> {
        self.state(identifier).and_then(|s| s.lock().configuration.clone())
    }

    pub fn is_invalidated(&self, identifier: &str) -> bool {
        self.state(identifier)
            .map(|s| s.lock().invalidated)
            .unwrap_or(false)
    }

    /// Every task ever created in the session, in creation order
    pub fn tasks(&self, identifier: &str) -> Vec<MockTask> {
        self.state(identifier)
            .map(|s| s.lock().tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn outstanding(&self, identifier: &str) -> Vec<MockTask> {
        self.tasks(identifier)
            .into_iter()
            .filter(|t| !t.finished)
            .collect()
    }

    pub fn emit_response(&self, identifier: &str, description: &str, status: u16) -> bool {
        self.emit_task_event(identifier, description, |task, description| {
            SessionEvent::ReceivedResponse {
                task: task.task,
                description,
                status,
            }
        })
    }

    pub fn emit_data(&self, identifier: &str, description: &str, data: &[u8]) -> bool {
        self.emit_task_event(identifier, description, |task, description| {
            SessionEvent::ReceivedData {
                task: task.task,
                description,
                data: data.to_vec(),
            }
        })
    }

    /// Report `bytes_sent` more body bytes of `total_expected`
    pub fn emit_progress(
        &self,
        identifier: &str,
        description: &str,
        bytes_sent: u64,
        total_expected: u64,
    ) -> bool {
        self.emit_task_event(identifier, description, |task, description| {
            task.total_bytes_sent += bytes_sent;
            SessionEvent::SentBodyData {
                task: task.task,
                description,
                progress: TransferProgress {
                    bytes_sent,
                    total_bytes_sent: task.total_bytes_sent,
                    total_bytes_expected: total_expected,
                },
            }
        })
    }

    /// Finish the newest unfinished task with `description`
    pub fn complete_task(
        &self,
        identifier: &str,
        description: &str,
        status: Option<u16>,
        error: Option<TransferError>,
    ) -> bool {
        let Some(state) = self.state(identifier) else {
            return false;
        };
        let (sink, events) = {
            let mut guard = state.lock();
            let Some(id) = guard.unfinished(description) else {
                return false;
            };
            if let Some(task) = guard.tasks.get_mut(&id) {
                task.finished = true;
            }
            let mut events = vec![SessionEvent::TaskCompleted {
                task: id,
                description: Some(description.to_string()),
                status,
                error,
            }];
            if guard.invalidate_when_idle && !guard.has_unfinished() {
                guard.invalidate_when_idle = false;
                events.push(SessionEvent::BecameInvalid { error: None });
            }
            (guard.sink.clone(), events)
        };
        deliver(sink, events.into_iter())
    }

    /// The OS finished delivering queued events for `identifier`
    pub fn finish_background_events(&self, identifier: &str) -> bool {
        self.emit(identifier, SessionEvent::FinishedBackgroundEvents)
    }

    /// Platform-initiated invalidation, e.g. the OS tearing the session down
    pub fn invalidate(&self, identifier: &str, error: Option<TransferError>) -> bool {
        let Some(state) = self.state(identifier) else {
            return false;
        };
        state.lock().invalidated = true;
        self.emit(identifier, SessionEvent::BecameInvalid { error })
    }

    /// Deliver an arbitrary event to the current sink of `identifier`
    pub fn emit(&self, identifier: &str, event: SessionEvent) -> bool {
        let sink = self.state(identifier).and_then(|s| s.lock().sink.clone());
        deliver(sink, std::iter::once(event))
    }

    /// Deliver `event` through the sink the latest reopen of `identifier`
    /// replaced, as a late event of the earlier session instance
    pub fn emit_to_replaced(&self, identifier: &str, event: SessionEvent) -> bool {
        let sink = self
            .state(identifier)
            .and_then(|s| s.lock().replaced_sink.clone());
        deliver(sink, std::iter::once(event))
    }

    /// Platform task ID of the newest task with `description`
    pub fn task_id(&self, identifier: &str, description: &str) -> Option<PlatformTaskId> {
        self.tasks(identifier)
            .into_iter()
            .rev()
            .find(|t| t.description == description)
            .map(|t| t.task)
    }

    fn emit_task_event<F>(&self, identifier: &str, description: &str, build: F) -> bool
    where
        F: FnOnce(&mut MockTask, Option<String>) -> SessionEvent,
    {
        let Some(state) = self.state(identifier) else {
            return false;
        };
        let (sink, event) = {
            let mut guard = state.lock();
            let Some(id) = guard.unfinished(description) else {
                return false;
            };
            let sink = guard.sink.clone();
            let Some(task) = guard.tasks.get_mut(&id) else {
                return false;
            };
            (sink, build(task, Some(description.to_string())))
        };
        deliver(sink, std::iter::once(event))
    }

    fn state(&self, identifier: &str) -> Option<SharedState> {
        self.sessions.lock().get(identifier).cloned()
    }
}

fn deliver(
    sink: Option<Arc<dyn SessionEventSink>>,
    events: impl Iterator<Item = SessionEvent>,
) -> bool {
    let Some(sink) = sink else {
        return false;
    };
    for event in events {
        sink.handle_event(event);
    }
    true
}

impl TransferPlatform for MockTransferPlatform {
    fn open_session(
        &self,
        configuration: &SessionConfiguration,
        events: Arc<dyn SessionEventSink>,
    ) -> Result<Arc<dyn PlatformSession>, PlatformError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PlatformError::SessionUnavailable {
                identifier: configuration.identifier.clone(),
                reason: "session creation disabled".to_string(),
            });
        }

        let state = Arc::clone(
            self.sessions
                .lock()
                .entry(configuration.identifier.clone())
                .or_default(),
        );
        {
            let mut guard = state.lock();
            guard.replaced_sink = guard.sink.replace(events);
            guard.configuration = Some(configuration.clone());
            guard.invalidated = false;
            guard.invalidate_when_idle = false;
            guard.opens += 1;
            debug!(
                identifier = %configuration.identifier,
                opens = guard.opens,
                "Mock platform opened session"
            );
        }

        Ok(Arc::new(MockSession {
            identifier: configuration.identifier.clone(),
            state,
            require_existing_files: self.require_existing_files.load(Ordering::SeqCst),
        }))
    }
}

struct MockSession {
    identifier: String,
    state: SharedState,
    require_existing_files: bool,
}

impl PlatformSession for MockSession {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn upload_task(
        &self,
        request: &UploadRequest,
        file: &FileReference,
        description: &str,
    ) -> Result<PlatformTaskId, PlatformError> {
        if self.require_existing_files && !file.is_readable() {
            return Err(PlatformError::FileUnreadable {
                path: file.to_string(),
            });
        }
        let mut guard = self.state.lock();
        if guard.invalidated {
            return Err(PlatformError::SessionInvalidated {
                identifier: self.identifier.clone(),
            });
        }
        guard.next_task += 1;
        let task = guard.next_task;
        guard.tasks.insert(
            task,
            MockTask {
                task,
                description: description.to_string(),
                url: request.url().to_string(),
                method: request.method().to_string(),
                file: file.to_string(),
                resumed: false,
                total_bytes_sent: 0,
                finished: false,
            },
        );
        Ok(task)
    }

    fn resume(&self, task: PlatformTaskId) -> Result<(), PlatformError> {
        match self.state.lock().tasks.get_mut(&task) {
            Some(t) => {
                t.resumed = true;
                Ok(())
            }
            None => Err(PlatformError::UnknownTask(task)),
        }
    }

    fn outstanding_tasks(&self) -> Vec<PlatformTaskInfo> {
        self.state
            .lock()
            .tasks
            .values()
            .filter(|t| !t.finished)
            .map(|t| PlatformTaskInfo {
                task: t.task,
                description: Some(t.description.clone()),
                total_bytes_sent: t.total_bytes_sent,
            })
            .collect()
    }

    fn invalidate(&self, cancel_outstanding: bool) {
        let (sink, events) = {
            let mut guard = self.state.lock();
            if guard.invalidated {
                return;
            }
            guard.invalidated = true;
            let mut events = Vec::new();
            if cancel_outstanding {
                for task in guard.tasks.values_mut().filter(|t| !t.finished) {
                    task.finished = true;
                    events.push(SessionEvent::TaskCompleted {
                        task: task.task,
                        description: Some(task.description.clone()),
                        status: None,
                        error: Some(TransferError::Cancelled),
                    });
                }
            }
            if guard.has_unfinished() {
                guard.invalidate_when_idle = true;
            } else {
                events.push(SessionEvent::BecameInvalid { error: None });
            }
            (guard.sink.clone(), events)
        };
        deliver(sink, events.into_iter());
    }
}

/// One callback as seen by [`RecordingDelegate`]
#[derive(Debug, Clone, PartialEq)]
pub enum DelegateCall {
    Response { task_id: String, status: u16 },
    Data { task_id: String, data: Vec<u8> },
    Progress { task_id: String, progress: TransferProgress },
    Completed {
        task_id: String,
        status: Option<u16>,
        error: Option<TransferError>,
    },
    BecameInvalid,
    FinishedBackgroundEvents,
}

/// Delegate that records every callback in order
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    calls: Mutex<Vec<DelegateCall>>,
}

impl RecordingDelegate {
    pub fn calls(&self) -> Vec<DelegateCall> {
        self.calls.lock().clone()
    }

    pub fn completions(&self) -> Vec<DelegateCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, DelegateCall::Completed { .. }))
            .cloned()
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&DelegateCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    fn push(&self, call: DelegateCall) {
        self.calls.lock().push(call);
    }
}

impl TransferDelegate for RecordingDelegate {
    fn did_receive_response(&self, task_id: &str, status: u16) {
        self.push(DelegateCall::Response {
            task_id: task_id.to_string(),
            status,
        });
    }

    fn did_receive_data(&self, task_id: &str, data: &[u8]) {
        self.push(DelegateCall::Data {
            task_id: task_id.to_string(),
            data: data.to_vec(),
        });
    }

    fn did_send_body_data(&self, task_id: &str, progress: TransferProgress) {
        self.push(DelegateCall::Progress {
            task_id: task_id.to_string(),
            progress,
        });
    }

    fn did_complete(&self, task_id: &str, status: Option<u16>, error: Option<&TransferError>) {
        self.push(DelegateCall::Completed {
            task_id: task_id.to_string(),
            status,
            error: error.cloned(),
        });
    }

    fn did_become_invalid(&self, _error: Option<&TransferError>) {
        self.push(DelegateCall::BecameInvalid);
    }

    fn did_finish_background_events(&self) {
        self.push(DelegateCall::FinishedBackgroundEvents);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;

    struct CountingSink(Mutex<Vec<&'static str>>);

    impl SessionEventSink for CountingSink {
        fn handle_event(&self, event: SessionEvent) {
            self.0.lock().push(event.event_type());
        }
    }

    fn open(platform: &MockTransferPlatform, sink: &Arc<CountingSink>) -> Arc<dyn PlatformSession> {
        let configuration = SessionConfiguration::background("mock.test", &UploadConfig::default());
        platform
            .open_session(&configuration, Arc::clone(sink) as Arc<dyn SessionEventSink>)
            .unwrap()
    }

    fn upload(session: &dyn PlatformSession, description: &str) -> PlatformTaskId {
        let request = UploadRequest::put("https://uploads.example.com/x").unwrap();
        let file = FileReference::from_path("/tmp/x.bin");
        session.upload_task(&request, &file, description).unwrap()
    }

    #[test]
    fn test_tasks_survive_reopen() {
        let platform = MockTransferPlatform::new();
        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        let first = open(&platform, &sink);
        let task = upload(first.as_ref(), "a");
        first.resume(task).unwrap();

        let second = open(&platform, &sink);
        assert_eq!(platform.open_count("mock.test"), 2);
        let outstanding = second.outstanding_tasks();
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding[0].description.as_deref(), Some("a"));
    }

    #[test]
    fn test_cancelling_invalidation_reports_each_task() {
        let platform = MockTransferPlatform::new();
        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        let session = open(&platform, &sink);
        upload(session.as_ref(), "a");
        upload(session.as_ref(), "b");

        session.invalidate(true);
        assert_eq!(
            *sink.0.lock(),
            vec!["task_completed", "task_completed", "became_invalid"]
        );
        assert!(platform.outstanding("mock.test").is_empty());
    }

    #[test]
    fn test_graceful_invalidation_waits_for_tasks() {
        let platform = MockTransferPlatform::new();
        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        let session = open(&platform, &sink);
        upload(session.as_ref(), "a");

        session.invalidate(false);
        assert!(sink.0.lock().is_empty());
        assert!(platform.complete_task("mock.test", "a", Some(200), None));
        assert_eq!(*sink.0.lock(), vec!["task_completed", "became_invalid"]);
    }

    #[test]
    fn test_missing_file_rejected_when_required() {
        let platform = MockTransferPlatform::new();
        platform.set_require_existing_files(true);
        let sink = Arc::new(CountingSink(Mutex::new(Vec::new())));
        let session = open(&platform, &sink);
        let request = UploadRequest::put("https://uploads.example.com/x").unwrap();
        let file = FileReference::from_path("/definitely/not/here.bin");
        assert!(matches!(
            session.upload_task(&request, &file, "a"),
            Err(PlatformError::FileUnreadable { .. })
        ));
    }
}
