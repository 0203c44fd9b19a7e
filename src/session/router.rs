//! # Delegate Router
//!
//! The [`SessionEventSink`] handed to the platform. It resolves platform task
//! handles to application task IDs, keeps the task table current, forwards every
//! event to the bound delegate and consumes the completion callback when the
//! session drains or becomes invalid. No other business logic happens here.
//!
//! Every router is tied to the generation of the session it was opened for:
//!
//! - active: the task table is updated and events reach the delegate
//! - detached (torn down or invalidated, nothing newer opened): events reach
//!   the last delegate so tasks ended by the teardown still report a terminal
//!   state, but the task table is left alone
//! - superseded (a newer session exists): task events for IDs the newer
//!   session tracks are dropped, and drain or invalidation signals are ignored

use super::delegate::TransferDelegate;
use super::manager::SessionCore;
use super::task::TaskState;
use crate::logging::log_task_operation;
use crate::platform::{PlatformTaskId, SessionEvent, SessionEventSink};
use std::sync::Weak;
use tracing::{debug, info, warn};

pub(crate) struct EventRouter {
    core: Weak<SessionCore>,
    generation: u64,
}

/// Where this router's session stands relative to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Active,
    Detached,
    Superseded,
}

impl EventRouter {
    pub(crate) fn new(core: Weak<SessionCore>, generation: u64) -> Self {
        Self { core, generation }
    }

    fn origin(&self, core: &SessionCore) -> Origin {
        if core.registry.is_active(self.generation) {
            Origin::Active
        } else if core.registry.is_superseded(self.generation) {
            Origin::Superseded
        } else {
            Origin::Detached
        }
    }

    fn route(&self, core: &SessionCore, event: SessionEvent) {
        let event_type = event.event_type();
        match event {
            SessionEvent::ReceivedResponse {
                task,
                description,
                status,
            } => {
                if let Some((task_id, _)) = self.resolve(core, task, description.as_deref(), event_type) {
                    deliver(core, event_type, |delegate| {
                        delegate.did_receive_response(&task_id, status)
                    });
                }
            }
            SessionEvent::ReceivedData {
                task,
                description,
                data,
            } => {
                if let Some((task_id, _)) = self.resolve(core, task, description.as_deref(), event_type) {
                    deliver(core, event_type, |delegate| {
                        delegate.did_receive_data(&task_id, &data)
                    });
                }
            }
            SessionEvent::SentBodyData {
                task,
                description,
                progress,
            } => {
                if let Some((task_id, origin)) =
                    self.resolve(core, task, description.as_deref(), event_type)
                {
                    if origin == Origin::Active {
                        core.tasks.record_progress(&task_id, progress.total_bytes_sent);
                    }
                    deliver(core, event_type, |delegate| {
                        delegate.did_send_body_data(&task_id, progress)
                    });
                }
            }
            SessionEvent::TaskCompleted {
                task,
                description,
                status,
                error,
            } => {
                let Some((task_id, origin)) =
                    self.resolve(core, task, description.as_deref(), event_type)
                else {
                    return;
                };
                let state = if origin == Origin::Active {
                    let finished = core.tasks.finish(&task_id, error.is_none());
                    if !finished.was_tracked {
                        debug!(
                            namespace = core.namespace,
                            task_id = %task_id,
                            "Completion for a task that was not tracked"
                        );
                    }
                    finished.state
                } else if error.is_none() {
                    TaskState::Completed
                } else {
                    TaskState::Failed
                };
                log_task_operation(
                    "complete",
                    core.namespace,
                    &task_id,
                    Some(task),
                    &state.to_string(),
                    error.as_ref().map(ToString::to_string).as_deref(),
                );
                deliver(core, event_type, |delegate| {
                    delegate.did_complete(&task_id, status, error.as_ref())
                });
            }
            SessionEvent::BecameInvalid { error } => {
                if self.ignore_superseded(core, event_type) {
                    return;
                }
                let detached = core.registry.detach(Some(self.generation), |session| {
                    info!(
                        namespace = core.namespace,
                        identifier = %session.identifier,
                        abandoned_tasks = core.tasks.len(),
                        "Session became invalid"
                    );
                    core.tasks.clear();
                });
                if detached.is_none() {
                    debug!(
                        namespace = core.namespace,
                        generation = self.generation,
                        "Invalidation of a session that was already detached"
                    );
                }
                deliver(core, event_type, |delegate| {
                    delegate.did_become_invalid(error.as_ref())
                });
                core.completion.consume();
            }
            SessionEvent::FinishedBackgroundEvents => {
                if self.ignore_superseded(core, event_type) {
                    return;
                }
                info!(
                    namespace = core.namespace,
                    "Platform finished delivering background events"
                );
                deliver(core, event_type, |delegate| {
                    delegate.did_finish_background_events()
                });
                core.completion.consume();
            }
        }
    }

    /// Session-level signals of a superseded session must not touch the state
    /// of the newer one
    fn ignore_superseded(&self, core: &SessionCore, event_type: &str) -> bool {
        if self.origin(core) != Origin::Superseded {
            return false;
        }
        debug!(
            namespace = core.namespace,
            generation = self.generation,
            event = event_type,
            "Ignoring signal of a superseded session"
        );
        true
    }

    /// Application task ID of a task event, with the origin of the session that
    /// reported it. Only the active session resolves through the task table;
    /// the others rely on the task description.
    fn resolve(
        &self,
        core: &SessionCore,
        task: PlatformTaskId,
        description: Option<&str>,
        event_type: &str,
    ) -> Option<(String, Origin)> {
        let origin = self.origin(core);
        let resolved = match origin {
            Origin::Active => core.tasks.resolve(task, description),
            Origin::Detached | Origin::Superseded => description.map(str::to_string),
        };
        let Some(task_id) = resolved else {
            warn!(
                namespace = core.namespace,
                platform_task = task,
                event = event_type,
                "Dropping event for a task without an application ID"
            );
            return None;
        };
        if origin == Origin::Superseded && core.tasks.contains(&task_id) {
            debug!(
                namespace = core.namespace,
                task_id = %task_id,
                generation = self.generation,
                event = event_type,
                "Dropping event of a superseded session for a task ID the active session owns"
            );
            return None;
        }
        Some((task_id, origin))
    }
}

impl SessionEventSink for EventRouter {
    fn handle_event(&self, event: SessionEvent) {
        match self.core.upgrade() {
            Some(core) => self.route(&core, event),
            None => debug!(
                event = event.event_type(),
                "Session manager dropped; ignoring platform event"
            ),
        }
    }
}

/// Run `f` against the most recently bound delegate, or log that the event was
/// dropped. Events of a detached session still reach it.
fn deliver<F>(core: &SessionCore, event_type: &str, f: F)
where
    F: FnOnce(&dyn TransferDelegate),
{
    match core.registry.last_delegate() {
        Some(delegate) => f(delegate.as_ref()),
        None => warn!(
            namespace = core.namespace,
            event = event_type,
            "No live delegate; event dropped"
        ),
    }
}
