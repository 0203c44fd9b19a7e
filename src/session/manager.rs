//! # Session Manager
//!
//! One generic manager, instantiated once per [`SessionNamespace`]. Each
//! instance owns a background session, its task table, the delegate reference
//! and the completion callback slot.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use background_upload::config::UploadConfig;
//! use background_upload::session::BgUploadManager;
//! use background_upload::testing::MockTransferPlatform;
//! use background_upload::transfer::{FileReference, UploadRequest};
//! use std::sync::Arc;
//!
//! # fn example(delegate: Arc<dyn background_upload::session::TransferDelegate>) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = BgUploadManager::install(Arc::new(MockTransferPlatform::new()), UploadConfig::default());
//! if !manager.session_exists() {
//!     manager.create_session(delegate);
//! }
//!
//! let request = UploadRequest::put("https://uploads.example.com/clip")?;
//! let file = FileReference::parse("file:///var/mobile/clip.mov")?;
//! assert!(manager.create_task_with_request(&request, &file, "clip-1"));
//! # Ok(())
//! # }
//! ```

use super::completion::{CompletionHandler, CompletionSlot};
use super::delegate::TransferDelegate;
use super::namespace::SessionNamespace;
use super::registry::{SessionAttachment, SessionRegistry};
use super::router::EventRouter;
use super::task::{TaskState, TaskTable};
use crate::config::UploadConfig;
use crate::logging::{log_error, log_session_operation, log_task_operation};
use crate::platform::{PlatformSession, SessionConfiguration, TransferPlatform};
use crate::transfer::{FileReference, UploadRequest};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// State shared between a manager and the event router it hands to the platform
pub(crate) struct SessionCore {
    pub(crate) namespace: &'static str,
    pub(crate) config: UploadConfig,
    pub(crate) platform: Arc<dyn TransferPlatform>,
    pub(crate) registry: SessionRegistry,
    pub(crate) tasks: TaskTable,
    pub(crate) completion: CompletionSlot,
}

pub struct SessionManager<N: SessionNamespace> {
    core: Arc<SessionCore>,
    _namespace: PhantomData<fn() -> N>,
}

impl<N: SessionNamespace> SessionManager<N> {
    /// Standalone manager. Most applications use [`Self::install`] instead.
    pub fn new(platform: Arc<dyn TransferPlatform>, config: UploadConfig) -> Self {
        Self {
            core: Arc::new(SessionCore {
                namespace: N::NAME,
                config,
                platform,
                registry: SessionRegistry::new(),
                tasks: TaskTable::new(),
                completion: CompletionSlot::new(),
            }),
            _namespace: PhantomData,
        }
    }

    /// Process-wide instance for this namespace, initialized on first call.
    /// Later calls return the existing instance and ignore their arguments.
    pub fn install(platform: Arc<dyn TransferPlatform>, config: UploadConfig) -> &'static Self {
        N::instance().get_or_init(|| {
            log_session_operation("install", N::NAME, None, "initialized", None);
            Self::new(platform, config)
        })
    }

    /// Process-wide instance, if [`Self::install`] has run
    pub fn global() -> Option<&'static Self> {
        N::instance().get()
    }

    pub fn namespace(&self) -> &'static str {
        N::NAME
    }

    pub fn config(&self) -> &UploadConfig {
        &self.core.config
    }

    /// Identifier of this facade's background session, stable across relaunches
    pub fn session_identifier(&self) -> String {
        self.core.config.session_identifier(N::NAME)
    }

    // Completion callback slot

    /// Store the OS "finish background work" callback, replacing any uninvoked one
    pub fn set_completion_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.core.completion.set(Arc::new(handler));
    }

    /// Current callback without clearing it
    pub fn get_completion_handler(&self) -> Option<CompletionHandler> {
        self.core.completion.get()
    }

    /// OS hook for a relaunch that delivers events of `identifier`. Stores the
    /// handler when the identifier belongs to this facade.
    pub fn handle_events_for_background_session<F>(&self, identifier: &str, handler: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        if identifier != self.session_identifier() {
            return false;
        }
        log_session_operation(
            "handle_background_events",
            N::NAME,
            Some(identifier),
            "handler_stored",
            None,
        );
        self.set_completion_handler(handler);
        true
    }

    /// Invoke and clear the completion callback. Returns whether one ran.
    pub fn finish_background_events(&self) -> bool {
        self.core.completion.consume()
    }

    // Session handle registry

    pub fn session_exists(&self) -> bool {
        self.core.registry.exists()
    }

    /// Create the background session bound to `delegate`, or reuse the existing
    /// one. On an existing session the delegate is only replaced when the bound
    /// one is no longer alive.
    pub fn create_session(&self, delegate: Arc<dyn TransferDelegate>) -> SessionAttachment {
        let identifier = self.session_identifier();
        let configuration = SessionConfiguration::background(identifier.clone(), &self.core.config);
        let core = Arc::downgrade(&self.core);
        let platform = Arc::clone(&self.core.platform);

        let attachment = self.core.registry.attach(
            &delegate,
            |generation| {
                let router = Arc::new(EventRouter::new(core, generation));
                let handle = platform.open_session(&configuration, router)?;
                Ok((identifier.clone(), handle))
            },
            |session| self.adopt_outstanding_tasks(session.handle.as_ref()),
        );

        if let SessionAttachment::Unavailable(err) = &attachment {
            log_error(
                "SessionManager",
                "create_session",
                &err.to_string(),
                Some(N::NAME),
            );
        }

        log_session_operation(
            "create_session",
            N::NAME,
            Some(&identifier),
            attachment_status(&attachment),
            None,
        );
        attachment
    }

    /// Delegate bound to the active session, if both exist and it is alive
    pub fn get_delegate(&self) -> Option<Arc<dyn TransferDelegate>> {
        self.core.registry.delegate()
    }

    /// Explicit teardown. The task table is cleared together with the detach;
    /// the platform session is invalidated outside the registry lock and
    /// outstanding tasks are cancelled when `cancel_outstanding`. Their terminal
    /// events still reach the last delegate. A pending completion callback runs
    /// afterwards.
    pub fn teardown(&self, cancel_outstanding: bool) -> bool {
        let Some(session) = self
            .core
            .registry
            .detach(None, |_| self.core.tasks.clear())
        else {
            return false;
        };
        session.handle.invalidate(cancel_outstanding);
        self.core.completion.consume();
        log_session_operation(
            "teardown",
            N::NAME,
            Some(&session.identifier),
            "invalidated",
            Some(if cancel_outstanding {
                "outstanding tasks cancelled"
            } else {
                "outstanding tasks finishing"
            }),
        );
        true
    }

    // Task factory

    /// Create and start an upload of `file` per `request`, tagged `task_id`.
    ///
    /// Returns false without side effects when no session exists, the ID is
    /// empty or already active, or the platform refuses the task.
    pub fn create_task_with_request(
        &self,
        request: &UploadRequest,
        file: &FileReference,
        task_id: &str,
    ) -> bool {
        if task_id.is_empty() {
            warn!(namespace = N::NAME, "Refusing upload task with an empty ID");
            return false;
        }

        let reserved = self.core.registry.with_active(|active| {
            self.core
                .tasks
                .reserve(task_id, request, file)
                .then(|| Arc::clone(&active.handle))
        });
        let session = match reserved {
            Some(Some(session)) => session,
            Some(None) => {
                warn!(
                    namespace = N::NAME,
                    task_id = %task_id,
                    "Task ID is already active in this session"
                );
                return false;
            }
            None => {
                warn!(
                    namespace = N::NAME,
                    task_id = %task_id,
                    "No active session; create_session must be called first"
                );
                return false;
            }
        };

        match self.schedule(session.as_ref(), request, file, task_id) {
            Ok(platform_task) => {
                log_task_operation(
                    "create",
                    N::NAME,
                    task_id,
                    Some(platform_task),
                    &TaskState::Sending.to_string(),
                    Some(request.url().as_str()),
                );
                true
            }
            Err(err) => {
                self.core.tasks.release(task_id);
                log_error("SessionManager", "create_task", &err.to_string(), Some(task_id));
                false
            }
        }
    }

    fn schedule(
        &self,
        session: &dyn PlatformSession,
        request: &UploadRequest,
        file: &FileReference,
        task_id: &str,
    ) -> crate::error::Result<u64> {
        let platform_task = session.upload_task(request, file, task_id)?;
        self.core.tasks.start(task_id, platform_task)?;
        session.resume(platform_task)?;
        Ok(platform_task)
    }

    /// Runs under the registry lock, before the new session is visible
    fn adopt_outstanding_tasks(&self, session: &dyn PlatformSession) -> usize {
        let mut adopted = 0;
        for info in session.outstanding_tasks() {
            match info.description.as_deref() {
                Some(task_id) if self.core.tasks.adopt(task_id, info.task, info.total_bytes_sent) => {
                    debug!(
                        namespace = N::NAME,
                        task_id = %task_id,
                        platform_task = info.task,
                        "Rediscovered in-flight task"
                    );
                    adopted += 1;
                }
                Some(task_id) => warn!(
                    namespace = N::NAME,
                    task_id = %task_id,
                    "Rediscovered task ID is already tracked"
                ),
                None => warn!(
                    namespace = N::NAME,
                    platform_task = info.task,
                    "Rediscovered task has no application ID"
                ),
            }
        }
        adopted
    }

    // Introspection

    pub fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.core.tasks.state(task_id)
    }

    pub fn active_task_ids(&self) -> Vec<String> {
        self.core.tasks.task_ids()
    }
}

fn attachment_status(attachment: &SessionAttachment) -> &'static str {
    match attachment {
        SessionAttachment::Created { .. } => "created",
        SessionAttachment::Reused => "reused",
        SessionAttachment::Reattached => "reattached",
        SessionAttachment::Unavailable(_) => "unavailable",
    }
}

/// Clones are handles to the same session state
impl<N: SessionNamespace> Clone for SessionManager<N> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            _namespace: PhantomData,
        }
    }
}

impl<N: SessionNamespace> fmt::Debug for SessionManager<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("namespace", &N::NAME)
            .field("registry", &self.core.registry)
            .field("active_tasks", &self.core.tasks.len())
            .field("completion", &self.core.completion)
            .finish()
    }
}
