//! # Transfer Delegate
//!
//! The application-supplied handler that receives transfer lifecycle events, and
//! the non-owning reference the session keeps to it.
//!
//! The application controls the delegate's lifetime. The session only holds a
//! [`Weak`] reference: once the application drops its delegate, event delivery
//! stops and the reference reports itself stale so a fresh delegate can be
//! attached (for example after an OS-triggered relaunch).

use crate::platform::{TransferError, TransferProgress};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Handler for transfer events, keyed by application task ID
pub trait TransferDelegate: Send + Sync {
    /// The server answered; body data may follow
    fn did_receive_response(&self, _task_id: &str, _status: u16) {}

    fn did_receive_data(&self, task_id: &str, data: &[u8]);

    fn did_send_body_data(&self, task_id: &str, progress: TransferProgress);

    /// Terminal event for a task. `error` is `None` when the transfer itself
    /// succeeded; `status` is the HTTP status if a response arrived.
    fn did_complete(&self, task_id: &str, status: Option<u16>, error: Option<&TransferError>);

    fn did_become_invalid(&self, _error: Option<&TransferError>) {}

    /// All events queued while in the background have been delivered
    fn did_finish_background_events(&self) {}

    /// Lets callers recover their concrete delegate from
    /// [`super::SessionManager::get_delegate`]; implementations return `self`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Weak back-reference from a session to its delegate
#[derive(Clone, Default)]
pub struct DelegateRef {
    inner: Option<Weak<dyn TransferDelegate>>,
}

impl DelegateRef {
    pub fn new(delegate: &Arc<dyn TransferDelegate>) -> Self {
        Self {
            inner: Some(Arc::downgrade(delegate)),
        }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    /// Strong reference if the delegate is still alive
    pub fn upgrade(&self) -> Option<Arc<dyn TransferDelegate>> {
        self.inner.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_live(&self) -> bool {
        self.inner
            .as_ref()
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    /// True when no live delegate is attached
    pub fn is_stale(&self) -> bool {
        !self.is_live()
    }
}

impl fmt::Debug for DelegateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner {
            None => "detached",
            Some(_) if self.is_live() => "live",
            Some(_) => "stale",
        };
        f.debug_struct("DelegateRef").field("state", &state).finish()
    }
}
