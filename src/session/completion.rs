//! # Completion Callback Slot
//!
//! Holds the one callback the OS hands over when it relaunches (or wakes) the app
//! to finish background transfers. The callback tells the OS the app is done and
//! may be suspended again, so it must run at most once per registration.
//!
//! Consumption is a take-and-clear under the slot's lock: whichever drain signal
//! wins the lock takes the callback, every other signal finds the slot empty.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Zero-argument "background work finished" callback
pub type CompletionHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct CompletionSlot {
    handler: Mutex<Option<CompletionHandler>>,
}

impl CompletionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler`, replacing any uninvoked one (last writer wins)
    pub fn set(&self, handler: CompletionHandler) {
        let previous = self.handler.lock().replace(handler);
        if previous.is_some() {
            warn!("Replacing an uninvoked background completion handler");
        }
    }

    /// Current handler without clearing it
    pub fn get(&self) -> Option<CompletionHandler> {
        self.handler.lock().clone()
    }

    pub fn is_set(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Remove the handler, if any
    pub fn take(&self) -> Option<CompletionHandler> {
        self.handler.lock().take()
    }

    /// Take the handler and run it. Returns whether a handler ran.
    ///
    /// The lock is released before the handler runs, so a handler may register
    /// its successor.
    pub fn consume(&self) -> bool {
        match self.take() {
            Some(handler) => {
                debug!("Invoking background completion handler");
                handler();
                true
            }
            None => {
                debug!("No background completion handler registered");
                false
            }
        }
    }
}

impl fmt::Debug for CompletionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSlot")
            .field("handler", &self.is_set())
            .finish()
    }
}
