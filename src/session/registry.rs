//! # Session Handle Registry
//!
//! Owns the single active platform session of a facade and the weak reference to
//! its delegate. Creation is a check-then-act under one lock, so concurrent
//! callers can never open two sessions with the same identity. Work that must
//! not interleave with a session change (adopting rediscovered tasks, clearing
//! the task table, reserving a task ID) runs under the same lock.

use super::delegate::{DelegateRef, TransferDelegate};
use crate::platform::{PlatformError, PlatformSession};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The live platform session of a facade
#[derive(Clone)]
pub struct ActiveSession {
    pub identifier: String,
    /// Incremented on every open; stale platform events carry an older value
    pub generation: u64,
    pub handle: Arc<dyn PlatformSession>,
    pub opened_at: DateTime<Utc>,
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("identifier", &self.identifier)
            .field("generation", &self.generation)
            .field("handle", &"<Arc<dyn PlatformSession>>")
            .field("opened_at", &self.opened_at)
            .finish()
    }
}

/// What `create_session` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAttachment {
    /// A new handle was opened; `rediscovered` in-flight tasks were adopted
    Created { rediscovered: usize },
    /// A handle with a live delegate already existed; nothing changed
    Reused,
    /// A handle existed with a stale delegate; the new delegate was bound
    Reattached,
    /// The platform refused to open the session
    Unavailable(PlatformError),
}

impl SessionAttachment {
    /// True when a session with a live delegate is in place afterwards
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    session: Mutex<Option<ActiveSession>>,
    /// Generation of the most recently opened session, 0 before the first open
    latest_generation: AtomicU64,
    delegate: RwLock<DelegateRef>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn active(&self) -> Option<ActiveSession> {
        self.session.lock().clone()
    }

    pub fn handle(&self) -> Option<Arc<dyn PlatformSession>> {
        self.session.lock().as_ref().map(|s| Arc::clone(&s.handle))
    }

    /// Run `f` against the active session while holding the session lock
    pub fn with_active<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&ActiveSession) -> R,
    {
        self.session.lock().as_ref().map(f)
    }

    /// True when the active session carries `generation`
    pub fn is_active(&self, generation: u64) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    /// True when a session newer than `generation` has been opened since
    pub fn is_superseded(&self, generation: u64) -> bool {
        let latest = self.latest_generation.load(Ordering::Acquire);
        latest != 0 && latest != generation
    }

    /// Delegate bound to the active session, if it is still alive
    pub fn delegate(&self) -> Option<Arc<dyn TransferDelegate>> {
        if !self.exists() {
            return None;
        }
        self.delegate.read().upgrade()
    }

    /// Most recently bound delegate, whether or not a session is active
    pub fn last_delegate(&self) -> Option<Arc<dyn TransferDelegate>> {
        self.delegate.read().upgrade()
    }

    pub fn delegate_is_stale(&self) -> bool {
        self.delegate.read().is_stale()
    }

    /// Create-or-reuse, serialized on the session lock.
    ///
    /// `open` is only called when no handle exists; it receives the generation
    /// the new session will carry. `adopt` runs on the new session before it
    /// becomes visible and returns the number of rediscovered tasks.
    pub fn attach<F, A>(
        &self,
        delegate: &Arc<dyn TransferDelegate>,
        open: F,
        adopt: A,
    ) -> SessionAttachment
    where
        F: FnOnce(u64) -> Result<(String, Arc<dyn PlatformSession>), PlatformError>,
        A: FnOnce(&ActiveSession) -> usize,
    {
        let mut session = self.session.lock();

        if let Some(active) = session.as_ref() {
            let mut bound = self.delegate.write();
            if bound.is_stale() {
                *bound = DelegateRef::new(delegate);
                info!(
                    identifier = %active.identifier,
                    "Reattached delegate to existing session"
                );
                return SessionAttachment::Reattached;
            }
            debug!(
                identifier = %active.identifier,
                "Session already exists with a live delegate"
            );
            return SessionAttachment::Reused;
        }

        let generation = GENERATION.fetch_add(1, Ordering::Relaxed);
        match open(generation) {
            Ok((identifier, handle)) => {
                let active = ActiveSession {
                    identifier,
                    generation,
                    handle,
                    opened_at: Utc::now(),
                };
                let rediscovered = adopt(&active);
                *self.delegate.write() = DelegateRef::new(delegate);
                self.latest_generation.store(generation, Ordering::Release);
                *session = Some(active);
                SessionAttachment::Created { rediscovered }
            }
            Err(err) => SessionAttachment::Unavailable(err),
        }
    }

    /// Remove the active session. With `generation` set, only a session of that
    /// generation is removed. `cleanup` runs on the removed session before the
    /// lock is released.
    pub fn detach<C>(&self, generation: Option<u64>, cleanup: C) -> Option<ActiveSession>
    where
        C: FnOnce(&ActiveSession),
    {
        let mut session = self.session.lock();
        let removed = match (session.as_ref(), generation) {
            (Some(active), Some(expected)) if active.generation != expected => None,
            _ => session.take(),
        };
        if let Some(active) = removed.as_ref() {
            cleanup(active);
        }
        removed
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("session", &*self.session.lock())
            .field("delegate", &*self.delegate.read())
            .finish()
    }
}

/// Process-wide so generations never repeat across facades or instances
static GENERATION: AtomicU64 = AtomicU64::new(1);
