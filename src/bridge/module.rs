//! # Upload Module
//!
//! Application-facing surface of one facade: validates upload options, starts
//! tasks through the [`SessionManager`], and publishes prefixed events on a
//! broadcast channel while the application is observing.
//!
//! A module binds an [`UploadEventDelegate`] to the facade's session. When a
//! module is rebuilt (for example after the application layer reloads) it picks
//! up the delegate that is still bound instead of creating a second one, so
//! buffered responses and recorded events carry over.

use super::delegate::{EventEmitter, UploadEventDelegate};
use super::options::{BridgeError, UploadOptions};
use crate::constants::{event_name, events};
use crate::events::{EventPublisher, LatestEventStore, PublishedEvent, UploadEvent};
use crate::logging::log_error;
use crate::session::{SessionAttachment, SessionManager, SessionNamespace, TransferDelegate};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub struct UploadModule<N: SessionNamespace> {
    manager: SessionManager<N>,
    publisher: EventPublisher,
    listening: AtomicBool,
    delegate: Arc<UploadEventDelegate>,
}

impl<N: SessionNamespace> UploadModule<N> {
    /// Build the module for `manager`, creating the session when none exists
    pub fn new(manager: SessionManager<N>) -> Arc<Self> {
        let delegate = match Self::bound_delegate(&manager) {
            Some(delegate) => {
                debug!(namespace = N::NAME, "Reusing bound upload delegate");
                delegate
            }
            None => Self::attach_delegate(&manager),
        };

        let module = Arc::new(Self {
            publisher: EventPublisher::new(manager.config().event_channel_capacity),
            manager,
            listening: AtomicBool::new(false),
            delegate,
        });
        let emitter: Weak<dyn EventEmitter> = Arc::downgrade(&module) as Weak<dyn EventEmitter>;
        module.delegate.assign_emitter(emitter);
        module
    }

    fn bound_delegate(manager: &SessionManager<N>) -> Option<Arc<UploadEventDelegate>> {
        manager
            .get_delegate()?
            .into_any()
            .downcast::<UploadEventDelegate>()
            .ok()
    }

    fn attach_delegate(manager: &SessionManager<N>) -> Arc<UploadEventDelegate> {
        let config = manager.config();
        let store = match config.event_store_path() {
            Some(path) => LatestEventStore::open(path),
            None => LatestEventStore::in_memory(),
        };
        let delegate = Arc::new(UploadEventDelegate::new(
            N::EVENT_PREFIX,
            store,
            config.error_status_threshold,
        ));

        let bound: Arc<dyn TransferDelegate> = delegate.clone();
        match manager.create_session(bound) {
            SessionAttachment::Reused => warn!(
                namespace = N::NAME,
                "Session is bound to another live delegate; upload events will not reach this module"
            ),
            SessionAttachment::Unavailable(err) => log_error(
                "UploadModule",
                "create_session",
                &err.to_string(),
                Some(N::NAME),
            ),
            SessionAttachment::Created { rediscovered } => info!(
                namespace = N::NAME,
                rediscovered = rediscovered,
                "Upload module attached to new session"
            ),
            SessionAttachment::Reattached => info!(
                namespace = N::NAME,
                "Upload module reattached to existing session"
            ),
        }
        delegate
    }

    pub fn manager(&self) -> &SessionManager<N> {
        &self.manager
    }

    /// Validate `options` and start the upload they describe
    pub fn start_upload(&self, options: &Value) -> Result<(), BridgeError> {
        let options = UploadOptions::from_value(options)?;
        let (request, file) = options.to_request()?;

        if !self.manager.session_exists() {
            return Err(BridgeError::SessionMissing);
        }
        if !self
            .manager
            .create_task_with_request(&request, &file, &options.id)
        {
            return Err(BridgeError::TaskRejected(options.id));
        }
        Ok(())
    }

    /// Latest recorded event of each task, removed from the store. Tasks
    /// without a recorded event map to `None`.
    pub fn retrieve_events(&self, task_ids: &[String]) -> HashMap<String, Option<UploadEvent>> {
        self.delegate.retrieve_latest(task_ids)
    }

    pub fn start_observing(&self) {
        self.listening.store(true, Ordering::SeqCst);
        debug!(namespace = N::NAME, "Started observing upload events");
    }

    pub fn stop_observing(&self) {
        self.listening.store(false, Ordering::SeqCst);
        debug!(namespace = N::NAME, "Stopped observing upload events");
    }

    pub fn is_observing(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.publisher.subscribe()
    }

    /// Prefixed names of every event this module emits
    pub fn supported_events(&self) -> Vec<String> {
        events::ALL
            .iter()
            .map(|event_type| event_name(N::EVENT_PREFIX, event_type))
            .collect()
    }
}

impl<N: SessionNamespace> EventEmitter for UploadModule<N> {
    fn send_upload_update(&self, event_name: &str, event: &UploadEvent) -> bool {
        if !self.is_observing() {
            return false;
        }
        self.publisher.publish(event_name, event.clone())
    }
}

impl<N: SessionNamespace> Drop for UploadModule<N> {
    fn drop(&mut self) {
        debug!(namespace = N::NAME, "Upload module dropped");
    }
}
