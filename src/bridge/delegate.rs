//! # Event Recording Delegate
//!
//! A [`TransferDelegate`] that turns transfer callbacks into [`UploadEvent`]s.
//! Response bodies are buffered per task until completion, the latest event of
//! every task is kept in a [`LatestEventStore`], and each event is handed to the
//! attached [`EventEmitter`] when one is alive.

use crate::constants::event_name;
use crate::events::{LatestEventStore, UploadEvent};
use crate::platform::{TransferError, TransferProgress};
use crate::session::TransferDelegate;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Receiver of emitted events, usually the bridge module
pub trait EventEmitter: Send + Sync {
    /// Returns false when nobody is listening
    fn send_upload_update(&self, event_name: &str, event: &UploadEvent) -> bool;
}

#[derive(Debug, Default)]
struct ResponseState {
    status: Option<u16>,
    body: Vec<u8>,
}

pub struct UploadEventDelegate {
    event_prefix: &'static str,
    error_status_threshold: u16,
    responses: DashMap<String, ResponseState>,
    store: LatestEventStore,
    emitter: RwLock<Option<Weak<dyn EventEmitter>>>,
}

impl UploadEventDelegate {
    pub fn new(event_prefix: &'static str, store: LatestEventStore, error_status_threshold: u16) -> Self {
        Self {
            event_prefix,
            error_status_threshold,
            responses: DashMap::new(),
            store,
            emitter: RwLock::new(None),
        }
    }

    /// Route future events to `emitter`, replacing any previous one
    pub fn assign_emitter(&self, emitter: Weak<dyn EventEmitter>) {
        *self.emitter.write() = Some(emitter);
    }

    pub fn store(&self) -> &LatestEventStore {
        &self.store
    }

    /// Remove and return the latest event of each task, then persist the store
    pub fn retrieve_latest(&self, task_ids: &[String]) -> HashMap<String, Option<UploadEvent>> {
        let events = self.store.extract(task_ids);
        self.persist();
        events
    }

    fn persist(&self) {
        if let Err(err) = self.store.save() {
            error!(error = %err, "Failed to persist upload events");
        }
    }

    fn emit(&self, event: UploadEvent) {
        let name = event_name(self.event_prefix, event.event_type());
        self.store.record(event.clone());

        let emitter = self.emitter.read().as_ref().and_then(Weak::upgrade);
        match emitter {
            Some(emitter) => {
                if !emitter.send_upload_update(&name, &event) {
                    debug!(event = %name, task_id = event.task_id(), "No listeners; event kept for retrieval");
                }
            }
            None => debug!(event = %name, task_id = event.task_id(), "No bridge attached; event kept for retrieval"),
        }
    }

    fn completion_event(
        &self,
        task_id: &str,
        status: Option<u16>,
        error: Option<&TransferError>,
    ) -> UploadEvent {
        let response = self.responses.remove(task_id).map(|(_, response)| response);
        let status = status.or_else(|| response.as_ref().and_then(|r| r.status));
        let body = response.and_then(|r| String::from_utf8(r.body).ok());
        let had_request_error = status.is_some_and(|s| s >= self.error_status_threshold);

        match error {
            Some(err) if err.is_cancellation() => UploadEvent::Cancelled {
                id: task_id.to_string(),
                error: Some(err.to_string()),
            },
            Some(err) => UploadEvent::Error {
                id: task_id.to_string(),
                error: err.to_string(),
                status,
                body,
            },
            None if had_request_error => UploadEvent::Error {
                id: task_id.to_string(),
                error: format!("Request failed with status {}", status.unwrap_or_default()),
                status,
                body,
            },
            None => UploadEvent::Completed {
                id: task_id.to_string(),
                status,
                body,
            },
        }
    }
}

impl TransferDelegate for UploadEventDelegate {
    fn did_receive_response(&self, task_id: &str, status: u16) {
        self.responses.insert(
            task_id.to_string(),
            ResponseState {
                status: Some(status),
                body: Vec::new(),
            },
        );
    }

    fn did_receive_data(&self, task_id: &str, data: &[u8]) {
        self.responses
            .entry(task_id.to_string())
            .or_default()
            .body
            .extend_from_slice(data);
    }

    fn did_send_body_data(&self, task_id: &str, progress: TransferProgress) {
        self.emit(UploadEvent::Progress {
            id: task_id.to_string(),
            bytes_sent: progress.total_bytes_sent,
        });
    }

    fn did_complete(&self, task_id: &str, status: Option<u16>, error: Option<&TransferError>) {
        let event = self.completion_event(task_id, status, error);
        self.emit(event);
    }

    fn did_become_invalid(&self, _error: Option<&TransferError>) {
        self.persist();
    }

    fn did_finish_background_events(&self) {
        self.persist();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Drop for UploadEventDelegate {
    fn drop(&mut self) {
        self.persist();
    }
}
