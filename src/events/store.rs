//! # Latest Event Store
//!
//! Keeps the most recent event of every task so the application can catch up
//! on uploads that progressed or finished while it was not listening (JS
//! context reloaded, app relaunched in the background). Optionally persisted as
//! a JSON object keyed by task ID.

use super::types::UploadEvent;
use crate::error::{Result, UploadError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct LatestEventStore {
    events: Mutex<HashMap<String, UploadEvent>>,
    path: Option<PathBuf>,
}

impl LatestEventStore {
    /// Store without persistence
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let events = match Self::read(&path) {
            Ok(events) => events,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Starting with an empty event store");
                HashMap::new()
            }
        };
        debug!(path = %path.display(), restored = events.len(), "Opened event store");
        Self {
            events: Mutex::new(events),
            path: Some(path),
        }
    }

    fn read(path: &Path) -> Result<HashMap<String, UploadEvent>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read(path)
            .map_err(|e| UploadError::EventStoreError(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&contents)
            .map_err(|e| UploadError::EventStoreError(format!("decode {}: {e}", path.display())))
    }

    /// Replace the latest event of its task
    pub fn record(&self, event: UploadEvent) {
        self.events.lock().insert(event.task_id().to_string(), event);
    }

    pub fn latest(&self, task_id: &str) -> Option<UploadEvent> {
        self.events.lock().get(task_id).cloned()
    }

    /// Remove and return the latest event of each requested task
    pub fn extract(&self, task_ids: &[String]) -> HashMap<String, Option<UploadEvent>> {
        let mut events = self.events.lock();
        task_ids
            .iter()
            .map(|id| (id.clone(), events.remove(id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the current contents atomically (temp file + rename). No-op in memory.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let encoded = {
            let events = self.events.lock();
            serde_json::to_vec(&*events)
                .map_err(|e| UploadError::EventStoreError(format!("encode: {e}")))?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                UploadError::EventStoreError(format!("create {}: {e}", parent.display()))
            })?;
        }
        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, encoded)
            .map_err(|e| UploadError::EventStoreError(format!("write {}: {e}", temp.display())))?;
        std::fs::rename(&temp, path)
            .map_err(|e| UploadError::EventStoreError(format!("rename {}: {e}", path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(id: &str) -> UploadEvent {
        UploadEvent::Completed {
            id: id.to_string(),
            status: Some(200),
            body: None,
        }
    }

    #[test]
    fn test_record_keeps_latest_only() {
        let store = LatestEventStore::in_memory();
        store.record(UploadEvent::Progress {
            id: "u1".to_string(),
            bytes_sent: 5,
        });
        store.record(completed("u1"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.latest("u1"), Some(completed("u1")));
    }

    #[test]
    fn test_extract_removes_requested() {
        let store = LatestEventStore::in_memory();
        store.record(completed("u1"));
        store.record(completed("u2"));

        let extracted = store.extract(&["u1".to_string(), "missing".to_string()]);
        assert_eq!(extracted["u1"], Some(completed("u1")));
        assert_eq!(extracted["missing"], None);
        assert_eq!(store.len(), 1);
        assert!(store.latest("u1").is_none());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");

        let store = LatestEventStore::open(&path);
        store.record(completed("u1"));
        store.save().unwrap();

        let reopened = LatestEventStore::open(&path);
        assert_eq!(reopened.latest("u1"), Some(completed("u1")));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = LatestEventStore::open(&path);
        assert!(store.is_empty());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        assert!(LatestEventStore::in_memory().save().is_ok());
    }
}
