#![allow(dead_code)]

use background_upload::config::UploadConfig;
use background_upload::session::{SessionManager, SessionNamespace};
use background_upload::testing::{MockTransferPlatform, RecordingDelegate};
use background_upload::transfer::{FileReference, UploadRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct Harness<N: SessionNamespace> {
    pub platform: Arc<MockTransferPlatform>,
    pub manager: SessionManager<N>,
}

impl<N: SessionNamespace> Harness<N> {
    pub fn new() -> Self {
        Self::with_config(UploadConfig::default())
    }

    pub fn with_config(config: UploadConfig) -> Self {
        let platform = Arc::new(MockTransferPlatform::new());
        let manager = SessionManager::new(platform.clone(), config);
        Self { platform, manager }
    }

    /// A second manager against the same platform, as after an app relaunch
    pub fn relaunch(&self) -> SessionManager<N> {
        SessionManager::new(self.platform.clone(), self.manager.config().clone())
    }

    pub fn identifier(&self) -> String {
        self.manager.session_identifier()
    }

    pub fn with_session(self) -> (Self, Arc<RecordingDelegate>) {
        let delegate = Arc::new(RecordingDelegate::default());
        assert!(self.manager.create_session(delegate.clone()).is_attached());
        (self, delegate)
    }

    pub fn upload(&self, task_id: &str) -> bool {
        upload_with(&self.manager, task_id)
    }
}

pub fn upload_with<N: SessionNamespace>(manager: &SessionManager<N>, task_id: &str) -> bool {
    let request = UploadRequest::put(&format!("https://uploads.example.com/{task_id}"))
        .expect("valid upload URL");
    let file = FileReference::from_path(format!("/tmp/{task_id}.bin"));
    manager.create_task_with_request(&request, &file, task_id)
}

/// Completion handler that counts its invocations
pub fn counting_handler() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn invocations(count: &AtomicUsize) -> usize {
    count.load(Ordering::SeqCst)
}
