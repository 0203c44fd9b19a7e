//! # Background Session Management
//!
//! ```text
//! SessionManager<N>
//! ├── CompletionSlot   (one-shot "background work finished" callback)
//! ├── SessionRegistry  (active platform session + weak delegate reference)
//! ├── TaskTable        (application task ID <-> platform task, task states)
//! └── EventRouter      (platform events -> delegate, drain -> completion)
//! ```
//!
//! Control flow: the application creates a session with its delegate, creates
//! tasks with a request/file/ID triple, the platform reports progress and
//! completion through the router, and the OS drain signal consumes the stored
//! completion callback exactly once.

pub mod completion;
pub mod delegate;
pub mod manager;
pub mod namespace;
pub mod registry;
mod router;
pub mod task;

pub use completion::{CompletionHandler, CompletionSlot};
pub use delegate::{DelegateRef, TransferDelegate};
pub use manager::SessionManager;
pub use namespace::{
    BgUpload, BgUploadManager, HightroSessionManager, HightroUpload, SessionNamespace,
    ShadowUpload, ShadowUploadManager,
};
pub use registry::{ActiveSession, SessionAttachment, SessionRegistry};
pub use task::{StateTransitionError, TaskEvent, TaskRecord, TaskState, TaskTable};
