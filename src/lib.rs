#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Background Upload Core
//!
//! Session management for uploads that keep running while the application is
//! suspended or terminated.
//!
//! ## Overview
//!
//! The host platform moves the bytes; this crate owns everything around it:
//! one background session per facade, the mapping between application task IDs
//! and platform tasks, routing of lifecycle events to the application delegate,
//! and the one-shot callback the OS hands over when it relaunches the app to
//! deliver queued events.
//!
//! ## Architecture
//!
//! A single generic [`session::SessionManager`] is instantiated per
//! [`session::SessionNamespace`]. Facades embedded in the same process (for
//! example [`session::BgUploadManager`] and [`session::HightroSessionManager`])
//! never share session identity, task tables or completion callbacks.
//!
//! ## Module Organization
//!
//! - [`session`] - Completion slot, session registry, task table and event routing
//! - [`platform`] - Traits the host transfer service implements
//! - [`transfer`] - Upload request and file reference types
//! - [`bridge`] - Option validation, event recording and publishing
//! - [`events`] - Upload events, broadcast publisher and latest-event store
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//! - [`testing`] - In-process platform for tests and examples
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use background_upload::config::UploadConfig;
//! use background_upload::session::BgUploadManager;
//! use background_upload::testing::MockTransferPlatform;
//! use background_upload::transfer::{FileReference, UploadRequest};
//! use std::sync::Arc;
//!
//! # fn example(delegate: Arc<dyn background_upload::session::TransferDelegate>) -> Result<(), Box<dyn std::error::Error>> {
//! background_upload::logging::init_structured_logging();
//!
//! let config = UploadConfig::load(None)?;
//! let manager = BgUploadManager::install(Arc::new(MockTransferPlatform::new()), config);
//!
//! // OS relaunch hook
//! manager.handle_events_for_background_session(&manager.session_identifier(), || {
//!     println!("background work finished");
//! });
//!
//! if !manager.session_exists() {
//!     manager.create_session(delegate);
//! }
//! let request = UploadRequest::put("https://uploads.example.com/clip")?;
//! let file = FileReference::parse("file:///var/mobile/clip.mov")?;
//! manager.create_task_with_request(&request, &file, "clip-1");
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod platform;
pub mod session;
pub mod testing;
pub mod transfer;

pub use bridge::{BridgeError, UploadModule};
pub use config::UploadConfig;
pub use error::{Result, UploadError};
pub use events::UploadEvent;
pub use platform::{PlatformSession, TransferPlatform};
pub use session::{
    BgUploadManager, HightroSessionManager, SessionAttachment, SessionManager, SessionNamespace,
    ShadowUploadManager, TransferDelegate,
};
pub use transfer::{FileReference, UploadRequest};
