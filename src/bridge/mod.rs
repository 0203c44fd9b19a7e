//! # Event Bridge
//!
//! Connects a facade's session to the application layer:
//!
//! - [`UploadOptions`] validates the loosely typed options of `start_upload`
//! - [`UploadEventDelegate`] turns transfer callbacks into [`crate::events::UploadEvent`]s
//!   and remembers the latest one per task
//! - [`UploadModule`] publishes those events while the application observes
//!
//! Event names are `<prefix>-<type>` where the prefix belongs to the facade,
//! e.g. `BGUpload-progress` or `HightroUploadService-completed`.

pub mod delegate;
pub mod module;
pub mod options;

pub use delegate::{EventEmitter, UploadEventDelegate};
pub use module::UploadModule;
pub use options::{BridgeError, UploadOptions};
