//! # Transfer Inputs
//!
//! The request and file abstractions a task is built from. Request construction
//! (authentication, retries) happens before these types are created.

pub mod file;
pub mod request;

pub use file::{FileReference, FileReferenceError};
pub use request::{RequestError, UploadRequest};
