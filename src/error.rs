use std::fmt;

/// Crate-wide error type for operations that can fail internally.
///
/// The session manager surface never returns this type directly: failures there
/// are reported as `false`/`None` and logged. Each variant carries the message
/// of the module error it was converted from.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadError {
    PlatformError(String),
    StateTransitionError(String),
    EventStoreError(String),
    ConfigurationError(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::PlatformError(msg) => write!(f, "Platform error: {msg}"),
            UploadError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            UploadError::EventStoreError(msg) => write!(f, "Event store error: {msg}"),
            UploadError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<crate::platform::PlatformError> for UploadError {
    fn from(err: crate::platform::PlatformError) -> Self {
        UploadError::PlatformError(err.to_string())
    }
}

impl From<crate::session::task::StateTransitionError> for UploadError {
    fn from(err: crate::session::task::StateTransitionError) -> Self {
        UploadError::StateTransitionError(err.to_string())
    }
}

impl From<crate::config::ConfigurationError> for UploadError {
    fn from(err: crate::config::ConfigurationError) -> Self {
        UploadError::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
