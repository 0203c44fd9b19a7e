//! Validation of the loosely typed upload options the application layer sends.

use crate::transfer::{FileReference, UploadRequest};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Option '{0}' must be a string")]
    NotAString(&'static str),

    #[error("Option 'headers' must be an object with type {{ [header: string]: string | number }}")]
    InvalidHeaders,

    #[error("Upload URL is invalid, you may not have added a URI protocol prefix")]
    InvalidUrl,

    #[error("Storage location is invalid, you may not have added a URI protocol prefix")]
    InvalidStorageLocation,

    #[error("Method '{0}' is not a valid HTTP method")]
    InvalidMethod(String),

    #[error("Header '{0}' is not a valid HTTP header")]
    InvalidHeader(String),

    #[error("Target session does not exist.")]
    SessionMissing,

    #[error("Upload '{0}' could not be scheduled; its ID may already be in use")]
    TaskRejected(String),
}

/// Options for one upload, as received from the application layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub url: String,
    pub path: String,
    pub method: String,
    pub id: String,
    pub headers: Vec<(String, String)>,
}

impl UploadOptions {
    /// Validate a JSON options object. Header values must be strings or
    /// integers; other value types are skipped.
    pub fn from_value(options: &Value) -> Result<Self, BridgeError> {
        let url = string_option(options, "url")?;
        let path = string_option(options, "path")?;
        let method = string_option(options, "method")?;
        let id = string_option(options, "ID")?;
        let header_object = options
            .get("headers")
            .and_then(Value::as_object)
            .ok_or(BridgeError::InvalidHeaders)?;

        let mut headers = Vec::with_capacity(header_object.len());
        for (name, value) in header_object {
            match value {
                Value::String(s) => headers.push((name.clone(), s.clone())),
                Value::Number(n) if n.is_i64() || n.is_u64() => {
                    headers.push((name.clone(), n.to_string()))
                }
                other => debug!(header = %name, value = %other, "Skipping non string/integer header"),
            }
        }

        Ok(Self {
            url,
            path,
            method,
            id,
            headers,
        })
    }

    /// Resolve into the request and file reference a task is created from
    pub fn to_request(&self) -> Result<(UploadRequest, FileReference), BridgeError> {
        let mut request =
            UploadRequest::with_method_name(&self.url, &self.method).map_err(|err| match err {
                crate::transfer::RequestError::InvalidMethod(m) => BridgeError::InvalidMethod(m),
                _ => BridgeError::InvalidUrl,
            })?;
        for (name, value) in &self.headers {
            request
                .set_header(name, value)
                .map_err(|_| BridgeError::InvalidHeader(name.clone()))?;
        }
        let file =
            FileReference::parse(&self.path).map_err(|_| BridgeError::InvalidStorageLocation)?;
        Ok((request, file))
    }
}

fn string_option(options: &Value, name: &'static str) -> Result<String, BridgeError> {
    options
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(BridgeError::NotAString(name))
}
