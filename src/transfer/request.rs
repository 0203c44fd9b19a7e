//! Ready-to-send upload request: destination, method and resolved headers.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    url: Url,
    method: Method,
    headers: HeaderMap,
}

impl UploadRequest {
    pub fn new(url: Url, method: Method) -> Self {
        Self {
            url,
            method,
            headers: HeaderMap::new(),
        }
    }

    /// `PUT` request to an absolute URL
    pub fn put(url: &str) -> Result<Self, RequestError> {
        Ok(Self::new(parse_url(url)?, Method::PUT))
    }

    /// `POST` request to an absolute URL
    pub fn post(url: &str) -> Result<Self, RequestError> {
        Ok(Self::new(parse_url(url)?, Method::POST))
    }

    /// Parses the method name case-sensitively, as HTTP does
    pub fn with_method_name(url: &str, method: &str) -> Result<Self, RequestError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| RequestError::InvalidMethod(method.to_string()))?;
        Ok(Self::new(parse_url(url)?, method))
    }

    /// Sets a header, replacing any previous value for the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, RequestError> {
        self.set_header(name, value)?;
        Ok(self)
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), RequestError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| RequestError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

fn parse_url(url: &str) -> Result<Url, RequestError> {
    let parsed = Url::parse(url).map_err(|e| RequestError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.cannot_be_a_base() {
        return Err(RequestError::InvalidUrl {
            url: url.to_string(),
            reason: "not a hierarchical URL".to_string(),
        });
    }
    Ok(parsed)
}
