//! Recorded HTTP interactions

use hyper::Uri;
use serde::{Deserialize, Serialize};

/// Hosts exempt from recording when the adapter ignores localhost
pub const LOCALHOST_ALIASES: [&str; 2] = ["localhost", "127.0.0.1"];

/// Request half of an interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRequest {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Absolute request URI
    pub uri: String,
    /// Request headers in wire order
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Create a request with no headers and an empty body
    #[must_use]
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Shorthand for a `GET` request
    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Response half of an interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in wire order
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl RecordedResponse {
    /// Create a response with no headers and an empty body
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// One request/response pair observed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Outbound request
    pub request: RecordedRequest,
    /// Response received for it
    pub response: RecordedResponse,
}

impl Interaction {
    /// Pair a request with its response
    #[must_use]
    pub fn new(request: RecordedRequest, response: RecordedResponse) -> Self {
        Self { request, response }
    }

    /// Build an interaction from `hyper` request/response values
    #[must_use]
    pub fn from_http(
        request: &hyper::Request<Vec<u8>>,
        response: &hyper::Response<Vec<u8>>,
    ) -> Self {
        Self {
            request: RecordedRequest {
                method: request.method().as_str().to_string(),
                uri: request.uri().to_string(),
                headers: header_pairs(request.headers()),
                body: request.body().clone(),
            },
            response: RecordedResponse {
                status: response.status().as_u16(),
                headers: header_pairs(response.headers()),
                body: response.body().clone(),
            },
        }
    }

    /// Target URI of the request
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.request.uri
    }

    /// Host component of the request URI, without scheme or port
    ///
    /// Returns `None` when the URI cannot be parsed or carries no authority.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        host_of(&self.request.uri)
    }

    /// Whether the request targets one of [`LOCALHOST_ALIASES`]
    #[must_use]
    pub fn targets_localhost(&self) -> bool {
        self.host().is_some_and(|host| is_localhost_alias(&host))
    }
}

/// Extract the host of a URI string
#[must_use]
pub fn host_of(uri: &str) -> Option<String> {
    let parsed: Uri = uri.parse().ok()?;
    parsed.host().map(str::to_string)
}

/// Check a bare host against [`LOCALHOST_ALIASES`]
#[must_use]
pub fn is_localhost_alias(host: &str) -> bool {
    LOCALHOST_ALIASES
        .iter()
        .any(|alias| alias.eq_ignore_ascii_case(host))
}

fn header_pairs(headers: &hyper::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
