use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde_json::json;

/// A request the bridge refuses before talking to Gemini.
#[derive(Debug, Clone)]
pub struct ProxyError {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ProxyError {
    /// Builds an OpenAI-style `{"error": {...}}` body.
    pub fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        let body = json!({
            "error": {
                "message": message.into(),
                "type": kind,
                "code": status.as_u16(),
            }
        });
        Self {
            status,
            body: Bytes::from(body.to_string()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found_error", message)
    }
}

/// An upstream failure forwarded to the client as-is.
#[derive(Debug, Clone)]
pub struct UpstreamPassthroughError {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamPassthroughError {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Network-level failure with no upstream response to forward.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        let proxy = ProxyError::new(StatusCode::SERVICE_UNAVAILABLE, "upstream_error", message);
        Self::new(proxy.status, HeaderMap::new(), proxy.body)
    }
}

impl fmt::Display for UpstreamPassthroughError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upstream returned {}: {}",
            self.status,
            String::from_utf8_lossy(&self.body)
        )
    }
}

impl std::error::Error for UpstreamPassthroughError {}
