//! HTTP transport seam.
//!
//! The command channel talks to the controller through [`HttpTransport`].
//! [`UreqTransport`] is the real client; [`MockTransport`] answers from a
//! closure and is used by tests and dry runs.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::error::Result;

mod mock;
mod ureq_client;

pub use mock::MockTransport;
pub use ureq_client::{ClientConfig, UreqTransport};

/// Upper bound on a single response body (images included).
pub const MAX_BODY_SIZE: u64 = 32 * 1024 * 1024;

// ── Request ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Body of a POST request.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// `application/json` document.
    Json(Value),
}

impl Payload {
    /// Single-field form payload.
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Form(vec![(name.into(), value.into())])
    }
}

/// A fully resolved request, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Payload>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Payload) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Path component of the URL (everything after the authority).
    pub fn path(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(i) => &self.url[i + 3..],
            None => &self.url,
        };
        match rest.find('/') {
            Some(i) => &rest[i..],
            None => "/",
        }
    }

    /// The JSON body, if this request carries one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(Payload::Json(v)) => Some(v),
            _ => None,
        }
    }
}

// ── Response ─────────────────────────────────────────────────────

/// Undecoded transport response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawResponse {
    /// A JSON response with the usual headers.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::from(body.to_string()),
        }
    }

    /// A binary response with the given content type.
    pub fn bytes(status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), content_type.into())],
            body: body.into(),
        }
    }

    /// A response with no headers at all, as seen on a broken connection.
    pub fn headerless(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ── Trait ────────────────────────────────────────────────────────

/// Executes one HTTP exchange.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_path_strips_authority() {
        let req = HttpRequest::get("http://pnp.local:8080/firenodejs/models");
        assert_eq!(req.path(), "/firenodejs/models");

        let req = HttpRequest::get("https://pnp.local");
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn json_body_only_for_json_payloads() {
        let req = HttpRequest::post("http://h/firestep", Payload::Json(json!({"hom": ""})));
        assert_eq!(req.json_body(), Some(&json!({"hom": ""})));

        let req = HttpRequest::post("http://h/firestep", Payload::field("iod5", "1"));
        assert!(req.json_body().is_none());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = RawResponse::json(200, &json!({}));
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert!(RawResponse::headerless(200).header("content-type").is_none());
    }
}
