//! Command channel to the controller.
//!
//! One logical request at a time: the channel holds an exclusive lock for
//! the whole exchange, because the controller cannot pipeline requests.
//! Every caller (motion session, status monitor, HTTP camera) shares it.
//!
//! The exchange itself runs on its own task that owns the lock guard, so a
//! caller dropping its future (a cancelled capture loop, a stopped monitor)
//! does not free the channel while the request is still on the wire.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::endpoint::{Endpoint, Protocol};
use crate::error::{DriverError, Result};
use crate::status::{StatusClass, status_name};
use crate::transport::{HttpRequest, HttpTransport, Payload, RawResponse};

// ── Response ─────────────────────────────────────────────────────

/// A decoded controller response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl Response {
    /// The embedded firmware status `"s"`, if present.
    pub fn status_code(&self) -> Option<i32> {
        self.body
            .get("s")
            .and_then(Value::as_i64)
            .and_then(|s| i32::try_from(s).ok())
    }

    /// The result object `"r"`, if present.
    pub fn result(&self) -> Option<&Value> {
        self.body.get("r")
    }

    /// Interpret the embedded status of a firmware command.
    ///
    /// Returns the status class when the command was accepted; a
    /// negative status becomes [`DriverError::CommandRejected`].
    pub fn check(&self) -> Result<StatusClass> {
        let code = self.status_code().ok_or(DriverError::MissingField("s"))?;
        match StatusClass::of(code) {
            StatusClass::Error => Err(DriverError::CommandRejected {
                code,
                name: status_name(code),
            }),
            class => Ok(class),
        }
    }
}

// ── CommandChannel ───────────────────────────────────────────────

/// Serialized request/response channel to one controller.
pub struct CommandChannel {
    endpoint: RwLock<Endpoint>,
    transport: Arc<dyn HttpTransport>,
    lock: Arc<Mutex<()>>,
}

impl CommandChannel {
    /// A channel with no endpoint configured yet.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_endpoint(Endpoint::new(), transport)
    }

    pub fn with_endpoint(endpoint: Endpoint, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            endpoint: RwLock::new(endpoint),
            transport,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Point the channel at a controller. No network I/O.
    pub fn configure(&self, protocol: Protocol, host: &str, port: u16) {
        self.endpoint.write().configure(protocol, host, port);
    }

    pub fn base_url(&self) -> Option<String> {
        self.endpoint.read().base_url().map(str::to_owned)
    }

    /// Snapshot of the current endpoint.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.read().clone()
    }

    /// Send one command. No payload means GET, a payload means POST.
    pub async fn send(&self, path: &str, payload: Option<Payload>) -> Result<Response> {
        let url = self
            .endpoint
            .read()
            .url_for(path)
            .ok_or(DriverError::HostNotConfigured)?;
        let request = match payload {
            None => HttpRequest::get(url),
            Some(body) => HttpRequest::post(url, body),
        };

        let raw = self.exchange(request).await?;
        let body = decode_body(&raw)?;
        debug!(status = raw.status, body = %body, "controller response");

        Ok(Response {
            status: raw.status,
            headers: raw.headers,
            body,
        })
    }

    /// `GET path`.
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.send(path, None).await
    }

    /// `POST path` with a JSON document.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Response> {
        self.send(path, Some(Payload::Json(body))).await
    }

    /// Raw GET returning the body bytes, under the same exclusive lock.
    ///
    /// `target` may be an absolute URL or a path on this endpoint.
    pub async fn fetch(&self, target: &str) -> Result<Bytes> {
        let url = if target.contains("://") {
            target.to_string()
        } else {
            self.endpoint
                .read()
                .url_for(target)
                .ok_or(DriverError::HostNotConfigured)?
        };

        let raw = self.exchange(HttpRequest::get(url)).await?;
        Ok(raw.body)
    }

    /// Run one request under the channel lock and apply the
    /// transport-level checks.
    async fn exchange(&self, request: HttpRequest) -> Result<RawResponse> {
        debug!(
            method = ?request.method,
            url = %request.url,
            body = ?request.body,
            "sending command"
        );
        let guard = self.lock.clone().lock_owned().await;
        let transport = self.transport.clone();
        let raw = tokio::spawn(async move {
            let _guard = guard;
            transport.execute(request).await
        })
        .await??;
        debug!(status = raw.status, headers = ?raw.headers, "transport response");

        if raw.headers.is_empty() {
            return Err(DriverError::EmptyResponse);
        }
        if raw.status != 200 {
            return Err(DriverError::HttpStatus { code: raw.status });
        }
        Ok(raw)
    }
}

fn decode_body(raw: &RawResponse) -> Result<Value> {
    if raw.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&raw.body)?)
}
