//! Blocking `ureq` client, driven from the Tokio blocking pool.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::{HttpRequest, HttpTransport, MAX_BODY_SIZE, Method, Payload, RawResponse};
use crate::endpoint::ConnectionConfig;
use crate::error::Result;

/// Per-session HTTP client settings.
///
/// Each transport owns its own copy; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(100),
            default_headers: vec![("Accept".into(), "application/json".into())],
        }
    }
}

impl From<&ConnectionConfig> for ClientConfig {
    fn from(cfg: &ConnectionConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            read_timeout: cfg.read_timeout(),
            ..Self::default()
        }
    }
}

/// [`HttpTransport`] backed by a `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    default_headers: Arc<[(String, String)]>,
}

impl UreqTransport {
    pub fn new(config: ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        Self {
            agent,
            default_headers: config.default_headers.into(),
        }
    }

    fn execute_blocking(
        agent: &ureq::Agent,
        default_headers: &[(String, String)],
        request: HttpRequest,
    ) -> Result<RawResponse> {
        let mut req = match request.method {
            Method::Get => agent.get(&request.url),
            Method::Post => agent.post(&request.url),
        };
        for (name, value) in default_headers.iter().chain(request.headers.iter()) {
            req = req.set(name, value);
        }

        let result = match request.body {
            None => req.call(),
            Some(Payload::Form(fields)) => {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                req.send_form(&pairs)
            }
            Some(Payload::Json(value)) => {
                let text = serde_json::to_string(&value)?;
                req.set("Content-Type", "application/json")
                    .send_string(&text)
            }
        };

        // Non-2xx statuses still carry a response; the channel decides.
        let response = match result {
            Ok(r) => r,
            Err(ureq::Error::Status(_, r)) => r,
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let mut headers = Vec::new();
        for name in response.headers_names() {
            if let Some(value) = response.header(&name) {
                let value = value.to_string();
                headers.push((name, value));
            }
        }

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_SIZE)
            .read_to_end(&mut body)?;

        Ok(RawResponse {
            status,
            headers,
            body: Bytes::from(body),
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse> {
        let agent = self.agent.clone();
        let headers = Arc::clone(&self.default_headers);
        tokio::task::spawn_blocking(move || Self::execute_blocking(&agent, &headers, request))
            .await?
    }
}
