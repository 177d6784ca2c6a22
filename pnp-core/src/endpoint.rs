//! Controller endpoint: protocol, host and port, and the base URL built
//! from them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// URL scheme used to reach the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Https => write!(f, "https"),
        }
    }
}

impl FromStr for Protocol {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(DriverError::InvalidConfig(format!(
                "unknown protocol `{other}`"
            ))),
        }
    }
}

/// Build `protocol://host[:port]`. Port 0 omits the port segment.
pub fn base_url(protocol: Protocol, host: &str, port: u16) -> String {
    if port != 0 {
        format!("{protocol}://{host}:{port}")
    } else {
        format!("{protocol}://{host}")
    }
}

// ── ConnectionConfig ─────────────────────────────────────────────

/// Everything needed to open a session with the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub protocol: Protocol,
    pub host: String,
    /// 0 means "use the scheme default".
    pub port: u16,
    pub connect_timeout_ms: u32,
    pub read_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http,
            host: String::new(),
            port: 0,
            connect_timeout_ms: 1_000,
            read_timeout_ms: 100_000,
        }
    }
}

impl ConnectionConfig {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> String {
        base_url(self.protocol, &self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.connect_timeout_ms))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.read_timeout_ms))
    }
}

// ── Endpoint ─────────────────────────────────────────────────────

/// Holds the last configured address of the controller.
///
/// Configuring is pure: it only recomputes the stored URL string.
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    protocol: Protocol,
    host: String,
    port: u16,
    base_url: Option<String>,
}

impl Endpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the base URL from the given parts.
    pub fn configure(&mut self, protocol: Protocol, host: impl Into<String>, port: u16) {
        self.protocol = protocol;
        self.host = host.into();
        self.port = port;
        self.base_url = Some(base_url(self.protocol, &self.host, self.port));
    }

    /// The last computed URL, or `None` if never configured.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Join a request path onto the base URL.
    pub fn url_for(&self, path: &str) -> Option<String> {
        let base = self.base_url.as_deref()?;
        if path.is_empty() {
            Some(base.to_string())
        } else if path.starts_with('/') {
            Some(format!("{base}{path}"))
        } else {
            Some(format!("{base}/{path}"))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base_url {
            Some(url) => write!(f, "{url}"),
            None => write!(f, "<unconfigured>"),
        }
    }
}
