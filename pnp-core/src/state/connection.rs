//! Session lifecycle of one firenodejs controller.
//!
//! Each phase carries what the driver knows at that point: the base URL
//! once the endpoint is configured, the round counter while the hello and
//! models requests are retried, and the accepted firmware once connected.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{DriverError, Result};
use crate::state::session::FirmwareVersion;

/// ```text
///  Disconnected ─open─► Connecting ─attempt─► Handshaking ─accept─► Connected
///       ▲                    │                  │    ▲                  │
///       │                    │                  └────┘ attempt          │
///       │                    └──────close──────►┬◄───────close──────────┘
///       │                                       ▼
///       └──────────────closed────────────── Disconnecting
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,

    /// Endpoint configured, nothing sent yet.
    Connecting { url: String },

    /// Hello/models round `attempt` (1-based) is running.
    Handshaking { url: String, attempt: u32 },

    Connected {
        url: String,
        firmware: FirmwareVersion,
        since: Instant,
    },

    /// Pending moves and the status monitor are being shut down.
    Disconnecting { url: String },
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting { url } => write!(f, "connecting to {url}"),
            Self::Handshaking { url, attempt } => {
                write!(f, "handshaking with {url} (attempt {attempt})")
            }
            Self::Connected { url, firmware, .. } => {
                write!(f, "connected to {url} (firenodejs {firmware})")
            }
            Self::Disconnecting { url } => write!(f, "disconnecting from {url}"),
        }
    }
}

impl ConnectionPhase {
    fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting { .. } => "connecting",
            Self::Handshaking { .. } => "handshaking",
            Self::Connected { .. } => "connected",
            Self::Disconnecting { .. } => "disconnecting",
        }
    }

    fn invalid(&self, event: &'static str) -> DriverError {
        DriverError::InvalidTransition {
            phase: self.name(),
            event,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Base URL of the controller this session belongs to.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { url }
            | Self::Handshaking { url, .. }
            | Self::Connected { url, .. }
            | Self::Disconnecting { url } => Some(url),
        }
    }

    /// Firmware accepted by the handshake.
    pub fn firmware(&self) -> Option<FirmwareVersion> {
        match self {
            Self::Connected { firmware, .. } => Some(*firmware),
            _ => None,
        }
    }

    /// Time since the handshake completed.
    pub fn uptime(&self) -> Option<Duration> {
        match self {
            Self::Connected { since, .. } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// `Disconnected` → `Connecting`.
    pub fn open(&mut self, url: impl Into<String>) -> Result<()> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting { url: url.into() };
                Ok(())
            }
            _ => Err(self.invalid("open a session")),
        }
    }

    /// Start handshake round `attempt`. Valid while connecting or after a
    /// failed round.
    pub fn attempt(&mut self, attempt: u32) -> Result<()> {
        match self {
            Self::Connecting { url } | Self::Handshaking { url, .. } => {
                let url = std::mem::take(url);
                *self = Self::Handshaking { url, attempt };
                Ok(())
            }
            _ => Err(self.invalid("start a handshake")),
        }
    }

    /// `Handshaking` → `Connected` with the firmware that answered.
    pub fn accept(&mut self, firmware: FirmwareVersion) -> Result<()> {
        match self {
            Self::Handshaking { url, .. } => {
                let url = std::mem::take(url);
                *self = Self::Connected {
                    url,
                    firmware,
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(self.invalid("accept firmware")),
        }
    }

    /// Any live phase → `Disconnecting`.
    pub fn close(&mut self) -> Result<()> {
        match self {
            Self::Connecting { url } | Self::Handshaking { url, .. } | Self::Connected { url, .. } => {
                let url = std::mem::take(url);
                *self = Self::Disconnecting { url };
                Ok(())
            }
            _ => Err(self.invalid("close the session")),
        }
    }

    /// `Disconnecting` → `Disconnected`.
    pub fn closed(&mut self) -> Result<()> {
        match self {
            Self::Disconnecting { .. } => {
                *self = Self::Disconnected;
                Ok(())
            }
            _ => Err(self.invalid("finish closing")),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
