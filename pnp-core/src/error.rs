//! Domain-specific error types for the controller driver.
//!
//! All fallible operations return `Result<T, DriverError>`.
//! Controller input never panics; every failure is typed.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DriverError>;

/// The canonical error type for the driver core.
#[derive(Debug, Error)]
pub enum DriverError {
    // ── Configuration Errors ─────────────────────────────────────
    /// A request was attempted before the endpoint had a host.
    #[error("no host configured")]
    HostNotConfigured,

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Connectivity Errors ──────────────────────────────────────
    /// The handshake never succeeded.
    #[error(
        "unable to receive connection response from {url}; check your protocol, host and port \
         and that you are running at least version {min_version} of firenodejs"
    )]
    ConnectionFailed { url: String, min_version: u32 },

    /// The transport answered without any response headers.
    #[error("command did not return a response")]
    EmptyResponse,

    /// The controller answered with a non-200 HTTP status.
    #[error("request failed, status code: {code}")]
    HttpStatus { code: u16 },

    /// The HTTP/IO layer reported an error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Motion or actuation was attempted without a session.
    #[error("not connected")]
    NotConnected,

    // ── Protocol Errors ──────────────────────────────────────────
    /// A response body was not valid JSON, or a payload failed to encode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A response was missing a field the protocol requires.
    #[error("missing field `{0}` in controller response")]
    MissingField(&'static str),

    /// The controller rejected a command with a non-zero status.
    #[error("controller rejected command: {name} ({code})")]
    CommandRejected { code: i32, name: &'static str },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} value: {value}")]
    UnknownVariant { type_name: &'static str, value: i64 },

    /// The controller sent something the protocol does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// A session lifecycle step was attempted from the wrong phase.
    #[error("cannot {event} while {phase}")]
    InvalidTransition {
        phase: &'static str,
        event: &'static str,
    },

    // ── Version Errors ───────────────────────────────────────────
    /// The firmware is older than the driver supports.
    #[error("this driver requires firenodejs version {required} or higher, found {found}")]
    VersionTooOld { found: u32, required: u32 },

    // ── Timing Errors ────────────────────────────────────────────
    /// A movement wait exceeded its deadline.
    #[error("command timed out after {0:?}")]
    CommandTimedOut(Duration),

    /// The session was torn down while a caller was waiting.
    #[error("operation cancelled")]
    Cancelled,

    // ── Capture Errors ───────────────────────────────────────────
    /// An image could not be decoded or grabbed.
    #[error("capture error: {0}")]
    Capture(String),
}

/// Coarse classification of a [`DriverError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Connectivity,
    Protocol,
    Version,
    Timeout,
    Cancelled,
    Capture,
}

impl DriverError {
    /// Which family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HostNotConfigured | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::ConnectionFailed { .. }
            | Self::EmptyResponse
            | Self::HttpStatus { .. }
            | Self::Transport(_)
            | Self::Io(_)
            | Self::NotConnected => ErrorKind::Connectivity,
            Self::Json(_)
            | Self::MissingField(_)
            | Self::CommandRejected { .. }
            | Self::UnknownVariant { .. }
            | Self::ProtocolViolation(_)
            | Self::InvalidTransition { .. } => ErrorKind::Protocol,
            Self::VersionTooOld { .. } => ErrorKind::Version,
            Self::CommandTimedOut(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Capture(_) => ErrorKind::Capture,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<ureq::Error> for DriverError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, _) => DriverError::HttpStatus { code },
            ureq::Error::Transport(t) => DriverError::Transport(t.to_string()),
        }
    }
}

impl From<image::ImageError> for DriverError {
    fn from(e: image::ImageError) -> Self {
        DriverError::Capture(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DriverError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            DriverError::Cancelled
        } else {
            DriverError::Transport(format!("worker task failed: {e}"))
        }
    }
}
