//! Per-session bookkeeping for the motion driver.
//!
//! Tracks the connection phase and the firmware version reported during
//! the handshake.

use std::fmt;

use serde_json::Value;

use crate::error::{DriverError, Result};
use crate::state::connection::ConnectionPhase;

// ── FirmwareVersion ──────────────────────────────────────────────

/// Version reported by `/firenodejs/models`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Comparable ordinal: `major * 1000 + minor`. Patch is ignored.
    pub fn ordinal(&self) -> u32 {
        self.major.saturating_mul(1000).saturating_add(self.minor)
    }

    /// Extract `firenodejs.version.{major,minor,patch}` from a models
    /// document. Components may be numbers or numeric strings; a missing
    /// patch reads as zero.
    pub fn from_models(models: &Value) -> Result<Self> {
        let version = models
            .get("firenodejs")
            .and_then(|f| f.get("version"))
            .ok_or(DriverError::MissingField("firenodejs.version"))?;

        let major = component(version, "major")?
            .ok_or(DriverError::MissingField("firenodejs.version.major"))?;
        let minor = component(version, "minor")?
            .ok_or(DriverError::MissingField("firenodejs.version.minor"))?;
        let patch = component(version, "patch")?.unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

fn component(version: &Value, name: &'static str) -> Result<Option<u32>> {
    let Some(raw) = version.get(name) else {
        return Ok(None);
    };
    let parsed = match raw {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed
        .map(Some)
        .ok_or(DriverError::ProtocolViolation("version component is not a number"))
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ── SessionState ─────────────────────────────────────────────────

/// Connection phase plus the version gate applied at the end of the
/// handshake.
#[derive(Debug, Default)]
pub struct SessionState {
    phase: ConnectionPhase,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &ConnectionPhase {
        &self.phase
    }

    pub fn phase_mut(&mut self) -> &mut ConnectionPhase {
        &mut self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase.is_connected()
    }

    /// Firmware version of the live session.
    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.phase.firmware()
    }

    /// Complete the handshake, unless `version` is older than
    /// `min_required`.
    pub fn accept_version(&mut self, version: FirmwareVersion, min_required: u32) -> Result<()> {
        if version.ordinal() < min_required {
            return Err(DriverError::VersionTooOld {
                found: version.ordinal(),
                required: min_required,
            });
        }
        self.phase.accept(version)
    }

    /// Fail fast unless the session is connected.
    pub fn ensure_connected(&self) -> Result<()> {
        if self.phase.is_connected() {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    /// Walk a live session through `Disconnecting` back to
    /// `Disconnected`. Returns `false` when there was nothing to close.
    pub fn abandon(&mut self) -> bool {
        self.phase.close().and_then(|()| self.phase.closed()).is_ok()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ordinal_ignores_patch() {
        assert_eq!(FirmwareVersion::new(0, 3, 9).ordinal(), 3);
        assert_eq!(FirmwareVersion::new(1, 2, 0).ordinal(), 1002);
    }

    #[test]
    fn parses_numbers_and_strings() {
        let v = FirmwareVersion::from_models(&json!({
            "firenodejs": {"version": {"major": "0", "minor": 14, "patch": "2"}}
        }))
        .unwrap();
        assert_eq!(v, FirmwareVersion::new(0, 14, 2));
        assert_eq!(v.to_string(), "0.14.2");
    }

    #[test]
    fn missing_patch_defaults_to_zero() {
        let v = FirmwareVersion::from_models(&json!({
            "firenodejs": {"version": {"major": 1, "minor": 0}}
        }))
        .unwrap();
        assert_eq!(v.patch, 0);
    }

    #[test]
    fn missing_version_is_reported() {
        let err = FirmwareVersion::from_models(&json!({"firestep": {}})).unwrap_err();
        assert!(matches!(err, DriverError::MissingField("firenodejs.version")));

        let err = FirmwareVersion::from_models(&json!({
            "firenodejs": {"version": {"major": "x", "minor": 1}}
        }))
        .unwrap_err();
        assert!(matches!(err, DriverError::ProtocolViolation(_)));
    }

    fn handshaking() -> SessionState {
        let mut state = SessionState::new();
        state.phase_mut().open("http://pnp.local:8080").unwrap();
        state.phase_mut().attempt(1).unwrap();
        state
    }

    #[test]
    fn old_firmware_is_rejected() {
        let mut state = handshaking();
        let err = state
            .accept_version(FirmwareVersion::new(0, 3, 0), 4)
            .unwrap_err();
        assert!(matches!(
            err,
            DriverError::VersionTooOld {
                found: 3,
                required: 4
            }
        ));
        assert!(state.firmware().is_none());

        state.accept_version(FirmwareVersion::new(0, 4, 0), 4).unwrap();
        assert_eq!(state.firmware(), Some(FirmwareVersion::new(0, 4, 0)));
    }

    #[test]
    fn ensure_connected_follows_phase() {
        let mut state = SessionState::new();
        assert!(matches!(state.ensure_connected(), Err(DriverError::NotConnected)));
        assert!(!state.abandon());

        let mut state = handshaking();
        assert!(matches!(state.ensure_connected(), Err(DriverError::NotConnected)));
        state.accept_version(FirmwareVersion::new(0, 14, 0), 4).unwrap();
        assert!(state.ensure_connected().is_ok());

        assert!(state.abandon());
        assert!(state.phase().is_disconnected());
        assert!(state.firmware().is_none());
    }
}
