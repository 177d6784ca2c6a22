//! Configuration for the pick-and-place driver CLI.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pnp_core::camera::{CameraConfig, ImageTransform, Rotation};
use pnp_core::{ConnectionConfig, DriverSettings, LengthUnit, Location, PinSettings, Protocol};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PnpConfig {
    /// Controller address and session behaviour.
    pub controller: ControllerConfig,
    /// Motion tuning.
    pub motion: MotionConfig,
    /// Output pin assignments.
    pub pins: PinsConfig,
    /// Camera source and capture cadence.
    pub camera: CameraSection,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub protocol: Protocol,
    /// Empty until the user sets it; connecting fails with "no host".
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u32,
    pub read_timeout_ms: u32,
    /// Lowest accepted firmware, as `major * 1000 + minor`.
    pub min_required_version: u32,
    pub connect_attempts: u32,
    pub connect_retry_delay_ms: u64,
    pub enable_on_connect: bool,
    pub status_path: String,
    /// 0 disables status polling.
    pub status_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub movement_timeout_ms: u64,
    pub units: LengthUnit,
    pub home_x: f64,
    pub home_y: f64,
    pub home_z: f64,
    pub home_rotation: f64,
    pub steps_per_revolution: f64,
    pub invert_motor_x: bool,
    pub invert_motor_y: bool,
    pub invert_motor_z: bool,
    pub invert_axis_x: bool,
    pub invert_axis_y: bool,
    pub disable_lpp: bool,
    pub disable_lpp_for_short_moves: bool,
    pub short_move_threshold_mm: f64,
    /// Raw JSON command(s) sent before reset when enabling.
    pub before_reset_config: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinsConfig {
    pub power_supply_management: bool,
    pub power_supply_pin: i32,
    pub vacuum_pin: i32,
    pub invert_vacuum_pin: bool,
    pub end_effector_led_ring_pin: i32,
    pub up_looking_led_ring_pin: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSourceKind {
    /// Still image over HTTP.
    #[default]
    Http,
    /// Synthetic test pattern. There is no hardware device backend; the
    /// pattern grabber stands in for one.
    Pattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub source: CameraSourceKind,
    /// Absolute URL, or a path on the controller.
    pub url: String,
    /// Fetch through the controller's command channel instead of a
    /// separate client.
    pub share_controller_channel: bool,
    /// Label handed to the pattern grabber; only used with
    /// `source = "pattern"`.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub refresh_interval_ms: u64,
    pub rotation: Rotation,
    pub flip_x: bool,
    pub flip_y: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ControllerConfig {
    fn default() -> Self {
        let core = DriverSettings::default();
        let conn = ConnectionConfig::default();
        Self {
            protocol: Protocol::Http,
            host: String::new(),
            port: 8080,
            connect_timeout_ms: conn.connect_timeout_ms,
            read_timeout_ms: conn.read_timeout_ms,
            min_required_version: core.min_required_version,
            connect_attempts: core.connect_attempts,
            connect_retry_delay_ms: core.connect_retry_delay.as_millis() as u64,
            enable_on_connect: core.enable_on_connect,
            status_path: core.status_path,
            status_poll_interval_ms: core.status_poll_interval.as_millis() as u64,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        let core = DriverSettings::default();
        Self {
            movement_timeout_ms: core.movement_timeout.as_millis() as u64,
            units: LengthUnit::Millimeters,
            home_x: 0.0,
            home_y: 0.0,
            home_z: 0.0,
            home_rotation: 0.0,
            steps_per_revolution: core.steps_per_revolution,
            invert_motor_x: core.invert_motor_x,
            invert_motor_y: core.invert_motor_y,
            invert_motor_z: core.invert_motor_z,
            invert_axis_x: core.invert_axis_x,
            invert_axis_y: core.invert_axis_y,
            disable_lpp: core.disable_lpp,
            disable_lpp_for_short_moves: core.disable_lpp_for_short_moves,
            short_move_threshold_mm: core.short_move_threshold_mm,
            before_reset_config: core.before_reset_config,
        }
    }
}

impl Default for PinsConfig {
    fn default() -> Self {
        let core = PinSettings::default();
        Self {
            power_supply_management: core.power_supply_management,
            power_supply_pin: core.power_supply_pin,
            vacuum_pin: core.vacuum_pin,
            invert_vacuum_pin: core.invert_vacuum_pin,
            end_effector_led_ring_pin: core.end_effector_led_ring_pin,
            up_looking_led_ring_pin: core.up_looking_led_ring_pin,
        }
    }
}

impl Default for CameraSection {
    fn default() -> Self {
        let core = CameraConfig::default();
        Self {
            source: CameraSourceKind::Http,
            url: String::new(),
            share_controller_channel: false,
            device: "pattern".into(),
            width: core.width,
            height: core.height,
            refresh_interval_ms: core.refresh_interval.as_millis() as u64,
            rotation: Rotation::None,
            flip_x: false,
            flip_y: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl PnpConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn to_connection_config(&self) -> ConnectionConfig {
        let c = &self.controller;
        ConnectionConfig {
            protocol: c.protocol,
            host: c.host.trim().to_string(),
            port: c.port,
            connect_timeout_ms: c.connect_timeout_ms,
            read_timeout_ms: c.read_timeout_ms,
        }
    }

    pub fn to_driver_settings(&self) -> DriverSettings {
        let c = &self.controller;
        let m = &self.motion;
        let p = &self.pins;
        DriverSettings {
            min_required_version: c.min_required_version,
            connect_attempts: c.connect_attempts.max(1),
            connect_retry_delay: Duration::from_millis(c.connect_retry_delay_ms),
            movement_timeout: Duration::from_millis(m.movement_timeout_ms.max(1)),
            enable_on_connect: c.enable_on_connect,
            status_path: c.status_path.clone(),
            status_poll_interval: Duration::from_millis(c.status_poll_interval_ms),
            home_location: self.home_location(),
            steps_per_revolution: m.steps_per_revolution,
            invert_motor_x: m.invert_motor_x,
            invert_motor_y: m.invert_motor_y,
            invert_motor_z: m.invert_motor_z,
            invert_axis_x: m.invert_axis_x,
            invert_axis_y: m.invert_axis_y,
            disable_lpp: m.disable_lpp,
            disable_lpp_for_short_moves: m.disable_lpp_for_short_moves,
            short_move_threshold_mm: m.short_move_threshold_mm,
            before_reset_config: m.before_reset_config.clone(),
            pins: PinSettings {
                power_supply_management: p.power_supply_management,
                power_supply_pin: p.power_supply_pin,
                vacuum_pin: p.vacuum_pin,
                invert_vacuum_pin: p.invert_vacuum_pin,
                end_effector_led_ring_pin: p.end_effector_led_ring_pin,
                up_looking_led_ring_pin: p.up_looking_led_ring_pin,
            },
        }
    }

    pub fn home_location(&self) -> Location {
        let m = &self.motion;
        Location::new(m.units, m.home_x, m.home_y, m.home_z, m.home_rotation)
    }

    /// Capture cadence and placeholder size; the interval is at least 1 ms.
    pub fn to_camera_config(&self) -> CameraConfig {
        let c = &self.camera;
        CameraConfig {
            width: c.width.max(1),
            height: c.height.max(1),
            refresh_interval: Duration::from_millis(c.refresh_interval_ms.max(1)),
        }
    }

    pub fn image_transform(&self) -> ImageTransform {
        ImageTransform {
            rotation: self.camera.rotation,
            flip_x: self.camera.flip_x,
            flip_y: self.camera.flip_y,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&PnpConfig::default()).unwrap();
        assert!(text.contains("[controller]"));
        assert!(text.contains("refresh_interval_ms"));
        assert!(text.contains("vacuum_pin"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&PnpConfig::default()).unwrap();
        let parsed: PnpConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.controller.port, 8080);
        assert_eq!(parsed.camera.width, 640);
        assert_eq!(parsed.camera.refresh_interval_ms, 500);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: PnpConfig = toml::from_str(
            r#"
            [controller]
            protocol = "https"
            host = "firenodejs.local"

            [camera]
            source = "pattern"
            rotation = "r180"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.controller.protocol, Protocol::Https);
        assert_eq!(parsed.controller.connect_attempts, 3);
        assert_eq!(parsed.camera.source, CameraSourceKind::Pattern);
        assert_eq!(parsed.image_transform().rotation, Rotation::R180);
        assert_eq!(
            parsed.to_connection_config().base_url(),
            "https://firenodejs.local:8080"
        );
    }

    #[test]
    fn driver_settings_follow_sections() {
        let mut cfg = PnpConfig::default();
        cfg.motion.units = LengthUnit::Inches;
        cfg.motion.home_z = 1.0;
        cfg.pins.vacuum_pin = 12;
        cfg.controller.connect_attempts = 0;
        cfg.controller.status_poll_interval_ms = 250;

        let s = cfg.to_driver_settings();
        assert_eq!(s.home_location.unit, LengthUnit::Inches);
        assert_eq!(s.home_location.z, 1.0);
        assert_eq!(s.pins.vacuum_pin, 12);
        assert_eq!(s.connect_attempts, 1);
        assert_eq!(s.status_poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn camera_config_clamps() {
        let mut cfg = PnpConfig::default();
        cfg.camera.refresh_interval_ms = 0;
        cfg.camera.width = 0;
        let cam = cfg.to_camera_config();
        assert_eq!(cam.refresh_interval, Duration::from_millis(1));
        assert_eq!(cam.width, 1);
    }

    #[test]
    fn write_default_creates_loadable_file() {
        let path = std::env::temp_dir().join(format!("pnp-driver-{}.toml", std::process::id()));
        PnpConfig::write_default(&path).unwrap();
        let loaded = PnpConfig::load(&path);
        assert_eq!(loaded.logging.level, "info");
        std::fs::remove_file(&path).unwrap();
    }
}
