use std::time::Duration;

use crate::location::{LengthUnit, Location};

/// Output pin assignments. A pin `<= 0` is unassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct PinSettings {
    /// Switch the machine's power supply on enable/disable.
    pub power_supply_management: bool,
    pub power_supply_pin: i32,
    pub vacuum_pin: i32,
    /// Vacuum pump is active low.
    pub invert_vacuum_pin: bool,
    pub end_effector_led_ring_pin: i32,
    pub up_looking_led_ring_pin: i32,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            power_supply_management: false,
            power_supply_pin: 28,
            vacuum_pin: 26,
            invert_vacuum_pin: false,
            end_effector_led_ring_pin: 5,
            up_looking_led_ring_pin: 0,
        }
    }
}

/// Motion session tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    /// Lowest accepted firmware ordinal (`major * 1000 + minor`).
    pub min_required_version: u32,
    /// Handshake rounds before `ConnectionFailed`.
    pub connect_attempts: u32,
    pub connect_retry_delay: Duration,
    /// Upper bound on waiting for a move or home to complete.
    pub movement_timeout: Duration,
    pub enable_on_connect: bool,

    /// Polled by the status monitor.
    pub status_path: String,
    /// `Duration::ZERO` disables the status monitor.
    pub status_poll_interval: Duration,

    pub home_location: Location,
    pub steps_per_revolution: f64,

    pub invert_motor_x: bool,
    pub invert_motor_y: bool,
    pub invert_motor_z: bool,
    pub invert_axis_x: bool,
    pub invert_axis_y: bool,

    /// Never request long-path precision.
    pub disable_lpp: bool,
    /// Skip long-path precision below `short_move_threshold_mm`.
    pub disable_lpp_for_short_moves: bool,
    pub short_move_threshold_mm: f64,

    /// Raw JSON sent before the reset on enable. Empty disables it.
    pub before_reset_config: String,

    pub pins: PinSettings,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            min_required_version: 4,
            connect_attempts: 3,
            connect_retry_delay: Duration::from_millis(500),
            movement_timeout: Duration::from_secs(30),
            enable_on_connect: true,
            status_path: "/firestep/model".to_string(),
            status_poll_interval: Duration::ZERO,
            home_location: Location::zero(LengthUnit::Millimeters),
            steps_per_revolution: 3200.0,
            invert_motor_x: false,
            invert_motor_y: false,
            invert_motor_z: false,
            invert_axis_x: false,
            invert_axis_y: false,
            disable_lpp: false,
            disable_lpp_for_short_moves: true,
            short_move_threshold_mm: 10.0,
            before_reset_config: String::new(),
            pins: PinSettings::default(),
        }
    }
}

impl DriverSettings {
    /// Whether a linear move of `distance_mm` requests long-path precision.
    pub fn long_path_precision(&self, distance_mm: f64) -> bool {
        if self.disable_lpp {
            return false;
        }
        !(self.disable_lpp_for_short_moves && distance_mm < self.short_move_threshold_mm)
    }
}
