//! Firmware configuration parameters.
//!
//! FireStep exposes its configuration as short JSON keys: a one-letter
//! axis prefix followed by a two-letter field (`xdh`, `ytm`, ...), or a
//! `sys` prefix for system values. Reading a key means posting it with an
//! empty value; writing means posting the new value.

use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
    A,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::A];

    pub fn prefix(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
            Self::A => 'a',
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.prefix() == c)
    }
}

/// Per-axis configuration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisField {
    /// `dh`: direction high (motor inversion).
    DirectionHigh,
    /// `en`: axis enabled.
    Enabled,
    /// `pn`: minimum position.
    PositionMin,
    /// `tn`: travel minimum.
    TravelMin,
    /// `tm`: travel maximum.
    TravelMax,
    /// `mp`: microsteps.
    Microsteps,
    /// `sa`: step angle.
    StepAngle,
}

impl AxisField {
    const ALL: [AxisField; 7] = [
        AxisField::DirectionHigh,
        AxisField::Enabled,
        AxisField::PositionMin,
        AxisField::TravelMin,
        AxisField::TravelMax,
        AxisField::Microsteps,
        AxisField::StepAngle,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            Self::DirectionHigh => "dh",
            Self::Enabled => "en",
            Self::PositionMin => "pn",
            Self::TravelMin => "tn",
            Self::TravelMax => "tm",
            Self::Microsteps => "mp",
            Self::StepAngle => "sa",
        }
    }
}

/// System-wide values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemField {
    /// `sysv`: firmware version.
    Version,
    /// `systv`: travel velocity.
    TravelVelocity,
    /// `syshp`: homing pulses.
    HomingPulses,
    /// `sysfr`: free RAM.
    FreeRam,
    /// `sysmv`: maximum velocity.
    MaxVelocity,
}

impl SystemField {
    const ALL: [SystemField; 5] = [
        SystemField::Version,
        SystemField::TravelVelocity,
        SystemField::HomingPulses,
        SystemField::FreeRam,
        SystemField::MaxVelocity,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Version => "sysv",
            Self::TravelVelocity => "systv",
            Self::HomingPulses => "syshp",
            Self::FreeRam => "sysfr",
            Self::MaxVelocity => "sysmv",
        }
    }
}

/// A firmware parameter addressable by `get_parameter` / `set_parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareParameter {
    Axis(Axis, AxisField),
    System(SystemField),
}

impl FirmwareParameter {
    /// Wire key, e.g. `xdh` or `systv`.
    pub fn key(&self) -> String {
        match self {
            Self::Axis(axis, field) => format!("{}{}", axis.prefix(), field.suffix()),
            Self::System(field) => field.key().to_string(),
        }
    }

    /// Every addressable parameter.
    pub fn all() -> impl Iterator<Item = FirmwareParameter> {
        Axis::ALL
            .into_iter()
            .flat_map(|a| AxisField::ALL.into_iter().map(move |f| Self::Axis(a, f)))
            .chain(SystemField::ALL.into_iter().map(Self::System))
    }
}

impl fmt::Display for FirmwareParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for FirmwareParameter {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();

        if let Some(field) = SystemField::ALL.into_iter().find(|f| f.key() == key) {
            return Ok(Self::System(field));
        }

        let mut chars = key.chars();
        let axis = chars.next().and_then(Axis::from_prefix);
        let rest = chars.as_str();
        match (axis, AxisField::ALL.into_iter().find(|f| f.suffix() == rest)) {
            (Some(axis), Some(field)) => Ok(Self::Axis(axis, field)),
            _ => Err(DriverError::InvalidConfig(format!(
                "unknown firmware parameter `{s}`"
            ))),
        }
    }
}
