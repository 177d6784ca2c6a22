//! Machine coordinates.
//!
//! A [`Location`] is an `(x, y, z, rotation)` tuple with a length unit.
//! NaN marks a component as unset: arithmetic keeps it NaN, and the
//! motion session never writes a NaN into its pose.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Linear unit of a [`Location`]. Rotation is always in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    #[default]
    Millimeters,
    Inches,
}

impl LengthUnit {
    const MM_PER_INCH: f64 = 25.4;

    /// Factor converting one unit of `self` into `to`.
    pub fn factor_to(self, to: LengthUnit) -> f64 {
        match (self, to) {
            (Self::Millimeters, Self::Inches) => 1.0 / Self::MM_PER_INCH,
            (Self::Inches, Self::Millimeters) => Self::MM_PER_INCH,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub unit: LengthUnit,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation: f64,
}

impl Default for Location {
    fn default() -> Self {
        Self::zero(LengthUnit::Millimeters)
    }
}

impl Location {
    pub fn new(unit: LengthUnit, x: f64, y: f64, z: f64, rotation: f64) -> Self {
        Self {
            unit,
            x,
            y,
            z,
            rotation,
        }
    }

    pub fn zero(unit: LengthUnit) -> Self {
        Self::new(unit, 0.0, 0.0, 0.0, 0.0)
    }

    /// Every component unset.
    pub fn unset(unit: LengthUnit) -> Self {
        Self::new(unit, f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn convert_to_units(&self, unit: LengthUnit) -> Self {
        let k = self.unit.factor_to(unit);
        Self::new(unit, self.x * k, self.y * k, self.z * k, self.rotation)
    }

    /// Component-wise sum; `other` is converted to `self`'s unit.
    pub fn add(&self, other: &Location) -> Self {
        let o = other.convert_to_units(self.unit);
        Self::new(
            self.unit,
            self.x + o.x,
            self.y + o.y,
            self.z + o.z,
            self.rotation + o.rotation,
        )
    }

    /// Component-wise difference; `other` is converted to `self`'s unit.
    pub fn subtract(&self, other: &Location) -> Self {
        let o = other.convert_to_units(self.unit);
        Self::new(
            self.unit,
            self.x - o.x,
            self.y - o.y,
            self.z - o.z,
            self.rotation - o.rotation,
        )
    }

    /// Linear distance to `target` over the components set in both.
    ///
    /// Unset components contribute nothing.
    pub fn linear_distance_to(&self, target: &Location) -> f64 {
        let t = target.convert_to_units(self.unit);
        [(self.x, t.x), (self.y, t.y), (self.z, t.z)]
            .iter()
            .map(|&(a, b)| b - a)
            .filter(|d| !d.is_nan())
            .map(|d| d * d)
            .sum::<f64>()
            .sqrt()
    }

    /// Overwrite each component of `self` with `update`'s, skipping NaN.
    pub fn merge_set_components(&mut self, update: &Location) {
        let u = update.convert_to_units(self.unit);
        if !u.x.is_nan() {
            self.x = u.x;
        }
        if !u.y.is_nan() {
            self.y = u.y;
        }
        if !u.z.is_nan() {
            self.z = u.z;
        }
        if !u.rotation.is_nan() {
            self.rotation = u.rotation;
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            LengthUnit::Millimeters => "mm",
            LengthUnit::Inches => "in",
        };
        write!(
            f,
            "({:.4}, {:.4}, {:.4}, {:.4}°) {unit}",
            self.x, self.y, self.z, self.rotation
        )
    }
}
