//! Per-frame image transforms.

use image::RgbaImage;
use image::imageops;
use serde::{Deserialize, Serialize};

/// Applied to every captured frame before it reaches listeners.
pub trait FrameTransform: Send + Sync {
    fn apply(&self, image: RgbaImage) -> RgbaImage;
}

impl<F> FrameTransform for F
where
    F: Fn(RgbaImage) -> RgbaImage + Send + Sync,
{
    fn apply(&self, image: RgbaImage) -> RgbaImage {
        self(image)
    }
}

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    None,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Nearest quarter turn for an angle in degrees.
    pub fn from_degrees(degrees: f64) -> Self {
        let quarter = ((degrees / 90.0).round() as i64).rem_euclid(4);
        match quarter {
            1 => Self::R90,
            2 => Self::R180,
            3 => Self::R270,
            _ => Self::None,
        }
    }
}

/// Rotate, then flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageTransform {
    pub rotation: Rotation,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl ImageTransform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

impl FrameTransform for ImageTransform {
    fn apply(&self, image: RgbaImage) -> RgbaImage {
        let mut out = match self.rotation {
            Rotation::None => image,
            Rotation::R90 => imageops::rotate90(&image),
            Rotation::R180 => imageops::rotate180(&image),
            Rotation::R270 => imageops::rotate270(&image),
        };
        if self.flip_x {
            imageops::flip_horizontal_in_place(&mut out);
        }
        if self.flip_y {
            imageops::flip_vertical_in_place(&mut out);
        }
        out
    }
}
