//! Frames and placeholder images.

use std::time::Instant;

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;

// ── Frame ────────────────────────────────────────────────────────

/// One captured image as delivered to listeners.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    /// Monotonic per-camera counter, starting at 0.
    pub sequence: u64,
    pub captured_at: Instant,
    /// The source failed and `image` is a stand-in.
    pub placeholder: bool,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// ── CaptureStats ─────────────────────────────────────────────────

/// Running totals published after every capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub placeholders: u64,
    pub last_width: u32,
    pub last_height: u32,
}

// ── Placeholders ─────────────────────────────────────────────────

const DARK: Rgba<u8> = Rgba([32, 32, 32, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([220, 30, 30, 255]);
const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);

/// Dark field with a red cross, shown when an image fetch fails.
pub fn error_placeholder(width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width.max(1), height.max(1), DARK);
    let (w, h) = (img.width() as f32, img.height() as f32);
    thick_line(&mut img, (w / 2.0, 0.0), (w / 2.0, h - 1.0), RED);
    thick_line(&mut img, (0.0, h / 2.0), (w - 1.0, h / 2.0), RED);
    img
}

/// Black field with both diagonals in magenta, shown when a capture
/// device yields nothing.
pub fn no_signal_placeholder(width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width.max(1), height.max(1), BLACK);
    let (w, h) = (img.width() as f32 - 1.0, img.height() as f32 - 1.0);
    thick_line(&mut img, (0.0, 0.0), (w, h), MAGENTA);
    thick_line(&mut img, (w, 0.0), (0.0, h), MAGENTA);
    img
}

/// Two-pixel line.
fn thick_line(img: &mut RgbaImage, start: (f32, f32), end: (f32, f32), color: Rgba<u8>) {
    draw_line_segment_mut(img, start, end, color);
    draw_line_segment_mut(img, (start.0 + 1.0, start.1), (end.0 + 1.0, end.1), color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_placeholder_has_cross() {
        let img = error_placeholder(64, 48);
        assert_eq!(img.dimensions(), (64, 48));
        assert_eq!(*img.get_pixel(0, 0), DARK);
        assert_eq!(*img.get_pixel(32, 5), RED);
        assert_eq!(*img.get_pixel(5, 24), RED);
    }

    #[test]
    fn no_signal_placeholder_has_diagonals() {
        let img = no_signal_placeholder(100, 100);
        assert_eq!(*img.get_pixel(50, 50), MAGENTA);
        assert_eq!(*img.get_pixel(0, 0), MAGENTA);
        assert_eq!(*img.get_pixel(50, 10), BLACK);
    }

    #[test]
    fn zero_size_is_clamped() {
        assert_eq!(error_placeholder(0, 0).dimensions(), (1, 1));
    }
}
