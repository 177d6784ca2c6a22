//! Camera capture.
//!
//! A [`Camera`] pairs a [`FrameSource`] with an optional
//! [`FrameTransform`] and runs the continuous capture loop for its
//! listeners.

mod capture;
mod frame;
mod source;
mod transform;

pub use capture::{Camera, CameraConfig, CameraListener, ListenerError, ListenerId};
pub use frame::{CaptureStats, Frame, error_placeholder, no_signal_placeholder};
pub use source::{
    DEFAULT_DEVICE_HEIGHT, DEFAULT_DEVICE_WIDTH, DeviceSource, FrameGrabber, FrameSource,
    HttpImageSource, PatternGrabber,
};
pub use transform::{FrameTransform, ImageTransform, Rotation};
