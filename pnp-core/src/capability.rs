//! Capability traits.
//!
//! Front-ends program against these instead of the concrete driver or
//! camera, so a machine can mix implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::camera::{CameraListener, Frame, ListenerId};
use crate::error::Result;
use crate::location::Location;

/// Something with a session lifecycle.
#[async_trait]
pub trait Connectable: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;
}

/// Positioning of a head.
#[async_trait]
pub trait MotionCapable: Send + Sync {
    async fn home(&self) -> Result<()>;

    /// Move the head mount so that `offset` ends up at `target`.
    /// `speed` is a fraction in `0..=1`.
    async fn move_to(&self, offset: &Location, target: &Location, speed: f64) -> Result<()>;

    /// Where `offset` currently is.
    fn location(&self, offset: &Location) -> Location;
}

/// Digital outputs and the nozzle vacuum.
#[async_trait]
pub trait ActuationCapable: Send + Sync {
    async fn actuate(&self, pin: i32, on: bool) -> Result<()>;
    async fn pick(&self) -> Result<()>;
    async fn place(&self) -> Result<()>;
}

/// Single-shot and continuous image capture.
#[async_trait]
pub trait CaptureCapable: Send + Sync {
    /// Never fails; a placeholder frame stands in for a source error.
    async fn capture(&self) -> Frame;
    async fn start_continuous_capture(&self, listener: Arc<dyn CameraListener>) -> ListenerId;
    async fn stop_continuous_capture(&self, id: ListenerId);
}
