//! # pnp-core
//!
//! Driver core for a pick-and-place machine running a FireStep motion
//! controller behind firenodejs.
//!
//! This crate contains:
//! - **Endpoint**: `Protocol`, `ConnectionConfig`, `Endpoint` (base URL handling)
//! - **Transport**: the `HttpTransport` seam with `UreqTransport` and `MockTransport`
//! - **Channel**: `CommandChannel`, one request in flight at a time
//! - **Driver**: `FireNodeDriver` motion/actuation session with bounded move waits
//! - **Status / Parameter**: firmware status codes and configuration keys
//! - **Camera**: `Camera` continuous capture loop over HTTP or device sources
//! - **Error**: `DriverError`, a typed `thiserror` hierarchy

pub mod camera;
pub mod capability;
pub mod channel;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod location;
pub mod parameter;
pub mod state;
pub mod status;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use camera::{
    Camera, CameraConfig, CameraListener, CaptureStats, DeviceSource, Frame, FrameGrabber,
    FrameSource, FrameTransform, HttpImageSource, ImageTransform, ListenerId, Rotation,
};
pub use capability::{ActuationCapable, CaptureCapable, Connectable, MotionCapable};
pub use channel::{CommandChannel, Response};
pub use driver::{DriverSettings, FireNodeDriver, PinSettings};
pub use endpoint::{ConnectionConfig, Endpoint, Protocol};
pub use error::{DriverError, ErrorKind, Result};
pub use location::{LengthUnit, Location};
pub use parameter::{Axis, AxisField, FirmwareParameter, SystemField};
pub use state::{ConnectionPhase, FirmwareVersion};
pub use status::{StatusClass, StatusCode, status_name};
pub use transport::{
    ClientConfig, HttpRequest, HttpTransport, MockTransport, Payload, RawResponse, UreqTransport,
};
