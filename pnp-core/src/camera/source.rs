//! Frame sources.
//!
//! A [`FrameSource`] produces one image per call. [`HttpImageSource`]
//! fetches a still over HTTP; [`DeviceSource`] drives a blocking
//! [`FrameGrabber`] on the blocking thread pool.

use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgba, RgbaImage, imageops};
use parking_lot::Mutex;
use tracing::debug;

use crate::camera::frame::{error_placeholder, no_signal_placeholder};
use crate::channel::CommandChannel;
use crate::error::{DriverError, Result};
use crate::transport::{ClientConfig, UreqTransport};

// ── Trait ────────────────────────────────────────────────────────

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Produce one image for a camera configured at `width`×`height`.
    async fn grab(&self, width: u32, height: u32) -> Result<RgbaImage>;

    /// Image shown in place of a failed grab.
    fn placeholder(&self, width: u32, height: u32) -> RgbaImage {
        error_placeholder(width, height)
    }

    /// Release any held resources. Called when the camera closes.
    async fn close(&self) {}

    fn describe(&self) -> String;
}

// ── HttpImageSource ──────────────────────────────────────────────

/// Fetches a fresh still image from a URL on every grab and draws it
/// into the top-left corner of a transparent frame of the configured size.
pub struct HttpImageSource {
    channel: Arc<CommandChannel>,
    url: String,
}

impl HttpImageSource {
    /// `url` is absolute, or a path on the channel's endpoint.
    pub fn new(channel: Arc<CommandChannel>, url: impl Into<String>) -> Self {
        Self {
            channel,
            url: url.into(),
        }
    }

    /// Source with its own HTTP client.
    pub fn standalone(url: impl Into<String>, client: ClientConfig) -> Self {
        let transport = Arc::new(UreqTransport::new(client));
        Self::new(Arc::new(CommandChannel::new(transport)), url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FrameSource for HttpImageSource {
    async fn grab(&self, width: u32, height: u32) -> Result<RgbaImage> {
        let bytes = self.channel.fetch(&self.url).await?;
        tokio::task::spawn_blocking(move || -> Result<RgbaImage> {
            let still = image::load_from_memory(&bytes)?.to_rgba8();
            let mut frame = RgbaImage::new(width, height);
            imageops::replace(&mut frame, &still, 0, 0);
            Ok(frame)
        })
        .await?
    }

    fn describe(&self) -> String {
        format!("http image {}", self.url)
    }
}

// ── DeviceSource ─────────────────────────────────────────────────

/// Blocking access to a video capture device.
pub trait FrameGrabber: Send + 'static {
    /// Open `device` asking for the preferred size. The device may
    /// deliver something else.
    fn open(&mut self, device: &str, width: u32, height: u32) -> Result<()>;
    fn is_open(&self) -> bool;
    fn read(&mut self) -> Result<RgbaImage>;
    fn release(&mut self);
}

pub const DEFAULT_DEVICE_WIDTH: u32 = 800;
pub const DEFAULT_DEVICE_HEIGHT: u32 = 600;

/// Opens the device lazily on first grab and keeps it open until closed.
pub struct DeviceSource<G: FrameGrabber> {
    device: String,
    width: u32,
    height: u32,
    grabber: Arc<Mutex<G>>,
}

impl<G: FrameGrabber> DeviceSource<G> {
    pub fn new(grabber: G, device: impl Into<String>) -> Self {
        Self::with_size(grabber, device, DEFAULT_DEVICE_WIDTH, DEFAULT_DEVICE_HEIGHT)
    }

    pub fn with_size(grabber: G, device: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            device: device.into(),
            width,
            height,
            grabber: Arc::new(Mutex::new(grabber)),
        }
    }
}

#[async_trait]
impl<G: FrameGrabber> FrameSource for DeviceSource<G> {
    /// Frames come at whatever size the device opened with.
    async fn grab(&self, _width: u32, _height: u32) -> Result<RgbaImage> {
        let grabber = self.grabber.clone();
        let device = self.device.clone();
        let (width, height) = (self.width, self.height);

        tokio::task::spawn_blocking(move || {
            let mut g = grabber.lock();
            if !g.is_open() {
                debug!(%device, width, height, "opening capture device");
                g.open(&device, width, height)?;
            }
            g.read()
        })
        .await?
    }

    fn placeholder(&self, width: u32, height: u32) -> RgbaImage {
        no_signal_placeholder(width, height)
    }

    async fn close(&self) {
        let grabber = self.grabber.clone();
        let released = tokio::task::spawn_blocking(move || {
            let mut g = grabber.lock();
            if g.is_open() {
                g.release();
            }
        })
        .await;
        if let Err(e) = released {
            tracing::warn!("releasing capture device failed: {e}");
        }
    }

    fn describe(&self) -> String {
        format!("device {}", self.device)
    }
}

// ── PatternGrabber ───────────────────────────────────────────────

/// Synthetic grabber producing a scrolling gradient. Used for dry runs
/// without hardware.
#[derive(Debug, Default)]
pub struct PatternGrabber {
    size: Option<(u32, u32)>,
    tick: u32,
}

impl FrameGrabber for PatternGrabber {
    fn open(&mut self, device: &str, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(DriverError::Capture(format!(
                "cannot open {device} at {width}x{height}"
            )));
        }
        self.size = Some((width, height));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.size.is_some()
    }

    fn read(&mut self) -> Result<RgbaImage> {
        let (w, h) = self
            .size
            .ok_or_else(|| DriverError::Capture("device not open".into()))?;
        self.tick = self.tick.wrapping_add(1);
        let shift = self.tick;
        Ok(RgbaImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_add(shift) ^ y) as u8;
            Rgba([v, v.wrapping_mul(3), 255 - v, 255])
        }))
    }

    fn release(&mut self) {
        self.size = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Protocol;
    use crate::transport::{MockTransport, RawResponse};
    use image::ImageFormat;
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn http_source_decodes_image() {
        let body = png(8, 6);
        let mock = MockTransport::new(move |_| Ok(RawResponse::bytes(200, "image/png", body.clone())));
        let channel = Arc::new(CommandChannel::new(Arc::new(mock.clone())));
        channel.configure(Protocol::Http, "camera.local", 0);

        let src = HttpImageSource::new(channel, "/snapshot.png");
        let img = src.grab(8, 6).await.unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(7, 5), &Rgba([10, 20, 30, 255]));
        assert_eq!(mock.requests()[0].url, "http://camera.local/snapshot.png");
    }

    #[tokio::test]
    async fn http_still_is_drawn_into_configured_frame() {
        let body = png(8, 6);
        let mock = MockTransport::new(move |_| Ok(RawResponse::bytes(200, "image/png", body.clone())));
        let channel = Arc::new(CommandChannel::new(Arc::new(mock)));
        let src = HttpImageSource::new(channel, "http://camera.local/snapshot.png");

        let larger = src.grab(12, 10).await.unwrap();
        assert_eq!(larger.dimensions(), (12, 10));
        assert_eq!(larger.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
        assert_eq!(larger.get_pixel(11, 9), &Rgba([0, 0, 0, 0]));

        let cropped = src.grab(4, 4).await.unwrap();
        assert_eq!(cropped.dimensions(), (4, 4));
        assert_eq!(cropped.get_pixel(3, 3), &Rgba([10, 20, 30, 255]));
    }

    #[tokio::test]
    async fn http_source_rejects_garbage() {
        let mock = MockTransport::new(|_| Ok(RawResponse::bytes(200, "image/png", "nope")));
        let channel = Arc::new(CommandChannel::new(Arc::new(mock)));
        let src = HttpImageSource::new(channel, "http://camera.local/x.png");
        let err = src.grab(8, 8).await.unwrap_err();
        assert!(matches!(err, DriverError::Capture(_)));
    }

    #[tokio::test]
    async fn device_source_opens_once_and_releases() {
        let src = DeviceSource::with_size(PatternGrabber::default(), "pattern", 32, 16);
        let a = src.grab(640, 480).await.unwrap();
        let b = src.grab(640, 480).await.unwrap();
        assert_eq!(a.dimensions(), (32, 16));
        assert_ne!(a, b);

        src.close().await;
        assert!(!src.grabber.lock().is_open());
    }

    #[tokio::test]
    async fn device_open_failure_surfaces() {
        let src = DeviceSource::with_size(PatternGrabber::default(), "pattern", 0, 0);
        assert!(src.grab(10, 10).await.is_err());
        assert_eq!(src.placeholder(10, 10).get_pixel(5, 5), &Rgba([255, 0, 255, 255]));
    }
}
