//! Continuous capture loop.
//!
//! A [`Camera`] runs at most one polling task. The task starts with the
//! first listener and stops when the last one leaves:
//!
//! ```text
//!  capture ──► transform ──► broadcast ──► sleep(refresh) ──┐
//!     ▲                                                     │
//!     └─────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation is observed during the fetch and during the sleep.
//! Listener failures are logged and never stop the loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::camera::frame::{CaptureStats, Frame};
use crate::camera::source::FrameSource;
use crate::camera::transform::FrameTransform;
use crate::capability::CaptureCapable;

// ── Listener ─────────────────────────────────────────────────────

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every frame of a continuous capture.
pub trait CameraListener: Send + Sync {
    fn frame_received(&self, frame: &Frame) -> Result<(), ListenerError>;
}

impl<F> CameraListener for F
where
    F: Fn(&Frame) -> Result<(), ListenerError> + Send + Sync,
{
    fn frame_received(&self, frame: &Frame) -> Result<(), ListenerError> {
        self(frame)
    }
}

/// Handle returned by [`Camera::start_continuous_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

// ── CameraConfig ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Placeholder size.
    pub width: u32,
    pub height: u32,
    pub refresh_interval: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            refresh_interval: Duration::from_millis(500),
        }
    }
}

// ── Camera ───────────────────────────────────────────────────────

pub struct Camera {
    inner: Arc<CameraInner>,
    session: Mutex<Option<CaptureSession>>,
    /// Serializes start/stop/reconfigure.
    lifecycle: tokio::sync::Mutex<()>,
}

struct CameraInner {
    source: RwLock<Arc<dyn FrameSource>>,
    transform: RwLock<Option<Arc<dyn FrameTransform>>>,
    config: RwLock<CameraConfig>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn CameraListener>)>>,
    next_listener: AtomicU64,
    sequence: AtomicU64,
    stats: watch::Sender<CaptureStats>,
}

struct CaptureSession {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Camera {
    pub fn new(source: Arc<dyn FrameSource>, config: CameraConfig) -> Self {
        let (stats, _) = watch::channel(CaptureStats::default());
        Self {
            inner: Arc::new(CameraInner {
                source: RwLock::new(source),
                transform: RwLock::new(None),
                config: RwLock::new(config),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                sequence: AtomicU64::new(0),
                stats,
            }),
            session: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> CameraConfig {
        self.inner.config.read().clone()
    }

    pub fn source_description(&self) -> String {
        self.inner.source.read().describe()
    }

    /// Latest running totals.
    pub fn stats(&self) -> watch::Receiver<CaptureStats> {
        self.inner.stats.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    pub fn is_capturing(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Grab one frame. A source failure yields a placeholder frame.
    pub async fn capture(&self) -> Frame {
        self.inner.capture().await
    }

    /// Install or clear the per-frame transform. Takes effect on the
    /// next capture.
    pub fn set_transform(&self, transform: Option<Arc<dyn FrameTransform>>) {
        *self.inner.transform.write() = transform;
    }

    /// Register `listener`; starts the loop if it is not running.
    pub async fn start_continuous_capture(&self, listener: Arc<dyn CameraListener>) -> ListenerId {
        let _lifecycle = self.lifecycle.lock().await;
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.write().push((id, listener));
        debug!(?id, "listener registered");
        self.ensure_running();
        id
    }

    /// Unregister `id`. When no listeners remain the loop is cancelled
    /// and awaited. The listener is never called after this returns.
    pub async fn stop_continuous_capture(&self, id: ListenerId) {
        let _lifecycle = self.lifecycle.lock().await;
        let remaining = {
            let mut listeners = self.inner.listeners.write();
            listeners.retain(|(lid, _)| *lid != id);
            listeners.len()
        };
        debug!(?id, remaining, "listener removed");
        if remaining == 0 {
            self.stop_loop().await;
        }
    }

    /// Swap the frame source, restarting the loop if anyone is listening.
    pub async fn set_source(&self, source: Arc<dyn FrameSource>) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_loop().await;
        let old = std::mem::replace(&mut *self.inner.source.write(), source);
        old.close().await;
        info!(source = %self.source_description(), "camera source changed");
        self.restart_if_listening();
    }

    pub async fn set_refresh_interval(&self, interval: Duration) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_loop().await;
        self.inner.config.write().refresh_interval = interval;
        self.restart_if_listening();
    }

    /// Stop the loop, drop every listener and release the source.
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_loop().await;
        self.inner.listeners.write().clear();
        let source = self.inner.source.read().clone();
        source.close().await;
    }

    fn restart_if_listening(&self) {
        if self.listener_count() > 0 {
            self.ensure_running();
        }
    }

    fn ensure_running(&self) {
        let mut session = self.session.lock();
        if session.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(self.inner.clone(), cancel.clone()));
        *session = Some(CaptureSession { cancel, handle });
        info!(source = %self.source_description(), "continuous capture started");
    }

    async fn stop_loop(&self) {
        let session = self.session.lock().take();
        if let Some(CaptureSession { cancel, handle }) = session {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!("capture task failed: {e}");
            }
            info!("continuous capture stopped");
        }
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

impl CameraInner {
    async fn capture(&self) -> Frame {
        let source = self.source.read().clone();
        let (width, height) = {
            let config = self.config.read();
            (config.width, config.height)
        };

        let (image, placeholder) = match source.grab(width, height).await {
            Ok(image) => (image, false),
            Err(e) => {
                warn!(source = %source.describe(), "capture failed: {e}");
                (source.placeholder(width, height), true)
            }
        };

        let transform = self.transform.read().clone();
        let image = match transform {
            Some(t) => t.apply(image),
            None => image,
        };

        let frame = Frame {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            captured_at: Instant::now(),
            placeholder,
            image,
        };
        self.stats.send_modify(|s| {
            s.frames += 1;
            if placeholder {
                s.placeholders += 1;
            }
            s.last_width = frame.width();
            s.last_height = frame.height();
        });
        frame
    }

    /// Deliver to every listener. The read lock is held throughout, so a
    /// removal waits for an in-flight broadcast to finish.
    fn broadcast(&self, frame: &Frame) {
        let listeners = self.listeners.read();
        for (id, listener) in listeners.iter() {
            match catch_unwind(AssertUnwindSafe(|| listener.frame_received(frame))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(?id, "listener failed: {e}"),
                Err(_) => warn!(?id, "listener panicked"),
            }
        }
    }
}

async fn run_loop(inner: Arc<CameraInner>, cancel: CancellationToken) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = inner.capture() => frame,
        };
        if cancel.is_cancelled() {
            break;
        }
        inner.broadcast(&frame);

        let interval = inner.config.read().refresh_interval;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("capture loop exited");
}

#[async_trait]
impl CaptureCapable for Camera {
    async fn capture(&self) -> Frame {
        Camera::capture(self).await
    }

    async fn start_continuous_capture(&self, listener: Arc<dyn CameraListener>) -> ListenerId {
        Camera::start_continuous_capture(self, listener).await
    }

    async fn stop_continuous_capture(&self, id: ListenerId) {
        Camera::stop_continuous_capture(self, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::source::{DeviceSource, PatternGrabber};
    use crate::error::{DriverError, Result};
    use image::RgbaImage;
    use std::sync::atomic::AtomicUsize;

    struct Failing;

    #[async_trait]
    impl FrameSource for Failing {
        async fn grab(&self, _width: u32, _height: u32) -> Result<RgbaImage> {
            Err(DriverError::Capture("offline".into()))
        }

        fn describe(&self) -> String {
            "failing".into()
        }
    }

    fn fast() -> CameraConfig {
        CameraConfig {
            width: 40,
            height: 30,
            refresh_interval: Duration::from_millis(5),
        }
    }

    fn counting() -> (Arc<AtomicUsize>, Arc<dyn CameraListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let listener = move |_: &Frame| -> std::result::Result<(), ListenerError> {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        (count, Arc::new(listener))
    }

    #[tokio::test]
    async fn failing_source_yields_placeholder() {
        let cam = Camera::new(Arc::new(Failing), fast());
        let frame = cam.capture().await;
        assert!(frame.placeholder);
        assert_eq!(frame.image.dimensions(), (40, 30));
        assert_eq!(cam.stats().borrow().placeholders, 1);
    }

    #[tokio::test]
    async fn loop_runs_only_while_listened() {
        let source = DeviceSource::with_size(PatternGrabber::default(), "pattern", 16, 16);
        let cam = Camera::new(Arc::new(source), fast());
        let (count, listener) = counting();

        let id = cam.start_continuous_capture(listener).await;
        assert!(cam.is_capturing());
        tokio::time::sleep(Duration::from_millis(60)).await;
        cam.stop_continuous_capture(id).await;
        assert!(!cam.is_capturing());

        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 2, "expected several frames, got {seen}");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn one_loop_for_many_listeners() {
        let cam = Camera::new(Arc::new(Failing), fast());
        let (a_count, a) = counting();
        let (b_count, b) = counting();

        let a_id = cam.start_continuous_capture(a).await;
        let b_id = cam.start_continuous_capture(b).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        cam.stop_continuous_capture(a_id).await;
        assert!(cam.is_capturing());
        let a_seen = a_count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(a_count.load(Ordering::SeqCst), a_seen);
        assert!(b_count.load(Ordering::SeqCst) > a_seen);

        cam.stop_continuous_capture(b_id).await;
        assert!(!cam.is_capturing());
    }

    #[tokio::test]
    async fn failing_listener_does_not_stop_others() {
        let cam = Camera::new(Arc::new(Failing), fast());
        let bad = |_: &Frame| -> std::result::Result<(), ListenerError> { Err("boom".into()) };
        let (count, good) = counting();

        let bad_id = cam.start_continuous_capture(Arc::new(bad)).await;
        let good_id = cam.start_continuous_capture(good).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        cam.stop_continuous_capture(bad_id).await;
        cam.stop_continuous_capture(good_id).await;

        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn transform_applies_to_every_frame() {
        let cam = Camera::new(Arc::new(Failing), fast());
        cam.set_transform(Some(Arc::new(crate::camera::ImageTransform {
            rotation: crate::camera::Rotation::R90,
            ..Default::default()
        })));
        assert_eq!(cam.capture().await.image.dimensions(), (30, 40));
    }

    #[tokio::test]
    async fn reconfigure_restarts_only_with_listeners() {
        let cam = Camera::new(Arc::new(Failing), fast());
        cam.set_refresh_interval(Duration::from_millis(2)).await;
        assert!(!cam.is_capturing());

        let (_, listener) = counting();
        let id = cam.start_continuous_capture(listener).await;
        cam.set_source(Arc::new(DeviceSource::new(PatternGrabber::default(), "pattern")))
            .await;
        assert!(cam.is_capturing());
        assert_eq!(cam.config().refresh_interval, Duration::from_millis(2));

        cam.stop_continuous_capture(id).await;
        cam.close().await;
        assert_eq!(cam.listener_count(), 0);
    }
}
