//! Machine service: builds the driver and camera from configuration and
//! runs one CLI action against them.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pnp_core::camera::{
    Camera, CameraListener, DeviceSource, Frame, FrameSource, HttpImageSource, ListenerError,
    PatternGrabber,
};
use pnp_core::{
    ClientConfig, CommandChannel, DriverError, FireNodeDriver, FirmwareParameter, HttpTransport,
    LengthUnit, Location, Result, UreqTransport,
};

use crate::config::{CameraSourceKind, PnpConfig};

// ── Action ───────────────────────────────────────────────────────

/// One unit of work requested from the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Connect and report the firmware version.
    Probe,
    Home,
    /// Move the head mount; `None` leaves an axis where it is.
    Move {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        rotation: Option<f64>,
        speed: f64,
    },
    Actuate {
        pin: i32,
        on: bool,
    },
    Pick,
    Place,
    GetParam(FirmwareParameter),
    SetParam(FirmwareParameter, Value),
    /// Grab one frame and write it as PNG.
    Capture {
        out: PathBuf,
    },
    /// Run continuous capture for a while and report the frame count.
    Watch {
        seconds: u64,
    },
}

impl Action {
    fn needs_controller(&self) -> bool {
        !matches!(self, Self::Capture { .. } | Self::Watch { .. })
    }
}

// ── MachineService ───────────────────────────────────────────────

pub struct MachineService {
    config: PnpConfig,
    driver: Arc<FireNodeDriver>,
    camera: Camera,
    cancel: CancellationToken,
}

impl MachineService {
    /// Build a service talking HTTP to the configured controller.
    pub fn new(config: PnpConfig) -> Self {
        let conn = config.to_connection_config();
        let transport: Arc<dyn HttpTransport> =
            Arc::new(UreqTransport::new(ClientConfig::from(&conn)));
        Self::with_transport(config, transport)
    }

    /// Build a service over an explicit transport.
    pub fn with_transport(config: PnpConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let conn = config.to_connection_config();
        let channel = Arc::new(CommandChannel::new(transport));
        if !conn.host.is_empty() {
            channel.configure(conn.protocol, &conn.host, conn.port);
        }

        let driver = Arc::new(FireNodeDriver::with_channel(
            conn.clone(),
            config.to_driver_settings(),
            channel.clone(),
        ));

        let source = build_source(&config, &channel, &conn);
        let camera = Camera::new(source, config.to_camera_config());
        let transform = config.image_transform();
        if !transform.is_identity() {
            camera.set_transform(Some(Arc::new(transform)));
        }

        Self {
            config,
            driver,
            camera,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the running action when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn driver(&self) -> &Arc<FireNodeDriver> {
        &self.driver
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Run `action`, then tear the session down.
    pub async fn run(&self, action: Action) -> Result<()> {
        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(DriverError::Cancelled),
            res = self.execute(&action) => res,
        };

        self.camera.close().await;
        if let Err(e) = self.driver.disconnect().await {
            warn!("disconnect failed: {e}");
        }
        outcome
    }

    async fn execute(&self, action: &Action) -> Result<()> {
        if action.needs_controller() {
            self.driver.connect().await?;
        }

        match action {
            Action::Probe => {
                let version = self.driver.firmware_version();
                let url = self.config.to_connection_config().base_url();
                match version {
                    Some(v) => println!("{url}: firenodejs {v} (ordinal {})", v.ordinal()),
                    None => println!("{url}: connected"),
                }
            }
            Action::Home => {
                self.driver.home().await?;
                println!("homed at {}", self.driver.location(&self.mount()));
            }
            Action::Move {
                x,
                y,
                z,
                rotation,
                speed,
            } => {
                let unset = |v: &Option<f64>| v.unwrap_or(f64::NAN);
                let target = Location::new(
                    self.config.motion.units,
                    unset(x),
                    unset(y),
                    unset(z),
                    unset(rotation),
                );
                self.driver
                    .move_to(&self.mount(), &target, speed.clamp(0.0, 1.0))
                    .await?;
                println!("at {}", self.driver.location(&self.mount()));
            }
            Action::Actuate { pin, on } => {
                self.driver.actuate(*pin, *on).await?;
                println!("iod{pin} = {}", u8::from(*on));
            }
            Action::Pick => self.driver.pick().await?,
            Action::Place => self.driver.place().await?,
            Action::GetParam(param) => {
                let value = self.driver.get_parameter(*param).await?;
                println!("{param} = {value}");
            }
            Action::SetParam(param, value) => {
                self.driver.set_parameter(*param, value.clone()).await?;
                println!("{param} <- {value}");
            }
            Action::Capture { out } => {
                let frame = self.camera.capture().await;
                if frame.placeholder {
                    warn!("source failed; writing placeholder frame");
                }
                let image = frame.image;
                let path = out.clone();
                tokio::task::spawn_blocking(move || {
                    image.save_with_format(&path, image::ImageFormat::Png)
                })
                .await??;
                println!("wrote {}", out.display());
            }
            Action::Watch { seconds } => self.watch(Duration::from_secs(*seconds)).await,
        }
        Ok(())
    }

    async fn watch(&self, duration: Duration) {
        let counter = Arc::new(FrameCounter::default());
        let id = self
            .camera
            .start_continuous_capture(counter.clone() as Arc<dyn CameraListener>)
            .await;
        info!(source = %self.camera.source_description(), ?duration, "watching");

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
        self.camera.stop_continuous_capture(id).await;

        let stats = self.camera.stats().borrow().clone();
        println!(
            "{} frames ({} placeholders), last {}x{}",
            counter.frames.load(Ordering::Relaxed),
            stats.placeholders,
            stats.last_width,
            stats.last_height
        );
    }

    /// The head mount itself: no offset.
    fn mount(&self) -> Location {
        Location::zero(LengthUnit::Millimeters)
    }
}

fn build_source(
    config: &PnpConfig,
    channel: &Arc<CommandChannel>,
    conn: &pnp_core::ConnectionConfig,
) -> Arc<dyn FrameSource> {
    let cam = &config.camera;
    match cam.source {
        CameraSourceKind::Http => {
            if cam.share_controller_channel {
                Arc::new(HttpImageSource::new(channel.clone(), cam.url.clone()))
            } else {
                Arc::new(HttpImageSource::standalone(
                    cam.url.clone(),
                    ClientConfig::from(conn),
                ))
            }
        }
        CameraSourceKind::Pattern => Arc::new(DeviceSource::with_size(
            PatternGrabber::default(),
            cam.device.clone(),
            cam.width,
            cam.height,
        )),
    }
}

#[derive(Default)]
struct FrameCounter {
    frames: AtomicU64,
}

impl CameraListener for FrameCounter {
    fn frame_received(&self, frame: &Frame) -> std::result::Result<(), ListenerError> {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            n,
            sequence = frame.sequence,
            placeholder = frame.placeholder,
            "frame"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
