//! Motion and actuation session with a firenodejs controller.
//!
//! [`FireNodeDriver`] owns the session state, the last-known pose and the
//! move-completion tracker. All wire traffic goes through a shared
//! [`CommandChannel`]; motion commands are additionally serialized so a
//! move and its completion wait never interleave with another move.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, warn};

use crate::capability::{ActuationCapable, Connectable, MotionCapable};
use crate::channel::{CommandChannel, Response};
use crate::driver::monitor::StatusMonitor;
use crate::driver::pending::MovementTracker;
use crate::driver::settings::DriverSettings;
use crate::endpoint::ConnectionConfig;
use crate::error::{DriverError, Result};
use crate::location::{LengthUnit, Location};
use crate::parameter::FirmwareParameter;
use crate::state::{ConnectionPhase, FirmwareVersion, SessionState};
use crate::status::StatusClass;
use crate::transport::{ClientConfig, HttpTransport, UreqTransport};

pub const HELLO_PATH: &str = "/firenodejs/hello";
pub const MODELS_PATH: &str = "/firenodejs/models";
pub const FIRESTEP_PATH: &str = "/firestep";
pub const RESET_PATH: &str = "/firestep/reset";

/// Rotation deltas below this many degrees are not sent.
pub const ROTATION_EPSILON: f64 = 0.01;

/// Whether a move that would not change the cached pose is still sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    IfChanged,
    /// The cached pose may be stale, e.g. right after homing.
    Always,
}

// ── FireNodeDriver ───────────────────────────────────────────────

pub struct FireNodeDriver {
    connection: ConnectionConfig,
    settings: DriverSettings,
    channel: Arc<CommandChannel>,
    state: Mutex<SessionState>,
    /// Last commanded position of the head mount, in millimetres.
    pose: Mutex<Location>,
    tracker: Arc<MovementTracker>,
    monitor: Mutex<Option<StatusMonitor>>,
    motion: tokio::sync::Mutex<()>,
}

impl FireNodeDriver {
    /// Driver talking HTTP through a fresh `ureq` client.
    pub fn new(connection: ConnectionConfig, settings: DriverSettings) -> Self {
        let transport = Arc::new(UreqTransport::new(ClientConfig::from(&connection)));
        Self::with_transport(connection, settings, transport)
    }

    pub fn with_transport(
        connection: ConnectionConfig,
        settings: DriverSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self::with_channel(connection, settings, Arc::new(CommandChannel::new(transport)))
    }

    /// Driver sharing an existing channel, e.g. with an HTTP camera.
    pub fn with_channel(
        connection: ConnectionConfig,
        settings: DriverSettings,
        channel: Arc<CommandChannel>,
    ) -> Self {
        Self {
            connection,
            settings,
            channel,
            state: Mutex::new(SessionState::new()),
            pose: Mutex::new(Location::zero(LengthUnit::Millimeters)),
            tracker: Arc::new(MovementTracker::new()),
            monitor: Mutex::new(None),
            motion: tokio::sync::Mutex::new(()),
        }
    }

    pub fn channel(&self) -> &Arc<CommandChannel> {
        &self.channel
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.state.lock().phase().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().is_connected()
    }

    /// Firmware version read during the handshake.
    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.state.lock().firmware()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open a session: handshake, version check, optional enable.
    ///
    /// Calling `connect` on a connected session is a no-op.
    pub async fn connect(&self) -> Result<()> {
        let conn = &self.connection;
        {
            let mut state = self.state.lock();
            if state.is_connected() {
                return Ok(());
            }
            if conn.host.trim().is_empty() {
                return Err(DriverError::HostNotConfigured);
            }
            state.phase_mut().open(conn.base_url())?;
        }

        if let Err(e) = self.open_session().await {
            self.state.lock().abandon();
            return Err(e);
        }

        if self.settings.status_poll_interval > std::time::Duration::ZERO {
            let monitor = StatusMonitor::spawn(
                self.channel.clone(),
                self.tracker.clone(),
                self.settings.status_path.clone(),
                self.settings.status_poll_interval,
            );
            *self.monitor.lock() = Some(monitor);
        }

        if self.settings.enable_on_connect {
            if let Err(e) = self.set_enabled(true).await {
                error!("enable after connect failed: {e}");
                self.disconnect().await?;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn open_session(&self) -> Result<()> {
        let conn = &self.connection;
        self.channel.configure(conn.protocol, &conn.host, conn.port);

        let version = self.handshake().await?;
        let mut state = self.state.lock();
        state.accept_version(version, self.settings.min_required_version)?;
        info!("{}", state.phase());
        Ok(())
    }

    /// Bounded hello + version rounds.
    async fn handshake(&self) -> Result<FirmwareVersion> {
        let attempts = self.settings.connect_attempts.max(1);
        for attempt in 1..=attempts {
            self.state.lock().phase_mut().attempt(attempt)?;
            match self.probe_version().await {
                Ok(version) => return Ok(version),
                Err(e) => warn!(attempt, attempts, "handshake failed: {e}"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.connect_retry_delay).await;
            }
        }
        Err(DriverError::ConnectionFailed {
            url: self.connection.base_url(),
            min_version: self.settings.min_required_version,
        })
    }

    async fn probe_version(&self) -> Result<FirmwareVersion> {
        let hello = self.channel.get(HELLO_PATH).await?;
        debug!(body = %hello.body, "hello");
        let models = self.channel.get(MODELS_PATH).await?;
        FirmwareVersion::from_models(&models.body)
    }

    /// End the session. Outstanding move waits fail with `Cancelled`.
    pub async fn disconnect(&self) -> Result<()> {
        let uptime = {
            let mut state = self.state.lock();
            let phase = state.phase_mut();
            if matches!(
                phase,
                ConnectionPhase::Disconnected | ConnectionPhase::Disconnecting { .. }
            ) {
                return Ok(());
            }
            let uptime = phase.uptime();
            phase.close()?;
            uptime
        };

        self.tracker.cancel_all();
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.stop().await;
        }

        self.state.lock().phase_mut().closed()?;
        info!(?uptime, "disconnected");
        Ok(())
    }

    /// Power up (or down) the machine's outputs.
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_connected()?;
        let pins = &self.settings.pins;
        info!(enabled, "set enabled");

        if enabled {
            if pins.power_supply_management {
                self.write_pin(pins.power_supply_pin, true).await?;
            }
            self.send_before_reset_config().await?;
            self.command(json!({
                "xdh": !self.settings.invert_motor_x,
                "ydh": !self.settings.invert_motor_y,
                "zdh": !self.settings.invert_motor_z,
            }))
            .await?;
            self.reset().await?;
            self.write_pin(pins.end_effector_led_ring_pin, true).await?;
            self.write_pin(pins.up_looking_led_ring_pin, true).await?;
        } else {
            self.write_pin(pins.end_effector_led_ring_pin, false).await?;
            self.write_pin(pins.up_looking_led_ring_pin, false).await?;
            self.reset().await?;
            if pins.power_supply_management {
                self.write_pin(pins.power_supply_pin, false).await?;
            }
        }
        Ok(())
    }

    /// A JSON array is sent element by element.
    async fn send_before_reset_config(&self) -> Result<()> {
        let raw = self.settings.before_reset_config.trim();
        if raw.is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<Value>(raw)? {
            Value::Array(items) => {
                for item in items {
                    self.command(item).await?;
                }
            }
            doc => {
                self.command(doc).await?;
            }
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.channel.post_json(RESET_PATH, json!({})).await?;
        Ok(())
    }

    // ── Motion ───────────────────────────────────────────────────

    /// Home all axes, then move to the configured home location.
    pub async fn home(&self) -> Result<()> {
        let _motion = self.motion.lock().await;
        self.ensure_connected()?;

        info!("homing");
        self.dispatch_and_wait(json!({"hom": ""})).await?;

        let home = self
            .settings
            .home_location
            .convert_to_units(LengthUnit::Millimeters);
        self.move_axes(&home, 1.0, Dispatch::Always).await?;
        self.pose.lock().merge_set_components(&home);
        Ok(())
    }

    /// Move so that the point `offset` from the head mount reaches `target`.
    ///
    /// NaN components of `target` are left where they are.
    pub async fn move_to(&self, offset: &Location, target: &Location, speed: f64) -> Result<()> {
        let _motion = self.motion.lock().await;
        self.ensure_connected()?;

        let target = target
            .subtract(offset)
            .convert_to_units(LengthUnit::Millimeters);
        self.move_axes(&target, speed, Dispatch::IfChanged).await
    }

    /// `target` is in millimetres, already offset-corrected.
    async fn move_axes(&self, target: &Location, speed: f64, dispatch: Dispatch) -> Result<()> {
        let current = *self.pose.lock();
        let always = dispatch == Dispatch::Always;

        if !target.rotation.is_nan()
            && (always || (target.rotation - current.rotation).abs() >= ROTATION_EPSILON)
        {
            let steps = (target.rotation * self.settings.steps_per_revolution / 360.0).round() as i64;
            debug!(degrees = target.rotation, steps, "rotate");
            self.dispatch_and_wait(json!({ "mova": steps })).await?;
            self.pose.lock().rotation = target.rotation;
        }

        let distance = current.linear_distance_to(target);
        let any_linear = [target.x, target.y, target.z].iter().any(|v| !v.is_nan());
        if distance > 0.0 || (always && any_linear) {
            let mut axes = Map::new();
            let x = if self.settings.invert_axis_x { -target.x } else { target.x };
            let y = if self.settings.invert_axis_y { -target.y } else { target.y };
            for (name, value) in [("x", x), ("y", y), ("z", target.z)] {
                if !value.is_nan() {
                    axes.insert(name.to_string(), json!(value));
                }
            }
            axes.insert(
                "lpp".to_string(),
                json!(self.settings.long_path_precision(distance)),
            );

            info!(%target, speed, distance, "move");
            self.dispatch_and_wait(json!({ "mov": Value::Object(axes) }))
                .await?;

            let linear = Location::new(
                LengthUnit::Millimeters,
                target.x,
                target.y,
                target.z,
                f64::NAN,
            );
            self.pose.lock().merge_set_components(&linear);
        }
        Ok(())
    }

    /// Send a motion command and wait for completion if it is still running.
    async fn dispatch_and_wait(&self, doc: Value) -> Result<()> {
        let pending = self.tracker.begin();
        let (class, _) = self.command(doc).await?;
        if class.is_pending() {
            debug!(?class, "waiting for movement to complete");
            pending.wait(self.settings.movement_timeout).await?;
        }
        Ok(())
    }

    /// Current position of `offset`, derived from the last commanded pose.
    pub fn location(&self, offset: &Location) -> Location {
        self.pose.lock().add(offset)
    }

    /// Feed an asynchronous status report; returns `true` when it
    /// signalled motion complete.
    pub fn process_status_report(&self, report: &Value) -> bool {
        self.tracker.process_status_report(report)
    }

    // ── Actuation ────────────────────────────────────────────────

    /// Drive digital output `pin`. Pins `<= 0` are ignored.
    pub async fn actuate(&self, pin: i32, on: bool) -> Result<()> {
        self.ensure_connected()?;
        self.write_pin(pin, on).await
    }

    pub async fn set_vacuum(&self, on: bool) -> Result<()> {
        self.ensure_connected()?;
        let pins = &self.settings.pins;
        self.write_pin(pins.vacuum_pin, on != pins.invert_vacuum_pin)
            .await
    }

    pub async fn pick(&self) -> Result<()> {
        debug!("pick");
        self.set_vacuum(true).await
    }

    pub async fn place(&self) -> Result<()> {
        debug!("place");
        self.set_vacuum(false).await
    }

    async fn write_pin(&self, pin: i32, on: bool) -> Result<()> {
        if pin <= 0 {
            return Ok(());
        }
        let mut doc = Map::new();
        doc.insert(format!("iod{pin}"), json!(if on { 1 } else { 0 }));
        self.command(Value::Object(doc)).await?;
        Ok(())
    }

    // ── Parameters ───────────────────────────────────────────────

    pub async fn get_parameter(&self, parameter: FirmwareParameter) -> Result<Value> {
        self.ensure_connected()?;
        let key = parameter.key();
        let mut doc = Map::new();
        doc.insert(key.clone(), json!(""));

        let (_, resp) = self.command(Value::Object(doc)).await?;
        resp.result()
            .and_then(|r| r.get(&key))
            .cloned()
            .ok_or(DriverError::MissingField("r"))
    }

    pub async fn set_parameter(&self, parameter: FirmwareParameter, value: Value) -> Result<()> {
        self.ensure_connected()?;
        let mut doc = Map::new();
        doc.insert(parameter.key(), value);
        self.command(Value::Object(doc)).await?;
        Ok(())
    }

    // ── Wire ─────────────────────────────────────────────────────

    /// POST a FireStep command and classify its embedded status.
    async fn command(&self, doc: Value) -> Result<(StatusClass, Response)> {
        let description = doc.to_string();
        let resp = self.channel.post_json(FIRESTEP_PATH, doc).await?;
        match resp.check() {
            Ok(class) => Ok((class, resp)),
            Err(e) => {
                error!(command = %description, "{e}");
                Err(e)
            }
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        self.state.lock().ensure_connected()
    }
}

// ── Capabilities ─────────────────────────────────────────────────

#[async_trait]
impl Connectable for FireNodeDriver {
    async fn connect(&self) -> Result<()> {
        FireNodeDriver::connect(self).await
    }

    async fn disconnect(&self) -> Result<()> {
        FireNodeDriver::disconnect(self).await
    }

    fn is_connected(&self) -> bool {
        FireNodeDriver::is_connected(self)
    }
}

#[async_trait]
impl MotionCapable for FireNodeDriver {
    async fn home(&self) -> Result<()> {
        FireNodeDriver::home(self).await
    }

    async fn move_to(&self, offset: &Location, target: &Location, speed: f64) -> Result<()> {
        FireNodeDriver::move_to(self, offset, target, speed).await
    }

    fn location(&self, offset: &Location) -> Location {
        FireNodeDriver::location(self, offset)
    }
}

#[async_trait]
impl ActuationCapable for FireNodeDriver {
    async fn actuate(&self, pin: i32, on: bool) -> Result<()> {
        FireNodeDriver::actuate(self, pin, on).await
    }

    async fn pick(&self) -> Result<()> {
        FireNodeDriver::pick(self).await
    }

    async fn place(&self) -> Result<()> {
        FireNodeDriver::place(self).await
    }
}

// ── Tests ────────────────────────────────────────────────────────
