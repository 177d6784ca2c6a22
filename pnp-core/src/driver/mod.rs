//! FireStep motion controller driver.
//!
//! [`FireNodeDriver`] is the session object; [`DriverSettings`] carries
//! the machine-specific tuning; [`MovementTracker`] resolves move waits
//! from status reports; [`StatusMonitor`] polls for them.

mod monitor;
mod pending;
mod session;
mod settings;

pub use monitor::StatusMonitor;
pub use pending::{MovementTracker, PendingMove, STAT_MOTION_COMPLETE};
pub use session::{
    FIRESTEP_PATH, FireNodeDriver, HELLO_PATH, MODELS_PATH, RESET_PATH, ROTATION_EPSILON,
};
pub use settings::{DriverSettings, PinSettings};
