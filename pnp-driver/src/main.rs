//! pnp-driver entry point.
//!
//! ```text
//! pnp-driver probe                        Connect and print the firmware version
//! pnp-driver home                         Home all axes
//! pnp-driver move --x 10 --y 20           Move the head (unset axes stay put)
//! pnp-driver actuate --pin 5 --on         Drive a digital output
//! pnp-driver get-param xtm                Read a firmware parameter
//! pnp-driver set-param xtm 200            Write a firmware parameter
//! pnp-driver capture --out frame.png      Save one camera frame
//! pnp-driver watch --seconds 10           Run continuous capture
//! pnp-driver --config <path>              Load a custom config TOML
//! pnp-driver --gen-config                 Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pnp_core::FirmwareParameter;
use pnp_driver::config::PnpConfig;
use pnp_driver::service::{Action, MachineService};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pnp-driver", about = "firenodejs pick-and-place driver")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "pnp-driver.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and report the firmware version.
    Probe,
    /// Home all axes, then move to the configured home location.
    Home,
    /// Move the head mount.
    Move {
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        z: Option<f64>,
        /// Degrees.
        #[arg(long, allow_negative_numbers = true)]
        rotation: Option<f64>,
        /// Fraction of full speed.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
    /// Switch a digital output.
    Actuate {
        #[arg(long)]
        pin: i32,
        #[arg(long, conflicts_with = "off", required_unless_present = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
    /// Vacuum on.
    Pick,
    /// Vacuum off.
    Place,
    /// Read a firmware parameter such as `xtm` or `systv`.
    GetParam { key: FirmwareParameter },
    /// Write a firmware parameter. The value is parsed as JSON when possible.
    SetParam { key: FirmwareParameter, value: String },
    /// Capture a single frame to a PNG file.
    Capture {
        #[arg(long, default_value = "frame.png")]
        out: PathBuf,
    },
    /// Run continuous capture and report the frame count.
    Watch {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

impl From<Command> for Action {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Probe => Action::Probe,
            Command::Home => Action::Home,
            Command::Move {
                x,
                y,
                z,
                rotation,
                speed,
            } => Action::Move {
                x,
                y,
                z,
                rotation,
                speed,
            },
            Command::Actuate { pin, on, .. } => Action::Actuate { pin, on },
            Command::Pick => Action::Pick,
            Command::Place => Action::Place,
            Command::GetParam { key } => Action::GetParam(key),
            Command::SetParam { key, value } => {
                let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                Action::SetParam(key, value)
            }
            Command::Capture { out } => Action::Capture { out },
            Command::Watch { seconds } => Action::Watch { seconds },
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&PnpConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = PnpConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(command) = cli.command else {
        eprintln!("no command given; try --help");
        std::process::exit(2);
    };

    info!("pnp-driver v{}", env!("CARGO_PKG_VERSION"));
    info!("controller: {}", config.to_connection_config().base_url());

    let service = MachineService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run(command.into()).await?;

    Ok(())
}
