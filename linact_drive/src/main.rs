//! # linact CLI
//!
//! One-shot commands against a left/right drive pair.
//!
//! # Usage
//!
//! ```bash
//! # Home both actuators
//! linact --config /etc/linact/linact.toml home
//!
//! # Full bring-up against the simulated drive pair
//! linact --config config/linact.example.toml --simulate bring-up
//!
//! # Status as JSON, verbose logs
//! linact -c linact.toml -v status --json
//!
//! # Fault reset with the alternative mode profile
//! linact -c linact.toml fault-reset --profile alternative
//! ```

use clap::{Parser, Subcommand};
use linact_common::config::{ConfigError, ConfigLoader, DriveConfig, LogLevel};
use linact_common::position::FeedbackPair;
use linact_common::side::SidePair;
use linact_common::status::FaultClass;
use linact_drive::transport::Connector;
use linact_drive::{DualDrive, HomingOutcome, SimBus, TcpConnector};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// linact - dual linear-actuator coordination over Modbus TCP
#[derive(Parser, Debug)]
#[command(name = "linact")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Dual linear-actuator coordination over Modbus TCP")]
#[command(long_about = None)]
struct Args {
    /// Path to the drive configuration file.
    #[arg(short, long, default_value = "/etc/linact/linact.toml")]
    config: PathBuf,

    /// Use the in-process simulated drive pair instead of Modbus TCP.
    #[arg(short = 's', long)]
    simulate: bool,

    /// Override the left drive host.
    #[arg(long, value_name = "HOST")]
    left_host: Option<String>,

    /// Override the right drive host.
    #[arg(long, value_name = "HOST")]
    right_host: Option<String>,

    /// Override the TCP port of both drives.
    #[arg(long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Home both actuators and wait for completion.
    Home,
    /// Stop both actuators.
    Stop,
    /// Clear drive faults through the guarded mode word.
    FaultReset {
        /// Mode profile: "default" or "alternative".
        #[arg(long, default_value = "default")]
        profile: String,
    },
    /// Print status, fault codes and feedback.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Home, apply the motion profile and switch to analog position control.
    BringUp,
    /// Restore drive default settings.
    Reset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run().await {
        error!("linact failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Tracing is up before a load error is returned, so it gets logged.
    let loaded = load_config(&args);
    let log_level = loaded
        .as_ref()
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);
    let config = loaded?;
    info!("linact v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.simulate {
        info!("Simulation mode enabled");
        let bus = SimBus::new(&config);
        let drive = DualDrive::new(config, bus.connector())?;
        execute(drive, args.command).await
    } else {
        let drive = DualDrive::new(config, TcpConnector)?;
        execute(drive, args.command).await
    }
}

fn load_config(args: &Args) -> Result<DriveConfig, ConfigError> {
    let mut config = DriveConfig::load(&args.config)?;
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut DriveConfig, args: &Args) {
    if let Some(host) = &args.left_host {
        config.left.host = host.clone();
    }
    if let Some(host) = &args.right_host {
        config.right.host = host.clone();
    }
    if let Some(port) = args.port {
        config.left.port = port;
        config.right.port = port;
    }
}

async fn execute<C: Connector>(
    mut drive: DualDrive<C>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = drive.connect().await {
        drive.cleanup().await;
        return Err(e.into());
    }
    let result = dispatch(&mut drive, command).await;
    drive.cleanup().await;
    result
}

async fn dispatch<C: Connector>(
    drive: &mut DualDrive<C>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Home => report_homing(drive.home().await?),
        Command::BringUp => report_homing(drive.bring_up().await?),
        Command::Stop => {
            drive.stop().await?;
            println!("stopped");
            Ok(())
        }
        Command::FaultReset { profile } => {
            drive.fault_reset_named(&profile).await?;
            println!("fault reset ({profile})");
            Ok(())
        }
        Command::Reset => {
            drive.reset_settings().await?;
            println!("settings reset");
            Ok(())
        }
        Command::Status { json } => {
            let report = StatusReport::collect(drive).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
            Ok(())
        }
    }
}

fn report_homing(outcome: HomingOutcome) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        HomingOutcome::Homed { elapsed, polls } => {
            println!("homed in {elapsed:.1?} ({polls} polls)");
            Ok(())
        }
        HomingOutcome::TimedOut { elapsed, .. } => {
            Err(format!("homing timed out after {elapsed:.1?}").into())
        }
        HomingOutcome::Failed { reason } => Err(format!("homing failed: {reason}").into()),
    }
}

#[derive(Debug, Serialize)]
struct SideReport {
    status_word: u16,
    homed: bool,
    in_fault: bool,
    fault_code: u16,
    fault_class: FaultClass,
    velocity: u16,
    position: FeedbackPair,
    revolutions: f64,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    left: SideReport,
    right: SideReport,
}

impl StatusReport {
    async fn collect<C: Connector>(
        drive: &mut DualDrive<C>,
    ) -> Result<Self, linact_drive::DriveError> {
        let status = drive.get_status().await?;
        let (fault_left, fault_right) = drive.get_recent_fault().await?;
        let (vel_left, vel_right) = drive.get_velocity().await?;
        let (pos_left, pos_right) = drive.get_current_revolutions().await?;
        let policy = drive.config().fault_policy()?;

        let per_side = SidePair::new(
            (status.left, fault_left, vel_left, pos_left),
            (status.right, fault_right, vel_right, pos_right),
        )
        .map(|_, (status, fault_code, velocity, position)| SideReport {
            status_word: status.bits(),
            homed: status.is_homed(),
            in_fault: status.in_fault(),
            fault_code,
            fault_class: policy.classify(fault_code),
            velocity,
            position,
            revolutions: position.revolutions(),
        });
        Ok(Self {
            left: per_side.left,
            right: per_side.right,
        })
    }

    fn print(&self) {
        for (name, side) in [("left", &self.left), ("right", &self.right)] {
            println!(
                "{name:<5} status={:#06x} homed={} fault={} code={:#06x} ({:?}) velocity={} revs={:.4}",
                side.status_word,
                side.homed,
                side.in_fault,
                side.fault_code,
                side.fault_class,
                side.velocity,
                side.revolutions,
            );
        }
    }
}

/// Setup tracing subscriber based on CLI arguments and `[shared] log_level`.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_filter()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    fn example_config() -> String {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../config/linact.example.toml")
            .display()
            .to_string()
    }

    #[test]
    fn missing_config_is_an_error_not_a_panic() {
        let args = parse(&["linact", "-c", "/nonexistent/linact.toml", "stop"]);
        assert!(matches!(load_config(&args), Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn host_and_port_overrides_apply() {
        let config = example_config();
        let args = parse(&[
            "linact",
            "-c",
            config.as_str(),
            "--left-host",
            "10.0.0.7",
            "--port",
            "1502",
            "status",
        ]);

        let config = load_config(&args).unwrap();
        assert_eq!(config.left.host, "10.0.0.7");
        assert_eq!(config.right.host, "192.168.0.212");
        assert_eq!((config.left.port, config.right.port), (1502, 1502));
    }

    #[test]
    fn profile_name_is_checked_by_the_drive() {
        let args = parse(&["linact", "fault-reset", "--profile", "turbo"]);
        assert!(matches!(
            args.command,
            Command::FaultReset { profile } if profile == "turbo"
        ));
    }
}
