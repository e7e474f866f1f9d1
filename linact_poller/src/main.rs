//! # linact fault poller
//!
//! Polls both drives for faults every `[poller] interval_s`, resets
//! recoverable faults and surfaces critical ones until Ctrl+C.
//!
//! ```bash
//! linact-poller --config /etc/linact/linact.toml
//! linact-poller -c config/linact.example.toml --simulate -v
//! ```

use clap::Parser;
use linact_common::config::{ConfigError, ConfigLoader, DriveConfig, LogLevel};
use linact_drive::transport::Connector;
use linact_drive::{SimBus, TcpConnector};
use linact_poller::FaultPoller;
use std::path::PathBuf;
use tokio::signal;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// linact-poller - periodic fault monitor for a linact drive pair
#[derive(Parser, Debug)]
#[command(name = "linact-poller")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Periodic fault monitor for a linact drive pair")]
#[command(long_about = None)]
struct Args {
    /// Path to the drive configuration file.
    #[arg(short, long, default_value = "/etc/linact/linact.toml")]
    config: PathBuf,

    /// Poll the in-process simulated drive pair.
    #[arg(short = 's', long)]
    simulate: bool,

    /// Override the poll interval in seconds.
    #[arg(long, value_name = "SECONDS")]
    interval: Option<f64>,

    /// Stop both drives when a critical fault is found.
    #[arg(long)]
    stop_on_critical: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run().await {
        error!("linact-poller failed: {}", e);
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
    info!("linact-poller v{} starting...", env!("CARGO_PKG_VERSION"));

    if args.simulate {
        info!("Simulation mode enabled");
        let bus = SimBus::new(&config);
        serve(FaultPoller::new(config, bus.connector())?).await
    } else {
        serve(FaultPoller::new(config, TcpConnector)?).await
    }
}

fn load_config(args: &Args) -> Result<DriveConfig, ConfigError> {
    let mut config = DriveConfig::load(&args.config)?;
    if let Some(interval) = args.interval {
        config.poller.interval_s = interval;
    }
    if args.stop_on_critical {
        config.poller.stop_on_critical = true;
    }
    Ok(config)
}

async fn serve<C: Connector>(
    mut poller: FaultPoller<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = poller.connect().await {
        poller.shutdown().await;
        return Err(e.into());
    }

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    };
    poller.run_until(shutdown).await;
    poller.shutdown().await;
    Ok(())
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

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn missing_config_is_an_error_not_a_panic() {
        let args = parse(&["linact-poller", "-c", "/nonexistent/linact.toml"]);
        assert!(matches!(load_config(&args), Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn poller_overrides_apply() {
        let config = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../config/linact.example.toml")
            .display()
            .to_string();
        let args = parse(&[
            "linact-poller",
            "-c",
            config.as_str(),
            "--interval",
            "0.5",
            "--stop-on-critical",
        ]);

        let config = load_config(&args).unwrap();
        assert_eq!(config.poller.interval_s, 0.5);
        assert!(config.poller.stop_on_critical);
    }
}
