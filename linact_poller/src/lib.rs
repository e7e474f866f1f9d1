//! # linact fault poller
//!
//! Runs the fault monitor's poll cycle on a fixed interval against a drive
//! pair, independent of any `linact` command in progress.
//!
//! ```text
//! connect (up to connect_rounds) ──► tick ──► poll_cycle ──┬─ Healthy
//!                                     ▲                    ├─ Reset
//!                                     │                    └─ Critical ─► stop (optional)
//!                                     └──── interval ◄─────┘
//!                     shutdown signal ──► cleanup
//! ```
//!
//! The poller tags its requests from its own transaction id window
//! (`[poller] start_tid..last_tid`) so its traffic is distinguishable from a
//! concurrent `linact` process in logs and captures.

#![deny(missing_docs)]

use linact_common::config::DriveConfig;
use linact_drive::session::TidWindow;
use linact_drive::transport::Connector;
use linact_drive::{DriveError, DualDrive, FaultCycle};
use std::future::Future;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

/// Counters accumulated over a poller run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Completed poll cycles, including failed ones.
    pub cycles: u64,
    /// Cycles that reset a recoverable fault.
    pub resets: u64,
    /// Cycles that found a critical fault.
    pub criticals: u64,
    /// Stops issued because of a critical fault.
    pub stops: u64,
    /// Cycles that failed with an error.
    pub errors: u64,
}

/// Periodic fault poller over one drive pair.
pub struct FaultPoller<C: Connector> {
    drive: DualDrive<C>,
    interval: Duration,
    stop_on_critical: bool,
    connect_rounds: u32,
    stats: PollerStats,
}

impl<C: Connector> FaultPoller<C> {
    /// Build a poller from `config`, using the `[poller]` TID window.
    ///
    /// # Errors
    ///
    /// `DriveError::Config` if the configuration does not validate.
    pub fn new(config: DriveConfig, connector: C) -> Result<Self, DriveError> {
        let poller = config.poller.clone();
        let tids = TidWindow::new(poller.start_tid, poller.last_tid);
        let drive = DualDrive::with_tid_window(config, connector, tids)?;
        Ok(Self {
            drive,
            interval: poller.interval(),
            stop_on_critical: poller.stop_on_critical,
            connect_rounds: poller.connect_rounds,
            stats: PollerStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    /// The underlying drive pair.
    pub fn drive(&self) -> &DualDrive<C> {
        &self.drive
    }

    /// Connect both drives, retrying whole rounds `connect_rounds` times with
    /// the poll interval in between.
    pub async fn connect(&mut self) -> Result<(), DriveError> {
        let mut round = 1;
        loop {
            match self.drive.connect().await {
                Ok(()) => return Ok(()),
                Err(e) if round < self.connect_rounds => {
                    warn!(round, rounds = self.connect_rounds, "Connect failed: {e}");
                    round += 1;
                    tokio::time::sleep(self.interval).await;
                }
                Err(e) => {
                    error!(rounds = self.connect_rounds, "Giving up on connect: {e}");
                    return Err(e);
                }
            }
        }
    }

    /// One poll cycle. A critical fault stops both drives when
    /// `stop_on_critical` is set.
    pub async fn tick(&mut self) -> Result<FaultCycle, DriveError> {
        self.stats.cycles += 1;
        let cycle = match self.drive.poll_faults().await {
            Ok(cycle) => cycle,
            Err(e) => {
                self.stats.errors += 1;
                return Err(e);
            }
        };
        match cycle {
            FaultCycle::Healthy => {}
            FaultCycle::Reset { codes } => {
                self.stats.resets += 1;
                info!(
                    left = codes.left,
                    right = codes.right,
                    "Recoverable faults reset"
                );
            }
            FaultCycle::Critical { codes } => {
                self.stats.criticals += 1;
                if self.stop_on_critical {
                    warn!(
                        left = codes.left,
                        right = codes.right,
                        "Stopping drives on critical fault"
                    );
                    self.stats.stops += 1;
                    self.drive.stop().await?;
                }
            }
        }
        Ok(cycle)
    }

    /// Poll every interval until `shutdown` resolves. Cycle errors are
    /// logged and polling continues.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) -> PollerStats {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval = ?self.interval, "Fault poller running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(cycle = self.stats.cycles, "Poll cycle failed: {e}");
                    }
                }
            }
        }
        self.stats
    }

    /// Close both sessions.
    pub async fn shutdown(&mut self) {
        self.drive.cleanup().await;
        let stats = self.stats;
        info!(
            cycles = stats.cycles,
            resets = stats.resets,
            criticals = stats.criticals,
            stops = stats.stops,
            errors = stats.errors,
            "Fault poller stopped"
        );
    }
}
