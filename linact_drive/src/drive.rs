//! `DualDrive`: the upward interface of the coordination core.
//!
//! Owns the connection manager and the immutable configuration. Every
//! register command is one paired operation; the motion configuration
//! commands are only accepted after a successful homing run.
//!
//! # Command summary
//!
//! | Method                          | Register(s)              | Gated on homed |
//! |---------------------------------|--------------------------|----------------|
//! | `home`                          | motion command, status   | -              |
//! | `stop`                          | motion command (`4`)     | -              |
//! | `fault_reset`                   | mode (guarded)           | -              |
//! | `set_ieg_mode`                  | mode (guarded)           | yes            |
//! | `set_analog_position_*`         | position min/max (Q16.16)| yes            |
//! | `set_analog_velocity_max`       | velocity max (Q8.8+24)   | yes            |
//! | `set_analog_acceleration_max`   | acceleration max (Q12.4+20) | yes         |
//! | `set_analog_input_channel`      | input channel            | yes            |
//! | `set_analog_modbus_control`     | modbus control           | yes            |
//! | `set_host_command_mode`         | host command mode        | yes            |
//! | `set_peak_current`              | peak current             | yes            |
//! | `reset_settings`                | settings reset (`1`)     | -              |

use crate::connection::ConnectionManager;
use crate::error::{CriticalFailure, DriveError, TransportError, ValidationError};
use crate::fault::{FaultCycle, FaultMonitor};
use crate::homing::{HomingMachine, HomingOutcome, HomingPlan};
use crate::paired::{PairedOp, RetryPolicy, execute_paired};
use crate::session::TidWindow;
use crate::transport::{Connector, RegisterOp, RegisterReply};
use linact_common::codec::{
    encode_revolutions, rpm_to_acceleration_registers, rpm_to_velocity_registers,
};
use linact_common::config::{ConfigError, DriveConfig};
use linact_common::consts::{
    COMMAND_MODE_ANALOG_POSITION, MODBUS_CONTROL_MAX, MOTION_STOP, SETTINGS_RESET_VALUE,
};
use std::str::FromStr;
use linact_common::mode::{ModeGuard, ModeProfile};
use linact_common::position::{ControlWindow, FeedbackPair};
use linact_common::side::SidePair;
use linact_common::status::DriveStatus;
use tracing::{error, info, warn};

/// Coordinated left/right drive pair.
pub struct DualDrive<C: Connector> {
    config: DriveConfig,
    conn: ConnectionManager<C>,
    guard: ModeGuard,
    faults: FaultMonitor,
    window: ControlWindow,
    command_policy: RetryPolicy,
    stop_policy: RetryPolicy,
    reset_policy: RetryPolicy,
    homed: bool,
}

impl<C: Connector> DualDrive<C> {
    /// Build a drive pair using the command TID window from `[bus]`.
    ///
    /// # Errors
    ///
    /// `DriveError::Config` if the configuration does not validate.
    pub fn new(config: DriveConfig, connector: C) -> Result<Self, DriveError> {
        let tids = TidWindow::new(config.bus.start_tid, config.bus.last_tid);
        Self::with_tid_window(config, connector, tids)
    }

    /// Build a drive pair tagging requests from an explicit TID window.
    pub fn with_tid_window(
        config: DriveConfig,
        connector: C,
        tids: TidWindow,
    ) -> Result<Self, DriveError> {
        config.validate()?;
        let guard = config.mode_guard()?;
        let faults = FaultMonitor {
            status_register: config.registers.status,
            fault_register: config.registers.recent_fault,
            mode_register: config.registers.ieg_mode,
            policy: config.fault_policy()?,
            guard,
        };
        let window = config.motion.window()?;
        let conn = ConnectionManager::new(&config, connector, tids);
        Ok(Self {
            command_policy: RetryPolicy::command(&config.retry),
            stop_policy: RetryPolicy::stop(&config.retry),
            reset_policy: RetryPolicy::fault_reset(&config.retry),
            config,
            conn,
            guard,
            faults,
            window,
            homed: false,
        })
    }

    /// Immutable configuration.
    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    /// Connection manager, for connectivity checks.
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.conn
    }

    /// Whether the last homing run ended `Homed`.
    pub fn is_homed(&self) -> bool {
        self.homed
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Open both sessions.
    pub async fn connect(&mut self) -> Result<(), DriveError> {
        Ok(self.conn.connect().await?)
    }

    /// Close both sessions. Never fails; safe to call repeatedly.
    pub async fn cleanup(&mut self) {
        info!(service = %self.config.shared.service_name, "Cleanup");
        self.conn.cleanup().await;
    }

    // ─── Paired primitives ──────────────────────────────────────────

    async fn paired(
        &mut self,
        operation: &'static str,
        op: PairedOp,
        policy: RetryPolicy,
    ) -> Result<SidePair<RegisterReply>, DriveError> {
        execute_paired(&mut self.conn, operation, &op, &policy)
            .await
            .into_result()
    }

    async fn paired_write(
        &mut self,
        operation: &'static str,
        op: RegisterOp,
    ) -> Result<(), DriveError> {
        let policy = self.command_policy;
        self.paired(operation, PairedOp::both(op), policy).await?;
        info!(operation, "Written to both drives");
        Ok(())
    }

    async fn paired_read(
        &mut self,
        operation: &'static str,
        addr: u16,
        count: u16,
    ) -> Result<SidePair<Vec<u16>>, DriveError> {
        let policy = self.command_policy;
        let replies = self
            .paired(
                operation,
                PairedOp::both(RegisterOp::Read { addr, count }),
                policy,
            )
            .await?;
        Ok(replies.map(|_, reply| reply.words().to_vec()))
    }

    fn require_homed(&self, operation: &'static str) -> Result<(), DriveError> {
        if self.homed {
            Ok(())
        } else {
            warn!(operation, "Rejected: drives are not homed");
            Err(DriveError::NotHomed)
        }
    }

    // ─── Homing and stop ────────────────────────────────────────────

    /// Home both actuators and wait for both homed bits.
    pub async fn home(&mut self) -> Result<HomingOutcome, DriveError> {
        self.homed = false;
        let plan = HomingPlan::new(&self.config.homing, self.config.registers.motion_command);
        let mut machine = HomingMachine::new(
            plan,
            self.config.registers.status,
            self.config.homing.timeout(),
            self.config.homing.poll_interval(),
        );
        let policy = self.stop_policy;
        let outcome = machine.run(&mut self.conn, &policy).await;
        self.homed = outcome.is_homed();
        Ok(outcome)
    }

    /// Stop both actuators.
    ///
    /// # Errors
    ///
    /// `DriveError::Critical(StopExhausted)` when either drive did not accept
    /// the stop within its retry budget.
    pub async fn stop(&mut self) -> Result<(), DriveError> {
        let op = PairedOp::both(RegisterOp::WriteSingle {
            addr: self.config.registers.motion_command,
            value: MOTION_STOP,
        });
        let outcome = execute_paired(&mut self.conn, "stop", &op, &self.stop_policy).await;
        if outcome.is_success() {
            info!("Both drives stopped");
            return Ok(());
        }
        let failure = CriticalFailure::StopExhausted {
            left_attempts: outcome.attempts_left(),
            right_attempts: outcome.attempts_right(),
        };
        error!(critical = true, "{failure}");
        Err(failure.into())
    }

    // ─── Faults ─────────────────────────────────────────────────────

    /// Write the guarded fault-reset word to both drives.
    pub async fn fault_reset(&mut self, profile: ModeProfile) -> Result<(), DriveError> {
        self.faults
            .fault_reset(&mut self.conn, profile, &self.reset_policy)
            .await
    }

    /// [`fault_reset`](Self::fault_reset) with the profile given by name
    /// (`"default"` or `"alternative"`).
    ///
    /// # Errors
    ///
    /// `DriveError::Validation(Profile)` for an unknown name; nothing is written.
    pub async fn fault_reset_named(&mut self, profile: &str) -> Result<(), DriveError> {
        let profile = ModeProfile::from_str(profile).map_err(ValidationError::from)?;
        self.fault_reset(profile).await
    }

    /// Whether either drive is in fault.
    pub async fn check_fault_status(&mut self) -> Result<bool, DriveError> {
        self.faults
            .check_fault_status(&mut self.conn, &self.command_policy)
            .await
    }

    /// Status words of both drives.
    pub async fn get_status(&mut self) -> Result<SidePair<DriveStatus>, DriveError> {
        self.faults
            .read_status(&mut self.conn, &self.command_policy)
            .await
    }

    /// Most recent fault code `(left, right)`.
    pub async fn get_recent_fault(&mut self) -> Result<(u16, u16), DriveError> {
        Ok(self
            .faults
            .get_recent_fault(&mut self.conn, &self.command_policy)
            .await?
            .into_tuple())
    }

    /// One fault poll step: reset recoverable faults, surface critical ones.
    pub async fn poll_faults(&mut self) -> Result<FaultCycle, DriveError> {
        self.faults
            .poll_cycle(&mut self.conn, &self.command_policy, &self.reset_policy)
            .await
    }

    // ─── Feedback ───────────────────────────────────────────────────

    /// Velocity feedback word `(left, right)`.
    pub async fn get_velocity(&mut self) -> Result<(u16, u16), DriveError> {
        let addr = self.config.registers.velocity_feedback;
        let words = self.paired_read("get_velocity", addr, 1).await?;
        Ok(words
            .map(|_, w| w.first().copied().unwrap_or_default())
            .into_tuple())
    }

    /// Position feedback `(left, right)`.
    pub async fn get_current_revolutions(
        &mut self,
    ) -> Result<(FeedbackPair, FeedbackPair), DriveError> {
        let addr = self.config.registers.position_feedback;
        let words = self.paired_read("get_current_revolutions", addr, 2).await?;
        let left = FeedbackPair::from_words(&words.left);
        let right = FeedbackPair::from_words(&words.right);
        match (left, right) {
            (Some(l), Some(r)) => Ok((l, r)),
            _ => Err(DriveError::OperationFailed {
                operation: "get_current_revolutions",
                left_attempts: 0,
                right_attempts: 0,
                last_error: TransportError::Malformed(
                    "position feedback shorter than two words".to_string(),
                ),
            }),
        }
    }

    // ─── Motion configuration (requires homed) ──────────────────────

    /// Write both analog position limits, maximum first.
    ///
    /// Both limits are encoded before anything is written, so an
    /// unencodable minimum leaves the drives untouched.
    pub async fn set_analog_position_limits(
        &mut self,
        min_revs: f64,
        max_revs: f64,
    ) -> Result<(), DriveError> {
        if !(min_revs < max_revs) {
            return Err(ValidationError::LimitOrder {
                min: min_revs,
                max: max_revs,
            }
            .into());
        }
        let (max_low, max_high) = encode_revolutions(max_revs)?;
        let (min_low, min_high) = encode_revolutions(min_revs)?;
        self.require_homed("set_analog_position_limits")?;
        let registers = &self.config.registers;
        let (max_addr, min_addr) = (registers.analog_position_max, registers.analog_position_min);
        self.paired_write(
            "set_analog_position_max",
            RegisterOp::WritePair {
                addr: max_addr,
                low: max_low,
                high: max_high,
            },
        )
        .await?;
        self.paired_write(
            "set_analog_position_min",
            RegisterOp::WritePair {
                addr: min_addr,
                low: min_low,
                high: min_high,
            },
        )
        .await
    }

    /// Analog position maximum, revolutions.
    pub async fn set_analog_position_max(&mut self, revs: f64) -> Result<(), DriveError> {
        let (low, high) = encode_revolutions(revs)?;
        self.require_homed("set_analog_position_max")?;
        let addr = self.config.registers.analog_position_max;
        self.paired_write(
            "set_analog_position_max",
            RegisterOp::WritePair { addr, low, high },
        )
        .await
    }

    /// Analog position minimum, revolutions.
    pub async fn set_analog_position_min(&mut self, revs: f64) -> Result<(), DriveError> {
        let (low, high) = encode_revolutions(revs)?;
        self.require_homed("set_analog_position_min")?;
        let addr = self.config.registers.analog_position_min;
        self.paired_write(
            "set_analog_position_min",
            RegisterOp::WritePair { addr, low, high },
        )
        .await
    }

    /// Analog velocity maximum, RPM (clamped to `[0, 120]`).
    pub async fn set_analog_velocity_max(&mut self, rpm: f64) -> Result<(), DriveError> {
        self.require_homed("set_analog_velocity_max")?;
        let (whole, frac) = rpm_to_velocity_registers(rpm);
        let addr = self.config.registers.analog_velocity_max;
        self.paired_write(
            "set_analog_velocity_max",
            RegisterOp::WritePair {
                addr,
                low: frac,
                high: whole,
            },
        )
        .await
    }

    /// Analog acceleration maximum, RPM (clamped to `[0, 120]`).
    pub async fn set_analog_acceleration_max(&mut self, rpm: f64) -> Result<(), DriveError> {
        self.require_homed("set_analog_acceleration_max")?;
        let (whole, frac) = rpm_to_acceleration_registers(rpm);
        let addr = self.config.registers.analog_acceleration_max;
        self.paired_write(
            "set_analog_acceleration_max",
            RegisterOp::WritePair {
                addr,
                low: frac,
                high: whole,
            },
        )
        .await
    }

    /// Analog input channel.
    pub async fn set_analog_input_channel(&mut self, channel: u16) -> Result<(), DriveError> {
        self.require_homed("set_analog_input_channel")?;
        let addr = self.config.registers.analog_input_channel;
        self.paired_write(
            "set_analog_input_channel",
            RegisterOp::WriteSingle {
                addr,
                value: channel,
            },
        )
        .await
    }

    /// Analog modbus-control value per side (`0..=10000`).
    pub async fn set_analog_modbus_control(
        &mut self,
        values: (u16, u16),
    ) -> Result<(), DriveError> {
        let (left, right) = values;
        for value in [left, right] {
            if value > MODBUS_CONTROL_MAX {
                return Err(ValidationError::ControlValue(value).into());
            }
        }
        self.require_homed("set_analog_modbus_control")?;
        let addr = self.config.registers.analog_modbus_control;
        let op = PairedOp {
            left: RegisterOp::WriteSingle { addr, value: left },
            right: RegisterOp::WriteSingle { addr, value: right },
        };
        let policy = self.command_policy;
        self.paired("set_analog_modbus_control", op, policy).await?;
        info!(left, right, "Modbus control written");
        Ok(())
    }

    /// Host command mode: `0` disabled, `1` digital inputs, `2` analog position.
    pub async fn set_host_command_mode(&mut self, mode: u16) -> Result<(), DriveError> {
        if mode > COMMAND_MODE_ANALOG_POSITION {
            return Err(ValidationError::HostCommandMode(mode).into());
        }
        self.require_homed("set_host_command_mode")?;
        let addr = self.config.registers.host_command_mode;
        self.paired_write(
            "set_host_command_mode",
            RegisterOp::WriteSingle { addr, value: mode },
        )
        .await
    }

    /// Peak motor current (`128` is one ampere).
    ///
    /// # Errors
    ///
    /// `DriveError::Config` when `registers.peak_current` is not configured.
    pub async fn set_peak_current(&mut self, value: u16) -> Result<(), DriveError> {
        self.require_homed("set_peak_current")?;
        let Some(addr) = self.config.registers.peak_current else {
            return Err(DriveError::Config(ConfigError::ValidationError(
                "registers.peak_current is not configured".to_string(),
            )));
        };
        self.paired_write("set_peak_current", RegisterOp::WriteSingle { addr, value })
            .await
    }

    // ─── Mode word ──────────────────────────────────────────────────

    /// Write `raw` to the mode register after restricting it to `profile`.
    ///
    /// Requires homed; the fault-reset path writes the mode word through
    /// [`fault_reset`](Self::fault_reset) instead and is never gated.
    pub async fn set_ieg_mode(&mut self, raw: u16, profile: ModeProfile) -> Result<(), DriveError> {
        self.require_homed("set_ieg_mode")?;
        let value = self.guard.restrict(raw, profile);
        if value != raw {
            warn!(
                raw = format_args!("{raw:#06x}"),
                value = format_args!("{value:#06x}"),
                %profile,
                "Mode word restricted"
            );
        }
        let addr = self.config.registers.ieg_mode;
        self.paired_write("set_ieg_mode", RegisterOp::WriteSingle { addr, value })
            .await
    }

    // ─── Supplementary sequences ────────────────────────────────────

    /// Restore drive defaults on both drives.
    pub async fn reset_settings(&mut self) -> Result<(), DriveError> {
        let addr = self.config.registers.settings_reset;
        self.paired_write(
            "reset_settings",
            RegisterOp::WriteSingle {
                addr,
                value: SETTINGS_RESET_VALUE,
            },
        )
        .await
    }

    /// Command each actuator to the position it currently reports.
    pub async fn hold_position(&mut self) -> Result<(u16, u16), DriveError> {
        let (left, right) = self.get_current_revolutions().await?;
        let values = (self.window.hold(&left), self.window.hold(&right));
        info!(
            left_revs = left.revolutions(),
            right_revs = right.revolutions(),
            left_control = values.0,
            right_control = values.1,
            "Holding position"
        );
        self.set_analog_modbus_control(values).await?;
        Ok(values)
    }

    /// Home, then apply the `[motion]` profile and switch to analog
    /// position control.
    ///
    /// Returns the homing outcome; configuration is only applied on `Homed`.
    pub async fn bring_up(&mut self) -> Result<HomingOutcome, DriveError> {
        let outcome = self.home().await?;
        if !outcome.is_homed() {
            warn!(?outcome, "Bring-up stopped: homing did not complete");
            return Ok(outcome);
        }
        let motion = self.config.motion.clone();
        self.set_analog_position_limits(motion.position_min_revs, motion.position_max_revs)
            .await?;
        self.set_analog_velocity_max(motion.velocity_rpm).await?;
        self.set_analog_acceleration_max(motion.acceleration_rpm)
            .await?;
        self.set_analog_input_channel(motion.input_channel).await?;
        self.hold_position().await?;
        if self.config.registers.peak_current.is_some() {
            self.set_peak_current(motion.peak_current).await?;
        }
        self.set_host_command_mode(COMMAND_MODE_ANALOG_POSITION)
            .await?;
        info!("Bring-up complete");
        Ok(outcome)
    }
}
