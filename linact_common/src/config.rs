//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across the linact binaries, plus the [`DriveConfig`] record that every
//! coordination component reads.
//!
//! # Usage
//!
//! ```rust,no_run
//! use linact_common::config::{ConfigLoader, ConfigError, DriveConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = DriveConfig::load(Path::new("linact.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::*;
use crate::mode::{ModeBits, ModeGuard};
use crate::position::ControlWindow;
use crate::side::Side;
use crate::status::FaultPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information (per-request TIDs).
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across the linact binaries.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "linact-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Semantic validation is a separate step (`validate()`)
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Drive configuration ────────────────────────────────────────────

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Durations are built with `Duration::from_secs_f64`, which panics outside
/// its range, so every seconds field is bounded here.
fn check_seconds(name: &str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let lower_ok = if allow_zero {
        value >= 0.0
    } else {
        value > 0.0
    };
    if !value.is_finite() || !lower_ok || value > MAX_CONFIG_SECONDS {
        let lower = if allow_zero { "[0" } else { "(0" };
        return Err(invalid(format!(
            "{name} must be within {lower}, {MAX_CONFIG_SECONDS}] seconds, got {value}"
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    check_seconds(name, value, false)
}

/// Network endpoint of one drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Endpoint {
    /// `host:port` string for address resolution.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Field-bus session parameters shared by both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    /// Slave/unit identifier.
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
    /// First transaction id of the window (inclusive).
    #[serde(default = "default_start_tid")]
    pub start_tid: u16,
    /// End of the transaction id window (exclusive).
    #[serde(default = "default_last_tid")]
    pub last_tid: u16,
    /// Per-request I/O timeout in seconds.
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: f64,
    /// Connect attempts per side.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_slave_id() -> u8 {
    DEFAULT_SLAVE_ID
}
fn default_start_tid() -> u16 {
    DEFAULT_START_TID
}
fn default_last_tid() -> u16 {
    DEFAULT_LAST_TID
}
fn default_request_timeout_s() -> f64 {
    DEFAULT_REQUEST_TIMEOUT_S
}
fn default_connect_attempts() -> u32 {
    DEFAULT_CONNECT_ATTEMPTS
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            slave_id: default_slave_id(),
            start_tid: default_start_tid(),
            last_tid: default_last_tid(),
            request_timeout_s: default_request_timeout_s(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl BusConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_tid >= self.last_tid {
            return Err(invalid(format!(
                "bus.start_tid ({}) must be below bus.last_tid ({})",
                self.start_tid, self.last_tid
            )));
        }
        if self.connect_attempts == 0 {
            return Err(invalid("bus.connect_attempts must be at least 1"));
        }
        check_positive("bus.request_timeout_s", self.request_timeout_s)
    }
}

/// Register addresses on the drive.
///
/// Every address is firmware specific and must be given explicitly, except
/// the recent-fault and settings-reset registers which have stable defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterMap {
    /// Most recent fault code.
    #[serde(default = "default_recent_fault")]
    pub recent_fault: u16,
    /// Status (OEG) word: bit 1 homed, bit 3 in fault.
    pub status: u16,
    /// Motion command (IEG motion).
    pub motion_command: u16,
    /// Host command mode.
    pub host_command_mode: u16,
    /// Mode (IEG) word. Written only through the mode guard.
    pub ieg_mode: u16,
    /// Analog position minimum (2 words, Q16.16).
    pub analog_position_min: u16,
    /// Analog position maximum (2 words, Q16.16).
    pub analog_position_max: u16,
    /// Analog velocity maximum (2 words).
    pub analog_velocity_max: u16,
    /// Analog acceleration maximum (2 words).
    pub analog_acceleration_max: u16,
    /// Analog input channel selector.
    pub analog_input_channel: u16,
    /// Analog modbus-control value (`0..=10000`).
    pub analog_modbus_control: u16,
    /// Position feedback (2 words).
    pub position_feedback: u16,
    /// Velocity feedback (2 words).
    pub velocity_feedback: u16,
    /// Restore-defaults register.
    #[serde(default = "default_settings_reset")]
    pub settings_reset: u16,
    /// Peak current register. Bring-up skips the peak current write when unset.
    #[serde(default)]
    pub peak_current: Option<u16>,
}

fn default_recent_fault() -> u16 {
    DEFAULT_RECENT_FAULT_REGISTER
}
fn default_settings_reset() -> u16 {
    DEFAULT_SETTINGS_RESET_REGISTER
}

/// Retry budgets and delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per side for ordinary commands.
    #[serde(default = "default_command_attempts")]
    pub command_attempts: u32,
    /// Attempts per side for the stop path.
    #[serde(default = "default_stop_attempts")]
    pub stop_attempts: u32,
    /// Base delay between rounds, seconds.
    #[serde(default = "default_retry_delay_s")]
    pub delay_s: f64,
    /// Delay multiplier applied per round.
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    /// Extra delay multiplier after a connection-class error.
    #[serde(default = "default_multiplier")]
    pub connection_delay_factor: f64,
}

fn default_command_attempts() -> u32 {
    DEFAULT_COMMAND_ATTEMPTS
}
fn default_stop_attempts() -> u32 {
    DEFAULT_STOP_ATTEMPTS
}
fn default_retry_delay_s() -> f64 {
    DEFAULT_RETRY_DELAY_S
}
fn default_multiplier() -> f64 {
    1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            command_attempts: default_command_attempts(),
            stop_attempts: default_stop_attempts(),
            delay_s: default_retry_delay_s(),
            backoff_multiplier: default_multiplier(),
            connection_delay_factor: default_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Base delay.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.command_attempts == 0 || self.stop_attempts == 0 {
            return Err(invalid("retry attempts must be at least 1"));
        }
        check_seconds("retry.delay_s", self.delay_s, true)?;
        for (name, factor) in [
            ("retry.backoff_multiplier", self.backoff_multiplier),
            ("retry.connection_delay_factor", self.connection_delay_factor),
        ] {
            if !factor.is_finite() || factor < 1.0 {
                return Err(invalid(format!("{name} must be >= 1.0, got {factor}")));
            }
        }
        Ok(())
    }
}

/// Which session carries each actuator's homing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomingWiring {
    /// Left actuator on the left session.
    #[default]
    Straight,
    /// Left actuator on the right session and vice versa.
    Crossed,
}

impl HomingWiring {
    /// Session that carries the command for `actuator`.
    pub const fn session_for(&self, actuator: Side) -> Side {
        match self {
            Self::Straight => actuator,
            Self::Crossed => actuator.opposite(),
        }
    }
}

/// Homing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomingConfig {
    /// Timeout from `Commanded`, seconds.
    #[serde(default = "default_homing_timeout_s")]
    pub timeout_s: f64,
    /// Status poll interval, seconds.
    #[serde(default = "default_homing_poll_s")]
    pub poll_interval_s: f64,
    /// Actuator to session wiring.
    #[serde(default)]
    pub wiring: HomingWiring,
    /// Left actuator command register; defaults to `registers.motion_command`.
    #[serde(default)]
    pub command_register_left: Option<u16>,
    /// Right actuator command register; defaults to `registers.motion_command`.
    #[serde(default)]
    pub command_register_right: Option<u16>,
}

fn default_homing_timeout_s() -> f64 {
    DEFAULT_HOMING_TIMEOUT_S
}
fn default_homing_poll_s() -> f64 {
    DEFAULT_HOMING_POLL_S
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            timeout_s: default_homing_timeout_s(),
            poll_interval_s: default_homing_poll_s(),
            wiring: HomingWiring::default(),
            command_register_left: None,
            command_register_right: None,
        }
    }
}

impl HomingConfig {
    /// Homing timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_s)
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_s)
    }

    /// Command register for `actuator`, falling back to `motion_command`.
    pub fn command_register(&self, actuator: Side, motion_command: u16) -> u16 {
        match actuator {
            Side::Left => self.command_register_left,
            Side::Right => self.command_register_right,
        }
        .unwrap_or(motion_command)
    }
}

/// Fault classification parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultsConfig {
    /// Bit indices of the recent-fault register treated as critical.
    #[serde(default = "default_critical_bits")]
    pub critical_bits: Vec<u8>,
}

fn default_critical_bits() -> Vec<u8> {
    DEFAULT_CRITICAL_FAULT_BITS.to_vec()
}

impl Default for FaultsConfig {
    fn default() -> Self {
        Self {
            critical_bits: default_critical_bits(),
        }
    }
}

/// Motion profile applied by the bring-up sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// Analog velocity maximum, RPM.
    #[serde(default = "default_velocity_rpm")]
    pub velocity_rpm: f64,
    /// Analog acceleration maximum, RPM.
    #[serde(default = "default_acceleration_rpm")]
    pub acceleration_rpm: f64,
    /// Analog position minimum, revolutions.
    #[serde(default = "default_position_min")]
    pub position_min_revs: f64,
    /// Analog position maximum, revolutions.
    #[serde(default = "default_position_max")]
    pub position_max_revs: f64,
    /// Analog input channel.
    #[serde(default = "default_input_channel")]
    pub input_channel: u16,
    /// Peak current written by bring-up, drive units (`128` is one ampere).
    #[serde(default = "default_peak_current")]
    pub peak_current: u16,
}

fn default_velocity_rpm() -> f64 {
    DEFAULT_VELOCITY_RPM
}
fn default_acceleration_rpm() -> f64 {
    DEFAULT_ACCELERATION_RPM
}
fn default_position_min() -> f64 {
    DEFAULT_POSITION_MIN_REVS
}
fn default_position_max() -> f64 {
    DEFAULT_POSITION_MAX_REVS
}
fn default_input_channel() -> u16 {
    INPUT_CHANNEL_MODBUS
}
fn default_peak_current() -> u16 {
    DEFAULT_PEAK_CURRENT
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            velocity_rpm: default_velocity_rpm(),
            acceleration_rpm: default_acceleration_rpm(),
            position_min_revs: default_position_min(),
            position_max_revs: default_position_max(),
            input_channel: default_input_channel(),
            peak_current: default_peak_current(),
        }
    }
}

impl MotionConfig {
    /// Position window the modbus-control value maps onto.
    pub fn window(&self) -> Result<ControlWindow, ConfigError> {
        ControlWindow::new(self.position_min_revs, self.position_max_revs)
            .map_err(|e| invalid(format!("motion: {e}")))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, rpm) in [
            ("motion.velocity_rpm", self.velocity_rpm),
            ("motion.acceleration_rpm", self.acceleration_rpm),
        ] {
            if !rpm.is_finite() || !(0.0..=MAX_RPM).contains(&rpm) {
                return Err(invalid(format!("{name} must be within [0, {MAX_RPM}], got {rpm}")));
            }
        }
        if self.peak_current == 0 {
            return Err(invalid("motion.peak_current must be at least 1"));
        }
        self.window().map(|_| ())
    }
}

/// Fault poller parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Interval between poll cycles, seconds.
    #[serde(default = "default_polling_interval_s")]
    pub interval_s: f64,
    /// First transaction id of the poller's window.
    #[serde(default = "default_poller_start_tid")]
    pub start_tid: u16,
    /// End of the poller's transaction id window (exclusive).
    #[serde(default = "default_poller_last_tid")]
    pub last_tid: u16,
    /// Issue a stop when a critical fault is seen.
    #[serde(default)]
    pub stop_on_critical: bool,
    /// Initial connect rounds before giving up.
    #[serde(default = "default_connect_rounds")]
    pub connect_rounds: u32,
}

fn default_polling_interval_s() -> f64 {
    DEFAULT_POLLING_INTERVAL_S
}
fn default_poller_start_tid() -> u16 {
    POLLER_START_TID
}
fn default_poller_last_tid() -> u16 {
    POLLER_LAST_TID
}
fn default_connect_rounds() -> u32 {
    DEFAULT_CONNECT_ROUNDS
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_s: default_polling_interval_s(),
            start_tid: default_poller_start_tid(),
            last_tid: default_poller_last_tid(),
            stop_on_critical: false,
            connect_rounds: default_connect_rounds(),
        }
    }
}

impl PollerConfig {
    /// Interval between poll cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_positive("poller.interval_s", self.interval_s)?;
        if self.start_tid >= self.last_tid {
            return Err(invalid(format!(
                "poller.start_tid ({}) must be below poller.last_tid ({})",
                self.start_tid, self.last_tid
            )));
        }
        if self.connect_rounds == 0 {
            return Err(invalid("poller.connect_rounds must be at least 1"));
        }
        Ok(())
    }
}

/// Complete configuration of a drive pair.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "linact"
///
/// [left]
/// host = "192.168.0.211"
///
/// [right]
/// host = "192.168.0.212"
///
/// [registers]
/// status = 104
/// # ...
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveConfig {
    /// Logging and identity.
    pub shared: SharedConfig,
    /// Left drive endpoint.
    pub left: Endpoint,
    /// Right drive endpoint.
    pub right: Endpoint,
    /// Session parameters.
    #[serde(default)]
    pub bus: BusConfig,
    /// Register map.
    pub registers: RegisterMap,
    /// Retry budgets.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Homing parameters.
    #[serde(default)]
    pub homing: HomingConfig,
    /// Mode bit positions.
    #[serde(default)]
    pub mode: ModeBits,
    /// Fault classification.
    #[serde(default)]
    pub faults: FaultsConfig,
    /// Bring-up motion profile.
    #[serde(default)]
    pub motion: MotionConfig,
    /// Fault poller parameters.
    #[serde(default)]
    pub poller: PollerConfig,
}

impl DriveConfig {
    /// Endpoint for `side`.
    pub fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Mode guard built from `[mode]`.
    pub fn mode_guard(&self) -> Result<ModeGuard, ConfigError> {
        ModeGuard::new(&self.mode).map_err(|e| invalid(format!("mode: {e}")))
    }

    /// Fault policy built from `[faults]`.
    pub fn fault_policy(&self) -> Result<FaultPolicy, ConfigError> {
        FaultPolicy::from_bits(&self.faults.critical_bits)
            .map_err(|e| invalid(format!("faults: {e}")))
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        for side in Side::BOTH {
            if self.endpoint(side).host.trim().is_empty() {
                return Err(invalid(format!("{side}.host cannot be empty")));
            }
        }
        self.bus.validate()?;
        self.retry.validate()?;
        check_positive("homing.timeout_s", self.homing.timeout_s)?;
        check_positive("homing.poll_interval_s", self.homing.poll_interval_s)?;
        self.mode_guard()?;
        self.fault_policy()?;
        self.motion.validate()?;
        self.poller.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = DriveConfig::load(Path::new("/nonexistent/path/linact.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = DriveConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_homing_wiring() {
        assert_eq!(HomingWiring::Straight.session_for(Side::Left), Side::Left);
        assert_eq!(HomingWiring::Crossed.session_for(Side::Left), Side::Right);

        let homing = HomingConfig {
            command_register_right: Some(7),
            ..HomingConfig::default()
        };
        assert_eq!(homing.command_register(Side::Left, 3), 3);
        assert_eq!(homing.command_register(Side::Right, 3), 7);
    }

    #[test]
    fn test_seconds_are_bounded() {
        assert!(check_positive("t", 1.0).is_ok());
        assert!(check_positive("t", MAX_CONFIG_SECONDS).is_ok());
        assert!(check_positive("t", 0.0).is_err());
        assert!(check_positive("t", 1e30).is_err());
        assert!(check_positive("t", f64::INFINITY).is_err());
        assert!(check_seconds("t", 0.0, true).is_ok());
        assert!(check_seconds("t", -0.1, true).is_err());
    }

    #[test]
    fn test_retry_validation() {
        let retry = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(matches!(
            retry.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(RetryConfig::default().validate().is_ok());

        let retry = RetryConfig {
            delay_s: 1e30,
            ..RetryConfig::default()
        };
        assert!(retry.validate().is_err());
    }
}
