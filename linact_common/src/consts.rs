//! Protocol constants and configuration defaults for the linact workspace.
//!
//! Single source of truth for motion codes, timing defaults and TID windows.
//! Register *addresses* are deployment-specific and live in
//! [`crate::config::RegisterMap`], never here.

use static_assertions::const_assert;

/// Motion command: disable / prepare for a new motion.
pub const MOTION_PREPARE: u16 = 0;

/// Motion command: stop.
pub const MOTION_STOP: u16 = 4;

/// Motion command: start homing.
pub const MOTION_START_HOMING: u16 = 256;

/// Host command mode: disabled.
pub const COMMAND_MODE_DISABLED: u16 = 0;

/// Host command mode: digital inputs.
pub const COMMAND_MODE_DIGITAL_INPUTS: u16 = 1;

/// Host command mode: analog position.
pub const COMMAND_MODE_ANALOG_POSITION: u16 = 2;

/// Analog input channel value selecting the modbus control register.
pub const INPUT_CHANNEL_MODBUS: u16 = 2;

/// Upper bound of the analog modbus-control value (maps to position max).
pub const MODBUS_CONTROL_MAX: u16 = 10_000;

/// Velocity/acceleration inputs are clamped to this many RPM.
pub const MAX_RPM: f64 = 120.0;

/// Default Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Default slave/unit id.
pub const DEFAULT_SLAVE_ID: u8 = 1;

/// Default connect attempts per side.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;

/// Default per-request I/O timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_S: f64 = 1.0;

/// Default attempts per side for configuration commands.
pub const DEFAULT_COMMAND_ATTEMPTS: u32 = 3;

/// Default attempts per side for stop and fault reset.
pub const DEFAULT_STOP_ATTEMPTS: u32 = 10;

/// Default base retry delay in seconds.
pub const DEFAULT_RETRY_DELAY_S: f64 = 0.2;

/// Fault reset waits this multiple of the base retry delay between rounds.
pub const FAULT_RESET_DELAY_FACTOR: u32 = 3;

/// Upper bound of any configured duration, seconds (one day).
pub const MAX_CONFIG_SECONDS: f64 = 86_400.0;

/// Upper bound of the delay between two retry rounds, seconds.
pub const MAX_RETRY_DELAY_S: f64 = 60.0;

/// Default homing timeout in seconds.
pub const DEFAULT_HOMING_TIMEOUT_S: f64 = 30.0;

/// Default homing status poll interval in seconds.
pub const DEFAULT_HOMING_POLL_S: f64 = 0.2;

/// Default fault poller interval in seconds.
pub const DEFAULT_POLLING_INTERVAL_S: f64 = 5.0;

/// First transaction id of the default command-session window.
pub const DEFAULT_START_TID: u16 = 10_001;
/// Exclusive upper bound of the default command TID window.
pub const DEFAULT_LAST_TID: u16 = 20_000;

/// First transaction id of the fault poller's own window.
pub const POLLER_START_TID: u16 = 30_000;
/// Exclusive upper bound of the poller TID window.
pub const POLLER_LAST_TID: u16 = 40_000;

/// Default number of full connect rounds the poller tries at startup.
pub const DEFAULT_CONNECT_ROUNDS: u32 = 5;

/// Default address of the most-recent-fault register.
pub const DEFAULT_RECENT_FAULT_REGISTER: u16 = 846;

/// Default address of the restore-defaults register (write `1`).
pub const DEFAULT_SETTINGS_RESET_REGISTER: u16 = 4001;

/// Value written to the restore-defaults register.
pub const SETTINGS_RESET_VALUE: u16 = 1;

/// Recent-fault bits treated as critical by default (board and actuator
/// over-temperature).
pub const DEFAULT_CRITICAL_FAULT_BITS: [u8; 2] = [4, 5];

/// Bring-up velocity maximum, RPM.
pub const DEFAULT_VELOCITY_RPM: f64 = 60.0;

/// Bring-up acceleration maximum, RPM.
pub const DEFAULT_ACCELERATION_RPM: f64 = 60.0;

/// Bring-up analog position minimum, revolutions.
pub const DEFAULT_POSITION_MIN_REVS: f64 = 0.3937;

/// Bring-up analog position maximum, revolutions.
pub const DEFAULT_POSITION_MAX_REVS: f64 = 28.937;

/// Bring-up peak current, drive units (`128` is one ampere).
pub const DEFAULT_PEAK_CURRENT: u16 = 128;

const_assert!(DEFAULT_START_TID < DEFAULT_LAST_TID);
const_assert!(POLLER_START_TID < POLLER_LAST_TID);
const_assert!(DEFAULT_LAST_TID <= POLLER_START_TID);
const_assert!(DEFAULT_CRITICAL_FAULT_BITS[0] < 16 && DEFAULT_CRITICAL_FAULT_BITS[1] < 16);
