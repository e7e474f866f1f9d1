//! Error types for the coordination core.
//!
//! | Type               | Raised by                  | Leaves `DualDrive`? |
//! |--------------------|----------------------------|---------------------|
//! | `TransportError`   | one register request       | no, retried         |
//! | `ConnectError`     | connection manager         | yes                 |
//! | `ValidationError`  | caller input checks        | yes, never retried  |
//! | `CriticalFailure`  | stop path, fault monitor   | yes                 |
//! | `DriveError`       | every public operation     | yes                 |

use linact_common::codec::CodecError;
use linact_common::config::ConfigError;
use linact_common::mode::InvalidProfile;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single register request on one session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Socket level failure.
    #[error("I/O failure: {0}")]
    Io(String),

    /// No reply within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Session is not open.
    #[error("session disconnected")]
    Disconnected,

    /// The drive answered with a protocol exception.
    #[error("drive exception: {0}")]
    Exception(String),

    /// The reply did not have the expected shape.
    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl TransportError {
    /// I/O, timeout and disconnection errors call for a connectivity check.
    pub const fn is_connection_class(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::Disconnected)
    }
}

/// One or both sessions could not be opened within the attempt budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Left failed, right connected.
    #[error("left drive unreachable after {attempts} attempts")]
    Left {
        /// Attempts made per side.
        attempts: u32,
    },
    /// Right failed, left connected.
    #[error("right drive unreachable after {attempts} attempts")]
    Right {
        /// Attempts made per side.
        attempts: u32,
    },
    /// Neither side connected.
    #[error("both drives unreachable after {attempts} attempts")]
    Both {
        /// Attempts made per side.
        attempts: u32,
    },
}

impl ConnectError {
    /// Whether the left session came up.
    pub const fn left_ok(&self) -> bool {
        matches!(self, Self::Right { .. })
    }

    /// Whether the right session came up.
    pub const fn right_ok(&self) -> bool {
        matches!(self, Self::Left { .. })
    }
}

/// Out-of-domain caller input. Fails fast, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value not encodable in its register format.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Unknown mode profile name.
    #[error(transparent)]
    Profile(#[from] InvalidProfile),

    /// Analog modbus-control value above 10000.
    #[error("modbus control value {0} exceeds 10000")]
    ControlValue(u16),

    /// Position limits with `min >= max`.
    #[error("position limits out of order: min {min} must be below max {max}")]
    LimitOrder {
        /// Requested minimum, revolutions.
        min: f64,
        /// Requested maximum, revolutions.
        max: f64,
    },

    /// Host command mode other than 0, 1 or 2.
    #[error("invalid host command mode {0}, expected 0, 1 or 2")]
    HostCommandMode(u16),
}

/// Failures that require operator attention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CriticalFailure {
    /// The stop command did not land on both drives.
    #[error("stop failed after retries (left {left_attempts} attempts, right {right_attempts} attempts)")]
    StopExhausted {
        /// Failed attempts on the left drive.
        left_attempts: u32,
        /// Failed attempts on the right drive.
        right_attempts: u32,
    },

    /// A fault classified critical; not reset automatically.
    #[error("critical fault (left {left:#06x}, right {right:#06x})")]
    CriticalFault {
        /// Left fault code.
        left: u16,
        /// Right fault code.
        right: u16,
    },
}

/// Public error of every `DualDrive` operation.
#[derive(Debug, Clone, Error)]
pub enum DriveError {
    /// Connection could not be established.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A paired operation exhausted its retries on at least one side.
    #[error(
        "{operation} failed (left {left_attempts} attempts, right {right_attempts} attempts): {last_error}"
    )]
    OperationFailed {
        /// Operation name.
        operation: &'static str,
        /// Failed attempts on the left drive.
        left_attempts: u32,
        /// Failed attempts on the right drive.
        right_attempts: u32,
        /// Most recent transport error.
        last_error: TransportError,
    },

    /// Rejected input.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Operator attention required.
    #[error("CRITICAL: {0}")]
    Critical(#[from] CriticalFailure),

    /// Motion configuration before a successful homing.
    #[error("drives are not homed")]
    NotHomed,

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<CodecError> for DriveError {
    fn from(e: CodecError) -> Self {
        Self::Validation(e.into())
    }
}
