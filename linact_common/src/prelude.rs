//! Prelude module for common re-exports.
//!
//! Consumers can do `use linact_common::prelude::*;` and get the most
//! important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use linact_common::prelude::*;
//!
//! assert_eq!(Side::Left.opposite(), Side::Right);
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, DriveConfig, Endpoint, HomingWiring, RegisterMap, SharedConfig,
};

// ─── Codec ──────────────────────────────────────────────────────────
pub use crate::codec::{
    CodecError, decode_revolutions, encode_revolutions, rpm_to_acceleration_registers,
    rpm_to_velocity_registers,
};

// ─── Safety guard ───────────────────────────────────────────────────
pub use crate::mode::{ModeBits, ModeGuard, ModeProfile, restrict_mode};

// ─── Status / faults ────────────────────────────────────────────────
pub use crate::status::{DriveStatus, FaultClass, FaultPolicy};

// ─── Addressing and position ────────────────────────────────────────
pub use crate::position::{ControlWindow, FeedbackPair};
pub use crate::side::{Side, SidePair};
