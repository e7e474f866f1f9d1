//! # linact Drive Library
//!
//! Coordination core for a left/right pair of linear-actuator drives on
//! Modbus TCP: connection lifecycle, paired retrying register operations,
//! homing and fault state machines and the guarded mode-word path.
//!
//! # Module Structure
//!
//! - [`connection`] - Connection manager owning both sessions
//! - [`drive`] - `DualDrive`, the upward interface
//! - [`error`] - Transport, connect, validation and critical errors
//! - [`fault`] - Fault monitor and poll cycle
//! - [`homing`] - Homing state machine and command wiring
//! - [`paired`] - Paired operation executor and retry policy
//! - [`session`] - Actuator sessions and TID windows
//! - [`sim`] - Simulated drive pair
//! - [`tcp`] - Modbus TCP transport (`tokio-modbus`)
//! - [`transport`] - Transport and connector traits, register operations
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          DualDrive                            │
//! │   home / stop / fault_reset / set_analog_* / set_ieg_mode     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │ HomingMachine│  │ FaultMonitor │  │ ModeGuard / codec   │  │
//! │  └──────┬───────┘  └──────┬───────┘  └─────────────────────┘  │
//! │         └────────┬────────┘                                   │
//! │                  ▼                                            │
//! │         execute_paired (RetryPolicy)                          │
//! │                  ▼                                            │
//! │         ConnectionManager ── left / right ActuatorSession     │
//! └──────────────────┬────────────────────────────────────────────┘
//!                    ▼
//!        Connector + RegisterTransport (tcp | sim)
//! ```

#![deny(missing_docs)]

pub mod connection;
pub mod drive;
pub mod error;
pub mod fault;
pub mod homing;
pub mod paired;
pub mod session;
pub mod sim;
pub mod tcp;
pub mod transport;

// Re-export key types for convenience
pub use crate::connection::ConnectionManager;
pub use crate::drive::DualDrive;
pub use crate::error::{ConnectError, CriticalFailure, DriveError, TransportError, ValidationError};
pub use crate::fault::FaultCycle;
pub use crate::homing::{HomingOutcome, HomingState};
pub use crate::paired::{PairedOp, PairedOutcome, RetryPolicy};
pub use crate::sim::{SimBus, SimFailure};
pub use crate::tcp::TcpConnector;
