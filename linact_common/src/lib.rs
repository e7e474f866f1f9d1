//! linact Common Library
//!
//! This crate provides the pure building blocks shared by every linact
//! workspace crate: configuration loading, the drive register codec, the
//! mode-word safety guard and the status/fault vocabulary.
//!
//! # Module Structure
//!
//! - [`codec`] - Fixed-point register encodings (Q8.8, Q12.4, split-20, split-24)
//! - [`config`] - Configuration loading traits and the `DriveConfig` record
//! - [`consts`] - Protocol constants and configuration defaults
//! - [`mode`] - Safety bitmask guard for mode (IEG) register writes
//! - [`position`] - Feedback → normalized control value translation
//! - [`side`] - Left/right addressing helpers
//! - [`status`] - Drive status bits and fault classification
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use linact_common::codec::rpm_to_velocity_registers;
//! use linact_common::mode::{restrict_mode, ModeProfile};
//!
//! assert_eq!(rpm_to_velocity_registers(60.0), (256, 0));
//! assert_ne!(restrict_mode(0xFFFF, ModeProfile::Default), 0xFFFF);
//! ```

pub mod codec;
pub mod config;
pub mod consts;
pub mod mode;
pub mod position;
pub mod prelude;
pub mod side;
pub mod status;
