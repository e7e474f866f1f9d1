//! Drive status bits and fault classification.
//!
//! The status (OEG) register exposes "homed" and "in fault" among other
//! bits. The recent-fault register holds a fault code whose bits are
//! classified as critical (thermal: do not reset, escalate to the operator)
//! or recoverable (reset and continue).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

bitflags! {
    /// Bits of the drive status (OEG) register used by the coordinator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DriveStatus: u16 {
        /// Drive has completed homing.
        const HOMED    = 1 << 1;
        /// Drive is in a fault state.
        const IN_FAULT = 1 << 3;
    }
}

impl DriveStatus {
    /// Interpret a raw status word, keeping unknown bits.
    #[inline]
    pub const fn from_word(word: u16) -> Self {
        Self::from_bits_retain(word)
    }

    /// Status bit 1.
    #[inline]
    pub const fn is_homed(&self) -> bool {
        self.contains(Self::HOMED)
    }

    /// Status bit 3.
    #[inline]
    pub const fn in_fault(&self) -> bool {
        self.contains(Self::IN_FAULT)
    }
}

bitflags! {
    /// Known bits of the recent-fault register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultBits: u16 {
        /// Control board over-temperature. **CRITICAL**.
        const BOARD_TEMPERATURE    = 1 << 4;
        /// Actuator (motor) over-temperature. **CRITICAL**.
        const ACTUATOR_TEMPERATURE = 1 << 5;
        /// Field-bus communication fault.
        const COMMS                = 1 << 10;
    }
}

impl FaultBits {
    /// Default critical mask.
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::BOARD_TEMPERATURE.bits() | Self::ACTUATOR_TEMPERATURE.bits(),
    );
}

/// Classification of a fault code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultClass {
    /// No fault bits set.
    None,
    /// Safe to clear with a fault reset.
    Recoverable,
    /// Must not be reset automatically; requires operator/ESTOP handling.
    Critical,
}

/// Rejected fault configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("critical fault bit index {0} exceeds 15")]
pub struct InvalidFaultBit(pub u8);

/// Which fault bits are critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    critical_mask: u16,
}

impl FaultPolicy {
    /// Build from bit indices.
    pub fn from_bits(critical_bits: &[u8]) -> Result<Self, InvalidFaultBit> {
        let mut critical_mask = 0u16;
        for &bit in critical_bits {
            if bit > 15 {
                return Err(InvalidFaultBit(bit));
            }
            critical_mask |= 1 << bit;
        }
        Ok(Self { critical_mask })
    }

    /// Mask of critical bits.
    #[inline]
    pub const fn critical_mask(&self) -> u16 {
        self.critical_mask
    }

    /// Classify a raw fault code.
    pub const fn classify(&self, code: u16) -> FaultClass {
        if code == 0 {
            FaultClass::None
        } else if code & self.critical_mask != 0 {
            FaultClass::Critical
        } else {
            FaultClass::Recoverable
        }
    }
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self {
            critical_mask: FaultBits::CRITICAL_MASK.bits(),
        }
    }
}

/// Classify `code` with the default critical mask.
#[inline]
pub fn classify(code: u16) -> FaultClass {
    FaultPolicy::default().classify(code)
}
