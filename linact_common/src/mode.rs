//! Safety bitmask guard for the mode (IEG) register.
//!
//! Writing an arbitrary word to the mode register can redefine the home
//! reference and release the actuator brakes. Every mode write therefore goes
//! through [`restrict_mode`] (or a configured [`ModeGuard`]), which keeps only
//! the bits that may ever be commanded:
//!
//! | Bit | Meaning           | Default profile | Alternative profile |
//! |-----|-------------------|-----------------|---------------------|
//! | 1   | enable maintained | allowed         | allowed             |
//! | 7   | alternate mode    | -               | allowed             |
//! | 15  | fault reset       | allowed         | allowed             |
//!
//! No input, including `0xFFFF`, can produce a bit outside the allow mask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

bitflags! {
    /// Named bits of the mode (IEG) register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IegMode: u16 {
        /// Enable while the bit is held (never commanded by this crate).
        const ENABLE_MOMENTARY  = 1 << 0;
        /// Latched enable.
        const ENABLE_MAINTAINED = 1 << 1;
        /// Alternate operating mode.
        const ALTERNATE_MODE    = 1 << 7;
        /// Clear latched faults.
        const FAULT_RESET       = 1 << 15;
    }
}

impl IegMode {
    /// Allow mask for [`ModeProfile::Default`].
    pub const DEFAULT_ALLOW: Self = Self::from_bits_truncate(
        Self::FAULT_RESET.bits() | Self::ENABLE_MAINTAINED.bits(),
    );

    /// Allow mask for [`ModeProfile::Alternative`].
    pub const ALTERNATIVE_ALLOW: Self = Self::from_bits_truncate(
        Self::FAULT_RESET.bits() | Self::ENABLE_MAINTAINED.bits() | Self::ALTERNATE_MODE.bits(),
    );
}

/// Allow-list profile for a mode write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeProfile {
    /// Fault reset + enable maintained.
    #[default]
    Default,
    /// Default plus the alternate-mode bit.
    Alternative,
}

impl fmt::Display for ModeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Alternative => f.write_str("alternative"),
        }
    }
}

/// Rejected profile name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid mode profile '{0}', expected 'default' or 'alternative'")]
pub struct InvalidProfile(pub String);

impl FromStr for ModeProfile {
    type Err = InvalidProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("default") {
            Ok(Self::Default)
        } else if s.eq_ignore_ascii_case("alternative") {
            Ok(Self::Alternative)
        } else {
            Err(InvalidProfile(s.to_string()))
        }
    }
}

/// Allow mask for a profile using the documented bit positions.
#[inline]
pub const fn allow_mask(profile: ModeProfile) -> u16 {
    match profile {
        ModeProfile::Default => IegMode::DEFAULT_ALLOW.bits(),
        ModeProfile::Alternative => IegMode::ALTERNATIVE_ALLOW.bits(),
    }
}

/// Restrict a raw mode word to the profile's allow mask.
#[inline]
pub const fn restrict_mode(raw: u16, profile: ModeProfile) -> u16 {
    raw & allow_mask(profile)
}

/// Bit positions of the three commandable mode bits.
///
/// These must match the target drive firmware. Only the positions can be
/// changed; the set of commandable bits is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeBits {
    /// Fault reset bit index.
    #[serde(default = "default_fault_reset_bit")]
    pub fault_reset: u8,
    /// Enable maintained bit index.
    #[serde(default = "default_enable_maintained_bit")]
    pub enable_maintained: u8,
    /// Alternate mode bit index.
    #[serde(default = "default_alternate_mode_bit")]
    pub alternate_mode: u8,
}

fn default_fault_reset_bit() -> u8 {
    15
}
fn default_enable_maintained_bit() -> u8 {
    1
}
fn default_alternate_mode_bit() -> u8 {
    7
}

impl Default for ModeBits {
    fn default() -> Self {
        Self {
            fault_reset: default_fault_reset_bit(),
            enable_maintained: default_enable_maintained_bit(),
            alternate_mode: default_alternate_mode_bit(),
        }
    }
}

/// Rejected [`ModeBits`] layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeBitsError {
    /// A bit index does not fit a 16-bit register.
    #[error("mode bit '{name}' index {index} exceeds 15")]
    OutOfRange {
        /// Field name.
        name: &'static str,
        /// Offending index.
        index: u8,
    },
    /// Two named bits share one position.
    #[error("mode bits must be distinct (fault_reset={0}, enable_maintained={1}, alternate_mode={2})")]
    Overlap(u8, u8, u8),
}

impl ModeBits {
    /// Validate the layout.
    pub fn validate(&self) -> Result<(), ModeBitsError> {
        for (name, index) in [
            ("fault_reset", self.fault_reset),
            ("enable_maintained", self.enable_maintained),
            ("alternate_mode", self.alternate_mode),
        ] {
            if index > 15 {
                return Err(ModeBitsError::OutOfRange { name, index });
            }
        }
        if self.fault_reset == self.enable_maintained
            || self.fault_reset == self.alternate_mode
            || self.enable_maintained == self.alternate_mode
        {
            return Err(ModeBitsError::Overlap(
                self.fault_reset,
                self.enable_maintained,
                self.alternate_mode,
            ));
        }
        Ok(())
    }
}

/// Mode guard built from a validated [`ModeBits`] layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeGuard {
    default_allow: u16,
    alternative_allow: u16,
}

impl ModeGuard {
    /// Build a guard, rejecting invalid layouts.
    pub fn new(bits: &ModeBits) -> Result<Self, ModeBitsError> {
        bits.validate()?;
        let default_allow = (1u16 << bits.fault_reset) | (1u16 << bits.enable_maintained);
        Ok(Self {
            default_allow,
            alternative_allow: default_allow | (1u16 << bits.alternate_mode),
        })
    }

    /// Allow mask for `profile`.
    #[inline]
    pub const fn allow_mask(&self, profile: ModeProfile) -> u16 {
        match profile {
            ModeProfile::Default => self.default_allow,
            ModeProfile::Alternative => self.alternative_allow,
        }
    }

    /// Restrict `raw` to the allow mask for `profile`.
    #[inline]
    pub const fn restrict(&self, raw: u16, profile: ModeProfile) -> u16 {
        raw & self.allow_mask(profile)
    }

    /// Word used for a fault reset: every allowed bit set.
    #[inline]
    pub const fn reset_word(&self, profile: ModeProfile) -> u16 {
        self.restrict(u16::MAX, profile)
    }
}

impl Default for ModeGuard {
    fn default() -> Self {
        Self {
            default_allow: IegMode::DEFAULT_ALLOW.bits(),
            alternative_allow: IegMode::ALTERNATIVE_ALLOW.bits(),
        }
    }
}
