//! Fixed-point register codec.
//!
//! The drives expose velocity and acceleration as 32-bit fixed-point values
//! split across two 16-bit registers:
//!
//! | Form        | Whole bits | Fraction bits | Registers                          |
//! |-------------|------------|---------------|------------------------------------|
//! | velocity    | 8          | 24            | `[whole:8 | frac_hi:8]`, `frac_lo` |
//! | acceleration| 12         | 20            | `[whole:12 | frac_hi:4]`, `frac_lo`|
//! | position    | 16         | 16            | `frac`, `whole`                    |
//!
//! Everything in here is pure. Encoders reject out-of-domain input; packers
//! mask each field to its declared width so no caller can bleed into a
//! neighbouring field.

use crate::consts::MAX_RPM;
use thiserror::Error;

/// Resolution of the 24-bit velocity fraction (one LSB).
pub const VELOCITY_RESOLUTION: f64 = 1.0 / ((1u32 << 24) - 1) as f64;

/// Resolution of the 20-bit acceleration fraction (one LSB).
pub const ACCELERATION_RESOLUTION: f64 = 1.0 / ((1u32 << 20) - 1) as f64;

/// Resolution of the 16-bit position fraction.
pub const POSITION_FRACTION_SCALE: f64 = 65535.0;

const MASK_24: u32 = 0x00FF_FFFF;
const MASK_20: u32 = 0x000F_FFFF;

/// Errors raised by the register codec.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CodecError {
    /// Input outside the encoder's documented domain.
    #[error("value {value} outside encodable range [{min}, {max}]")]
    OutOfRange {
        /// Rejected input.
        value: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound.
        max: f64,
    },
}

fn check_fraction(value: f64) -> Result<(), CodecError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(CodecError::OutOfRange {
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

/// Split an in-range fraction into the 24-bit velocity form.
fn split_fraction_24(value: f64) -> (u16, u8) {
    let scaled = (value / VELOCITY_RESOLUTION) as u32 & MASK_24;
    ((scaled & 0xFFFF) as u16, (scaled >> 16) as u8)
}

/// Split an in-range fraction into the 20-bit acceleration form.
fn split_fraction_20(value: f64) -> (u16, u8) {
    let scaled = (value / ACCELERATION_RESOLUTION) as u32 & MASK_20;
    ((scaled & 0xFFFF) as u16, ((scaled >> 16) & 0x0F) as u8)
}

/// Encode a fraction of a revolution as `(low 16 bits, high 8 bits)` of a
/// 24-bit value.
///
/// # Errors
/// `CodecError::OutOfRange` if `value` is not within `[0, 1]`.
pub fn encode_fraction_24(value: f64) -> Result<(u16, u8), CodecError> {
    check_fraction(value)?;
    Ok(split_fraction_24(value))
}

/// Encode a fraction of a revolution as `(low 16 bits, high 4 bits)` of a
/// 20-bit value.
///
/// # Errors
/// `CodecError::OutOfRange` if `value` is not within `[0, 1]`.
pub fn encode_fraction_20(value: f64) -> Result<(u16, u8), CodecError> {
    check_fraction(value)?;
    Ok(split_fraction_20(value))
}

/// Inverse of [`encode_fraction_24`].
pub fn decode_fraction_24(low: u16, high: u8) -> f64 {
    let raw = (u32::from(high) << 16) | u32::from(low);
    f64::from(raw & MASK_24) * VELOCITY_RESOLUTION
}

/// Inverse of [`encode_fraction_20`]. Only the low nibble of `high` is used.
pub fn decode_fraction_20(low: u16, high: u8) -> f64 {
    let raw = (u32::from(high & 0x0F) << 16) | u32::from(low);
    f64::from(raw & MASK_20) * ACCELERATION_RESOLUTION
}

/// Pack an 8-bit whole part and 8-bit fraction: `(whole << 8) | frac8`.
#[inline]
pub const fn combine_8_8(whole: u8, frac8: u8) -> u16 {
    ((whole as u16) << 8) | frac8 as u16
}

/// Pack a 12-bit whole part and 4-bit fraction: `(whole << 4) | frac4`.
///
/// `whole` is masked to 12 bits and `frac4` to 4 bits first.
#[inline]
pub const fn combine_12_4(whole: u16, frac4: u8) -> u16 {
    ((whole & 0x0FFF) << 4) | (frac4 & 0x0F) as u16
}

/// Clamp an RPM request and split it into whole and fractional revolutions
/// per second.
fn rpm_to_revs(rpm: f64) -> (f64, f64) {
    let rpm = if rpm.is_nan() {
        0.0
    } else {
        rpm.clamp(0.0, MAX_RPM)
    };
    let revs = rpm / 60.0;
    let whole = revs.trunc();
    (whole, revs - whole)
}

/// Convert RPM into the velocity register pair `(whole_reg, frac_reg)`.
///
/// RPM is clamped to `[0, 120]`.
pub fn rpm_to_velocity_registers(rpm: f64) -> (u16, u16) {
    let (whole, frac) = rpm_to_revs(rpm);
    let (low, high) = split_fraction_24(frac);
    (combine_8_8(whole as u8, high), low)
}

/// Convert RPM into the acceleration register pair `(whole_reg, frac_reg)`.
///
/// RPM is clamped to `[0, 120]`.
pub fn rpm_to_acceleration_registers(rpm: f64) -> (u16, u16) {
    let (whole, frac) = rpm_to_revs(rpm);
    let (low, high) = split_fraction_20(frac);
    (combine_12_4(whole as u16, high), low)
}

/// Decode a `(fraction, whole)` feedback pair into revolutions.
#[inline]
pub fn decode_revolutions(low: u16, high: u16) -> f64 {
    f64::from(high) + f64::from(low) / POSITION_FRACTION_SCALE
}

/// Encode revolutions into the `(fraction, whole)` pair used by the analog
/// position limit registers. Inverse of [`decode_revolutions`].
///
/// # Errors
/// `CodecError::OutOfRange` for negative, non-finite or `>= 65536` input.
pub fn encode_revolutions(revs: f64) -> Result<(u16, u16), CodecError> {
    let max = f64::from(u16::MAX) + 1.0;
    if !revs.is_finite() || revs < 0.0 || revs >= max {
        return Err(CodecError::OutOfRange {
            value: revs,
            min: 0.0,
            max,
        });
    }
    let whole = revs.trunc();
    let low = ((revs - whole) * POSITION_FRACTION_SCALE).round() as u16;
    Ok((low, whole as u16))
}
