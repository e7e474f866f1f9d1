//! Position feedback → analog modbus-control translation.
//!
//! The analog modbus-control register takes a value in `0..=10000` that the
//! drive maps linearly onto its configured position window
//! `[analog_position_min, analog_position_max]`.

use crate::codec::decode_revolutions;
use crate::consts::MODBUS_CONTROL_MAX;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw 2-word position feedback as read from the drive (`[fraction, whole]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedbackPair {
    /// Fractional revolutions, scaled by 65535.
    pub low: u16,
    /// Whole revolutions.
    pub high: u16,
}

impl FeedbackPair {
    /// Build from a register block read at the feedback address.
    ///
    /// Returns `None` if fewer than two words were read.
    pub fn from_words(words: &[u16]) -> Option<Self> {
        match words {
            [low, high, ..] => Some(Self {
                low: *low,
                high: *high,
            }),
            _ => None,
        }
    }

    /// Decoded revolutions.
    #[inline]
    pub fn revolutions(&self) -> f64 {
        decode_revolutions(self.low, self.high)
    }
}

/// Rejected control window.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("invalid position window: min {min} must be finite, >= 0 and below max {max}")]
pub struct InvalidWindow {
    /// Requested minimum.
    pub min: f64,
    /// Requested maximum.
    pub max: f64,
}

/// The position window the control value maps onto, in revolutions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlWindow {
    min_revs: f64,
    max_revs: f64,
}

impl ControlWindow {
    /// Build a window; `min_revs < max_revs` is required.
    pub fn new(min_revs: f64, max_revs: f64) -> Result<Self, InvalidWindow> {
        if !min_revs.is_finite() || !max_revs.is_finite() || min_revs < 0.0 || min_revs >= max_revs
        {
            return Err(InvalidWindow {
                min: min_revs,
                max: max_revs,
            });
        }
        Ok(Self { min_revs, max_revs })
    }

    /// Window minimum.
    pub fn min_revs(&self) -> f64 {
        self.min_revs
    }

    /// Window maximum.
    pub fn max_revs(&self) -> f64 {
        self.max_revs
    }

    /// Control value that commands `revs`; clamped to the window.
    pub fn to_control(&self, revs: f64) -> u16 {
        if revs.is_nan() {
            return 0;
        }
        let span = self.max_revs - self.min_revs;
        let ratio = ((revs - self.min_revs) / span).clamp(0.0, 1.0);
        (ratio * f64::from(MODBUS_CONTROL_MAX)).round() as u16
    }

    /// Position in revolutions commanded by `control` (clamped to `0..=10000`).
    pub fn to_revolutions(&self, control: u16) -> f64 {
        let ratio = f64::from(control.min(MODBUS_CONTROL_MAX)) / f64::from(MODBUS_CONTROL_MAX);
        self.min_revs + ratio * (self.max_revs - self.min_revs)
    }

    /// Control value that holds the actuator at its current feedback.
    #[inline]
    pub fn hold(&self, feedback: &FeedbackPair) -> u16 {
        self.to_control(feedback.revolutions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_map_to_control_range() {
        let window = ControlWindow::new(0.4, 28.9).unwrap();
        assert_eq!(window.to_control(0.4), 0);
        assert_eq!(window.to_control(28.9), MODBUS_CONTROL_MAX);
        assert_eq!(window.to_control(-3.0), 0);
        assert_eq!(window.to_control(100.0), MODBUS_CONTROL_MAX);
    }

    #[test]
    fn midpoint_round_trips() {
        let window = ControlWindow::new(2.0, 12.0).unwrap();
        assert_eq!(window.to_control(7.0), 5_000);
        assert!((window.to_revolutions(5_000) - 7.0).abs() < 1e-9);
        assert_eq!(window.to_revolutions(u16::MAX), 12.0);
    }

    #[test]
    fn hold_uses_decoded_feedback() {
        let window = ControlWindow::new(0.0, 10.0).unwrap();
        // 5 + 32768/65535 revolutions
        let feedback = FeedbackPair::from_words(&[32768, 5]).unwrap();
        assert_eq!(window.hold(&feedback), 5_500);
        assert_eq!(window.hold(&FeedbackPair { low: 0, high: 5 }), 5_000);
        assert!(FeedbackPair::from_words(&[1]).is_none());
    }

    #[test]
    fn invalid_windows_rejected() {
        assert!(ControlWindow::new(5.0, 5.0).is_err());
        assert!(ControlWindow::new(-1.0, 5.0).is_err());
        assert!(ControlWindow::new(0.0, f64::NAN).is_err());
    }
}
