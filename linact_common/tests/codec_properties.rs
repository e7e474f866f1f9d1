//! Property tests for the register codec and the mode guard.

use linact_common::codec::*;
use linact_common::mode::{ModeBits, ModeGuard, ModeProfile, allow_mask, restrict_mode};
use linact_common::position::ControlWindow;
use proptest::prelude::*;

fn profile() -> impl Strategy<Value = ModeProfile> {
    prop_oneof![Just(ModeProfile::Default), Just(ModeProfile::Alternative)]
}

proptest! {
    #[test]
    fn restricted_mode_never_leaves_mask(raw in any::<u16>(), profile in profile()) {
        prop_assert_eq!(restrict_mode(raw, profile) & !allow_mask(profile), 0);
    }

    #[test]
    fn relocated_guard_never_sets_more_than_three_bits(
        fault_reset in 0u8..16,
        enable_maintained in 0u8..16,
        alternate_mode in 0u8..16,
        raw in any::<u16>(),
    ) {
        let bits = ModeBits { fault_reset, enable_maintained, alternate_mode };
        if let Ok(guard) = ModeGuard::new(&bits) {
            prop_assert!(guard.restrict(raw, ModeProfile::Alternative).count_ones() <= 3);
            prop_assert!(guard.restrict(raw, ModeProfile::Default).count_ones() <= 2);
        }
    }

    #[test]
    fn fraction_24_round_trips_within_one_lsb(value in 0.0f64..=1.0) {
        let (low, high) = encode_fraction_24(value).unwrap();
        prop_assert!((decode_fraction_24(low, high) - value).abs() <= VELOCITY_RESOLUTION);
    }

    #[test]
    fn fraction_20_round_trips_within_one_lsb(value in 0.0f64..=1.0) {
        let (low, high) = encode_fraction_20(value).unwrap();
        prop_assert!(high <= 0x0F);
        prop_assert!((decode_fraction_20(low, high) - value).abs() <= ACCELERATION_RESOLUTION);
    }

    #[test]
    fn out_of_domain_fractions_rejected(value in prop_oneof![-1e6f64..-1e-9, 1.000_001f64..1e6]) {
        prop_assert!(encode_fraction_24(value).is_err());
        prop_assert!(encode_fraction_20(value).is_err());
    }

    #[test]
    fn combine_12_4_keeps_fields_separate(whole in any::<u16>(), frac in any::<u8>()) {
        let packed = combine_12_4(whole, frac);
        prop_assert_eq!(packed >> 4, whole & 0x0FFF);
        prop_assert_eq!(packed & 0x0F, u16::from(frac & 0x0F));
    }

    #[test]
    fn rpm_above_limit_equals_limit(rpm in 120.0f64..10_000.0) {
        prop_assert_eq!(
            rpm_to_velocity_registers(rpm),
            rpm_to_velocity_registers(120.0)
        );
        prop_assert_eq!(
            rpm_to_acceleration_registers(rpm),
            rpm_to_acceleration_registers(120.0)
        );
    }

    #[test]
    fn revolutions_round_trip(revs in 0.0f64..65_535.0) {
        let (low, high) = encode_revolutions(revs).unwrap();
        prop_assert!((decode_revolutions(low, high) - revs).abs() <= 1.0 / POSITION_FRACTION_SCALE);
    }

    #[test]
    fn control_value_is_bounded(revs in -100.0f64..100.0) {
        let window = ControlWindow::new(0.3937, 28.937).unwrap();
        prop_assert!(window.to_control(revs) <= 10_000);
    }
}
