//! Register codec micro-benchmark.
//!
//! Measures the pure conversion paths used on every configuration write:
//! - RPM → velocity register pair
//! - RPM → acceleration register pair
//! - Mode guard restriction
//! - Feedback → control value

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use linact_common::codec::{rpm_to_acceleration_registers, rpm_to_velocity_registers};
use linact_common::mode::{ModeGuard, ModeProfile};
use linact_common::position::{ControlWindow, FeedbackPair};

fn bench_rpm_conversion(c: &mut Criterion) {
    let mut rpm = 0.0f64;

    c.bench_function("rpm_to_velocity_registers", |b| {
        b.iter(|| {
            rpm = (rpm + 0.37) % 130.0;
            black_box(rpm_to_velocity_registers(black_box(rpm)))
        })
    });

    c.bench_function("rpm_to_acceleration_registers", |b| {
        b.iter(|| {
            rpm = (rpm + 0.37) % 130.0;
            black_box(rpm_to_acceleration_registers(black_box(rpm)))
        })
    });
}

fn bench_mode_guard(c: &mut Criterion) {
    let guard = ModeGuard::default();
    let mut raw = 0u16;

    c.bench_function("mode_guard_restrict", |b| {
        b.iter(|| {
            raw = raw.wrapping_add(0x0101);
            black_box(guard.restrict(black_box(raw), ModeProfile::Alternative))
        })
    });
}

fn bench_hold_position(c: &mut Criterion) {
    let window = ControlWindow::new(0.3937, 28.937).unwrap_or_else(|e| panic!("{e}"));
    let mut feedback = FeedbackPair { low: 0, high: 0 };

    c.bench_function("hold_position_control_value", |b| {
        b.iter(|| {
            feedback.low = feedback.low.wrapping_add(977);
            feedback.high = (feedback.high + 1) % 30;
            black_box(window.hold(black_box(&feedback)))
        })
    });
}

criterion_group!(
    benches,
    bench_rpm_conversion,
    bench_mode_guard,
    bench_hold_position
);
criterion_main!(benches);
