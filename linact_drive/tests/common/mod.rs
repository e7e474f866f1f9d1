//! Shared fixtures for the linact_drive integration tests.

#![allow(dead_code)]

use linact_common::config::{ConfigLoader, DriveConfig};
use linact_drive::sim::SimConnector;
use linact_drive::{DualDrive, SimBus};

pub const STATUS: u16 = 104;
pub const MOTION_COMMAND: u16 = 4316;
pub const HOST_COMMAND_MODE: u16 = 4317;
pub const IEG_MODE: u16 = 4318;
pub const POSITION_MIN: u16 = 4320;
pub const POSITION_MAX: u16 = 4322;
pub const VELOCITY_MAX: u16 = 4324;
pub const ACCELERATION_MAX: u16 = 4326;
pub const INPUT_CHANNEL: u16 = 4328;
pub const MODBUS_CONTROL: u16 = 4330;
pub const POSITION_FEEDBACK: u16 = 378;
pub const VELOCITY_FEEDBACK: u16 = 380;
pub const RECENT_FAULT: u16 = 846;
pub const SETTINGS_RESET: u16 = 4001;
/// Not in the default map; tests opt in with `peak_current = {PEAK_CURRENT}`.
pub const PEAK_CURRENT: u16 = 4340;

/// Test configuration; `extra` is appended verbatim.
pub fn config_with(extra: &str) -> DriveConfig {
    let toml = format!(
        r#"
[shared]
service_name = "linact-test"

[left]
host = "127.0.0.1"

[right]
host = "127.0.0.2"

[registers]
status = {STATUS}
motion_command = {MOTION_COMMAND}
host_command_mode = {HOST_COMMAND_MODE}
ieg_mode = {IEG_MODE}
analog_position_min = {POSITION_MIN}
analog_position_max = {POSITION_MAX}
analog_velocity_max = {VELOCITY_MAX}
analog_acceleration_max = {ACCELERATION_MAX}
analog_input_channel = {INPUT_CHANNEL}
analog_modbus_control = {MODBUS_CONTROL}
position_feedback = {POSITION_FEEDBACK}
velocity_feedback = {VELOCITY_FEEDBACK}
{extra}"#
    );
    let config = DriveConfig::parse(&toml).unwrap();
    config.validate().unwrap();
    config
}

pub fn config() -> DriveConfig {
    config_with("")
}

/// Drive pair on a fresh simulated bus.
pub fn sim_drive(config: DriveConfig) -> (DualDrive<SimConnector>, SimBus) {
    let bus = SimBus::new(&config);
    let drive = DualDrive::new(config, bus.connector()).unwrap();
    (drive, bus)
}

/// Connected drive pair on a fresh simulated bus.
pub async fn connected(config: DriveConfig) -> (DualDrive<SimConnector>, SimBus) {
    let (mut drive, bus) = sim_drive(config);
    drive.connect().await.unwrap();
    (drive, bus)
}

/// Connected and homed drive pair.
pub async fn homed(config: DriveConfig) -> (DualDrive<SimConnector>, SimBus) {
    let (mut drive, bus) = connected(config).await;
    assert!(drive.home().await.unwrap().is_homed());
    (drive, bus)
}
