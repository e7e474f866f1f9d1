//! Fault poller against the simulated drive pair, with paused time.

use linact_common::config::{ConfigLoader, DriveConfig};
use linact_common::side::Side;
use linact_drive::sim::SimConnector;
use linact_drive::{CriticalFailure, DriveError, FaultCycle, SimBus, SimFailure};
use linact_poller::{FaultPoller, PollerStats};
use std::time::Duration;
use tokio::time::{Instant, sleep};

const IEG_MODE: u16 = 4318;

fn config(poller: &str) -> DriveConfig {
    let toml = format!(
        r#"
[shared]
service_name = "linact-poller-test"

[left]
host = "127.0.0.1"

[right]
host = "127.0.0.2"

[registers]
status = 104
motion_command = 4316
host_command_mode = 4317
ieg_mode = {IEG_MODE}
analog_position_min = 4320
analog_position_max = 4322
analog_velocity_max = 4324
analog_acceleration_max = 4326
analog_input_channel = 4328
analog_modbus_control = 4330
position_feedback = 378
velocity_feedback = 380

[poller]
{poller}
"#
    );
    DriveConfig::parse(&toml).unwrap()
}

fn poller(extra: &str) -> (FaultPoller<SimConnector>, SimBus) {
    let config = config(extra);
    let bus = SimBus::new(&config);
    let poller = FaultPoller::new(config, bus.connector()).unwrap();
    (poller, bus)
}

#[tokio::test(start_paused = true)]
async fn polls_on_every_interval() {
    let (mut poller, _bus) = poller("interval_s = 5.0");
    poller.connect().await.unwrap();

    let stats = poller.run_until(sleep(Duration::from_secs(12))).await;

    assert_eq!(
        stats,
        PollerStats {
            cycles: 3,
            ..PollerStats::default()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn resets_recoverable_faults() {
    let (mut poller, bus) = poller("");
    poller.connect().await.unwrap();
    bus.raise_fault(Side::Right, 0x0400);

    assert!(matches!(poller.tick().await.unwrap(), FaultCycle::Reset { .. }));
    assert_eq!(poller.tick().await.unwrap(), FaultCycle::Healthy);

    assert_eq!(bus.writes_to(Side::Right, IEG_MODE), vec![0x8002]);
    assert_eq!(poller.stats().resets, 1);
    assert_eq!(poller.stats().cycles, 2);
}

#[tokio::test(start_paused = true)]
async fn critical_fault_is_left_in_place() {
    let (mut poller, bus) = poller("");
    poller.connect().await.unwrap();
    bus.raise_fault(Side::Left, 1 << 4);

    assert!(matches!(poller.tick().await.unwrap(), FaultCycle::Critical { .. }));
    assert!(matches!(poller.tick().await.unwrap(), FaultCycle::Critical { .. }));

    assert!(bus.writes_to(Side::Left, IEG_MODE).is_empty());
    assert_eq!(bus.stops(Side::Left), 0);
    assert_eq!(poller.stats().criticals, 2);
}

#[tokio::test(start_paused = true)]
async fn critical_cycle_carries_both_fault_codes() {
    let (mut poller, bus) = poller("");
    poller.connect().await.unwrap();
    bus.raise_fault(Side::Left, 1 << 4);
    bus.raise_fault(Side::Right, 0x0400);

    let cycle = poller.tick().await.unwrap();

    assert_eq!(
        cycle.critical_failure(),
        Some(CriticalFailure::CriticalFault {
            left: 1 << 4,
            right: 0x0400,
        })
    );
    assert!(bus.writes_to(Side::Right, IEG_MODE).is_empty());
}

#[tokio::test(start_paused = true)]
async fn critical_fault_stops_drives_when_configured() {
    let (mut poller, bus) = poller("stop_on_critical = true");
    poller.connect().await.unwrap();
    bus.raise_fault(Side::Right, 1 << 5);

    poller.tick().await.unwrap();

    for side in Side::BOTH {
        assert_eq!(bus.stops(side), 1);
    }
    assert_eq!(poller.stats().stops, 1);
}

#[tokio::test(start_paused = true)]
async fn cycle_errors_do_not_end_polling() {
    let (mut poller, bus) = poller("interval_s = 1.0");
    poller.connect().await.unwrap();
    bus.fail_always(Side::Left, Some(SimFailure::Exception));

    assert!(matches!(
        poller.tick().await,
        Err(DriveError::OperationFailed { .. })
    ));

    bus.fail_always(Side::Left, None);
    let stats = poller.run_until(sleep(Duration::from_millis(2_500))).await;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.cycles, 4);
}

#[tokio::test(start_paused = true)]
async fn connect_retries_whole_rounds() {
    let (mut poller, bus) = poller("interval_s = 2.0");
    // Three attempts per round: the first round fails, the second succeeds.
    bus.fail_connects(Side::Left, 4);

    let started = Instant::now();
    poller.connect().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(bus.connects(Side::Left), 1);
    assert!(poller.drive().connection().is_connected(Side::Left));
}

#[tokio::test(start_paused = true)]
async fn connect_gives_up_after_configured_rounds() {
    let (mut poller, bus) = poller("interval_s = 1.0\nconnect_rounds = 3");
    bus.set_unreachable(Side::Right, true);

    let started = Instant::now();
    let result = poller.connect().await;

    assert!(matches!(result, Err(DriveError::Connect(_))));
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));

    poller.shutdown().await;
    assert!(!bus.is_connected(Side::Left));
}
