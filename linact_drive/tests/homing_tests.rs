//! Homing state machine against the simulated drive pair.
//!
//! Time is paused so the 30 s timeout runs instantly.

mod common;

use common::{MOTION_COMMAND, config, config_with, connected};
use linact_common::consts::{MOTION_PREPARE, MOTION_START_HOMING};
use linact_common::side::Side;
use linact_drive::homing::{HomingMachine, HomingPlan};
use linact_drive::session::TidWindow;
use linact_drive::{
    ConnectionManager, DriveError, HomingOutcome, HomingState, RetryPolicy, SimBus, SimFailure,
};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn homes_on_first_tick() {
    let (mut drive, bus) = connected(config()).await;

    let outcome = drive.home().await.unwrap();

    assert_eq!(
        outcome,
        HomingOutcome::Homed {
            elapsed: Duration::ZERO,
            polls: 1
        }
    );
    assert!(drive.is_homed());
    for side in Side::BOTH {
        assert_eq!(
            bus.writes_to(side, MOTION_COMMAND),
            vec![MOTION_PREPARE, MOTION_START_HOMING]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn waits_for_the_slower_drive() {
    let (mut drive, bus) = connected(config()).await;
    bus.set_homing_after(Side::Left, Some(5));

    match drive.home().await.unwrap() {
        HomingOutcome::Homed { elapsed, polls } => {
            assert_eq!(polls, 6);
            assert!(elapsed >= Duration::from_millis(1_000));
            assert!(elapsed < Duration::from_millis(1_200));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn times_out_when_one_drive_never_homes() {
    let (mut drive, bus) = connected(config()).await;
    bus.set_homing_after(Side::Right, None);

    match drive.home().await.unwrap() {
        HomingOutcome::TimedOut { elapsed, polls } => {
            assert!(elapsed >= Duration::from_secs(30));
            assert!(elapsed < Duration::from_secs(30) + Duration::from_millis(250));
            assert!((150..=152).contains(&polls), "polls = {polls}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!drive.is_homed());
    assert!(matches!(
        drive.set_analog_input_channel(2).await,
        Err(DriveError::NotHomed)
    ));
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_honoured() {
    let (mut drive, bus) = connected(config_with("[homing]\ntimeout_s = 2.0\n")).await;
    bus.set_homing_after(Side::Left, None);

    let outcome = drive.home().await.unwrap();

    assert_eq!(outcome.state(), HomingState::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn crossed_wiring_routes_commands_to_the_other_session() {
    let config = config_with(
        r#"
[homing]
wiring = "crossed"
command_register_left = 5000
command_register_right = 5001
"#,
    );
    let (mut drive, bus) = connected(config).await;

    assert!(drive.home().await.unwrap().is_homed());

    // Left actuator's command (5000) travels on the right session.
    assert_eq!(
        bus.writes_to(Side::Right, 5000),
        vec![MOTION_PREPARE, MOTION_START_HOMING]
    );
    assert_eq!(
        bus.writes_to(Side::Left, 5001),
        vec![MOTION_PREPARE, MOTION_START_HOMING]
    );
    assert!(bus.writes_to(Side::Left, MOTION_COMMAND).is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_command_fails_without_polling() {
    let (mut drive, bus) = connected(config()).await;
    bus.fail_always(Side::Left, Some(SimFailure::Exception));

    match drive.home().await.unwrap() {
        HomingOutcome::Failed { reason } => {
            assert!(reason.contains("homing_prepare"), "{reason}");
            assert!(reason.contains("left 10"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!drive.is_homed());
    // The start command is never sent once the prepare phase failed.
    assert_eq!(
        bus.writes_to(Side::Right, MOTION_COMMAND),
        vec![MOTION_PREPARE]
    );
}

#[tokio::test(start_paused = true)]
async fn machine_reports_terminal_state() {
    let config = config();
    let bus = SimBus::new(&config);
    let mut conn = ConnectionManager::new(&config, bus.connector(), TidWindow::new(1, 100));
    conn.connect().await.unwrap();

    let plan = HomingPlan::new(&config.homing, config.registers.motion_command);
    let mut machine = HomingMachine::new(
        plan,
        config.registers.status,
        config.homing.timeout(),
        config.homing.poll_interval(),
    );
    assert_eq!(machine.state(), HomingState::Initiated);

    let outcome = machine
        .run(&mut conn, &RetryPolicy::stop(&config.retry))
        .await;

    assert!(outcome.is_homed());
    assert_eq!(machine.state(), HomingState::Homed);
}

#[tokio::test(start_paused = true)]
async fn status_read_failures_are_survived() {
    let (mut drive, bus) = connected(config()).await;
    bus.set_homing_after(Side::Left, Some(2));
    let homing = drive.home();
    tokio::pin!(homing);

    // Drop the left link once the commands are out; polling reconnects.
    tokio::select! {
        biased;
        _ = &mut homing => panic!("homing finished before the link drop"),
        _ = tokio::time::sleep(Duration::from_millis(100)) => bus.drop_connection(Side::Left),
    }
    let outcome = homing.await.unwrap();

    assert!(outcome.is_homed());
    assert_eq!(bus.connects(Side::Left), 2);
}
