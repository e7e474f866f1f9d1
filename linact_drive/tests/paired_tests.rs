//! Paired executor behaviour against the simulated drive pair.

mod common;

use common::{INPUT_CHANNEL, config};
use linact_common::side::Side;
use linact_drive::paired::{PairedOutcome, execute_paired};
use linact_drive::sim::SimConnector;
use linact_drive::session::TidWindow;
use linact_drive::transport::{RegisterOp, RegisterReply};
use linact_drive::{
    ConnectionManager, DriveError, PairedOp, RetryPolicy, SimBus, SimFailure, TransportError,
};
use std::time::Duration;
use tokio::time::Instant;

async fn manager(bus: &SimBus) -> ConnectionManager<SimConnector> {
    let config = config();
    let mut conn = ConnectionManager::new(&config, bus.connector(), TidWindow::new(10_001, 20_000));
    conn.connect().await.unwrap();
    conn
}

fn write_channel() -> PairedOp {
    PairedOp::both(RegisterOp::WriteSingle {
        addr: INPUT_CHANNEL,
        value: 2,
    })
}

fn command_policy() -> RetryPolicy {
    RetryPolicy::command(&config().retry)
}

async fn write_channel_on_both(conn: &mut ConnectionManager<SimConnector>) -> PairedOutcome {
    execute_paired(
        conn,
        "set_analog_input_channel",
        &write_channel(),
        &command_policy(),
    )
    .await
}

#[tokio::test(start_paused = true)]
async fn both_sides_succeed_first_time() {
    let bus = SimBus::new(&config());
    let mut conn = manager(&bus).await;

    let outcome = write_channel_on_both(&mut conn).await;

    assert!(outcome.is_success());
    assert_eq!((outcome.attempts_left(), outcome.attempts_right()), (0, 0));
    assert_eq!(bus.writes_to(Side::Left, INPUT_CHANNEL), vec![2]);
    assert_eq!(bus.writes_to(Side::Right, INPUT_CHANNEL), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn retries_only_the_failing_side() {
    let bus = SimBus::new(&config());
    let mut conn = manager(&bus).await;
    bus.fail_next(Side::Right, 2, SimFailure::Exception);

    let started = Instant::now();
    let outcome = write_channel_on_both(&mut conn).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts_left(), 0);
    assert_eq!(outcome.attempts_right(), 2);
    // The left side is not re-issued once it has succeeded.
    assert_eq!(bus.writes_to(Side::Left, INPUT_CHANNEL), vec![2]);
    assert_eq!(bus.writes_to(Side::Right, INPUT_CHANNEL), vec![2]);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn one_sided_success_reports_failure() {
    let bus = SimBus::new(&config());
    let mut conn = manager(&bus).await;
    bus.fail_always(Side::Right, Some(SimFailure::Exception));

    let outcome = write_channel_on_both(&mut conn).await;

    assert!(!outcome.is_success());
    assert!(outcome.sides.left.succeeded());
    assert_eq!(outcome.attempts_right(), 3);
    match outcome.into_result() {
        Err(DriveError::OperationFailed {
            operation,
            left_attempts,
            right_attempts,
            last_error,
        }) => {
            assert_eq!(operation, "set_analog_input_channel");
            assert_eq!((left_attempts, right_attempts), (0, 3));
            assert!(matches!(last_error, TransportError::Exception(_)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn dropped_connection_is_reopened() {
    let bus = SimBus::new(&config());
    let mut conn = manager(&bus).await;
    bus.fail_next(Side::Left, 1, SimFailure::Drop);

    let outcome = write_channel_on_both(&mut conn).await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts_left(), 1);
    assert_eq!(bus.connects(Side::Left), 2);
    assert_eq!(bus.connects(Side::Right), 1);
    assert!(conn.is_connected(Side::Left));
}

#[tokio::test(start_paused = true)]
async fn timeouts_count_as_failed_attempts() {
    let bus = SimBus::new(&config());
    let mut conn = manager(&bus).await;
    bus.fail_next(Side::Left, 1, SimFailure::Timeout);
    bus.fail_next(Side::Right, 1, SimFailure::Timeout);

    let op = PairedOp::both(RegisterOp::Read {
        addr: common::STATUS,
        count: 1,
    });
    let outcome = execute_paired(&mut conn, "read_status", &op, &command_policy()).await;

    assert_eq!((outcome.attempts_left(), outcome.attempts_right()), (1, 1));
    let replies = outcome.into_result().unwrap();
    assert_eq!(replies.left, RegisterReply::Words(vec![0]));
}

#[tokio::test(start_paused = true)]
async fn per_side_operations_are_routed() {
    let bus = SimBus::new(&config());
    let mut conn = manager(&bus).await;

    let op = PairedOp {
        left: RegisterOp::WriteSingle { addr: 10, value: 1 },
        right: RegisterOp::WritePair {
            addr: 20,
            low: 3,
            high: 4,
        },
    };
    let outcome = execute_paired(&mut conn, "custom", &op, &command_policy()).await;

    assert!(outcome.is_success());
    assert_eq!(bus.writes(Side::Left), vec![(10, 1)]);
    assert_eq!(bus.writes(Side::Right), vec![(20, 3), (21, 4)]);
}
