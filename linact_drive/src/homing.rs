//! Homing state machine.
//!
//! ```text
//! Initiated ──prepare(0)+home(256)──► Commanded ──► Polling ──┬──► Homed
//!     │                                                       ├──► TimedOut
//!     └──────────── command failed on either side ──────────► Failed
//! ```
//!
//! | Phase    | Work                                     | Bound                 |
//! |----------|------------------------------------------|-----------------------|
//! | Commands | motion `0` then `256` through executor   | retry policy          |
//! | Polling  | status read on both sides per tick       | timeout (default 30 s)|
//!
//! Which session carries each actuator's command, and at which register, is
//! an explicit [`HomingPlan`] built from `[homing]`.

use crate::connection::ConnectionManager;
use crate::paired::{PairedOp, RetryPolicy, execute_paired};
use crate::transport::{Connector, RegisterOp, RegisterReply};
use linact_common::config::{HomingConfig, HomingWiring};
use linact_common::consts::{MOTION_PREPARE, MOTION_START_HOMING};
use linact_common::side::{Side, SidePair};
use linact_common::status::DriveStatus;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Homing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HomingState {
    /// Not yet commanded.
    Initiated,
    /// Both drives accepted the homing command.
    Commanded,
    /// Waiting for both status words to report homed.
    Polling,
    /// Both drives homed in the same tick.
    Homed,
    /// Timeout elapsed before both were homed.
    TimedOut,
    /// A homing command did not land.
    Failed,
}

/// Terminal result of a homing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum HomingOutcome {
    /// Both drives homed.
    Homed {
        /// Time since `Commanded`.
        elapsed: Duration,
        /// Status ticks taken.
        polls: u32,
    },
    /// Not both homed within the timeout.
    TimedOut {
        /// Time since `Commanded`.
        elapsed: Duration,
        /// Status ticks taken.
        polls: u32,
    },
    /// A command phase failed.
    Failed {
        /// Reason, including per-side attempts.
        reason: String,
    },
}

impl HomingOutcome {
    /// Whether the drives are now homed.
    pub fn is_homed(&self) -> bool {
        matches!(self, Self::Homed { .. })
    }

    /// Terminal state this outcome corresponds to.
    pub fn state(&self) -> HomingState {
        match self {
            Self::Homed { .. } => HomingState::Homed,
            Self::TimedOut { .. } => HomingState::TimedOut,
            Self::Failed { .. } => HomingState::Failed,
        }
    }
}

/// Resolved actuator → (session, command register) mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingPlan {
    routes: SidePair<(Side, u16)>,
}

impl HomingPlan {
    /// Build from `[homing]` and the default motion command register.
    pub fn new(homing: &HomingConfig, motion_command: u16) -> Self {
        let route = |actuator: Side| {
            (
                homing.wiring.session_for(actuator),
                homing.command_register(actuator, motion_command),
            )
        };
        Self {
            routes: SidePair::new(route(Side::Left), route(Side::Right)),
        }
    }

    /// Same wiring for both actuators on `motion_command`.
    pub fn with_wiring(wiring: HomingWiring, motion_command: u16) -> Self {
        Self::new(
            &HomingConfig {
                wiring,
                ..HomingConfig::default()
            },
            motion_command,
        )
    }

    /// Session and register carrying `actuator`'s command.
    pub fn route(&self, actuator: Side) -> (Side, u16) {
        *self.routes.get(actuator)
    }

    /// Paired write of `value`, keyed by session.
    pub fn command_op(&self, value: u16) -> PairedOp {
        let mut op = PairedOp::both(RegisterOp::WriteSingle { addr: 0, value });
        for actuator in Side::BOTH {
            let (session, addr) = self.route(actuator);
            let slot = match session {
                Side::Left => &mut op.left,
                Side::Right => &mut op.right,
            };
            *slot = RegisterOp::WriteSingle { addr, value };
        }
        op
    }
}

/// One homing run.
#[derive(Debug)]
pub struct HomingMachine {
    state: HomingState,
    plan: HomingPlan,
    status_register: u16,
    timeout: Duration,
    poll_interval: Duration,
}

impl HomingMachine {
    /// New machine in `Initiated`.
    pub fn new(
        plan: HomingPlan,
        status_register: u16,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state: HomingState::Initiated,
            plan,
            status_register,
            timeout,
            poll_interval,
        }
    }

    /// Current state.
    pub fn state(&self) -> HomingState {
        self.state
    }

    fn transition(&mut self, next: HomingState) {
        debug!(from = ?self.state, to = ?next, "Homing state");
        self.state = next;
    }

    fn fail(&mut self, reason: String) -> HomingOutcome {
        error!("Homing failed: {reason}");
        self.transition(HomingState::Failed);
        HomingOutcome::Failed { reason }
    }

    /// Run the machine to a terminal state.
    pub async fn run<C: Connector>(
        &mut self,
        conn: &mut ConnectionManager<C>,
        policy: &RetryPolicy,
    ) -> HomingOutcome {
        for (operation, value) in [
            ("homing_prepare", MOTION_PREPARE),
            ("homing_start", MOTION_START_HOMING),
        ] {
            let op = self.plan.command_op(value);
            let outcome = execute_paired(conn, operation, &op, policy).await;
            if !outcome.is_success() {
                let reason = format!(
                    "{operation} not accepted (left {} failed attempts, right {})",
                    outcome.attempts_left(),
                    outcome.attempts_right()
                );
                return self.fail(reason);
            }
        }
        self.transition(HomingState::Commanded);
        let commanded_at = Instant::now();
        info!(timeout = ?self.timeout, "Homing commanded, polling status");

        self.transition(HomingState::Polling);
        let read = RegisterOp::Read {
            addr: self.status_register,
            count: 1,
        };
        let mut polls = 0u32;
        loop {
            polls += 1;
            let (left, right) = conn.sessions_mut();
            let (left_status, right_status) =
                tokio::join!(left.execute(&read), right.execute(&read));

            match (left_status, right_status) {
                (Ok(l), Ok(r)) => {
                    let homed = |reply: &RegisterReply| {
                        reply
                            .first_word()
                            .is_some_and(|w| DriveStatus::from_word(w).is_homed())
                    };
                    let (left_homed, right_homed) = (homed(&l), homed(&r));
                    debug!(polls, left_homed, right_homed, "Homing status");
                    if left_homed && right_homed {
                        let elapsed = commanded_at.elapsed();
                        info!(?elapsed, polls, "Both drives homed");
                        self.transition(HomingState::Homed);
                        return HomingOutcome::Homed { elapsed, polls };
                    }
                }
                (l, r) => {
                    for (side, result) in [(Side::Left, l), (Side::Right, r)] {
                        if let Err(e) = result {
                            warn!(%side, polls, "Status read failed during homing: {e}");
                            if e.is_connection_class() && !conn.is_connected(side) {
                                if let Err(e) = conn.reconnect(side).await {
                                    warn!(%side, "Reconnect failed: {e}");
                                }
                            }
                        }
                    }
                }
            }

            let elapsed = commanded_at.elapsed();
            if elapsed >= self.timeout {
                error!(?elapsed, polls, "Drives not homed within {:?}", self.timeout);
                self.transition(HomingState::TimedOut);
                return HomingOutcome::TimedOut { elapsed, polls };
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_plan_keeps_sides() {
        let plan = HomingPlan::with_wiring(HomingWiring::Straight, 4316);
        assert_eq!(plan.route(Side::Left), (Side::Left, 4316));
        let op = plan.command_op(MOTION_START_HOMING);
        assert_eq!(
            op.left,
            RegisterOp::WriteSingle {
                addr: 4316,
                value: 256
            }
        );
    }

    #[test]
    fn crossed_plan_swaps_sessions_and_registers() {
        let homing = HomingConfig {
            wiring: HomingWiring::Crossed,
            command_register_left: Some(100),
            command_register_right: Some(200),
            ..HomingConfig::default()
        };
        let plan = HomingPlan::new(&homing, 4316);
        assert_eq!(plan.route(Side::Left), (Side::Right, 100));
        assert_eq!(plan.route(Side::Right), (Side::Left, 200));

        let op = plan.command_op(MOTION_PREPARE);
        assert_eq!(
            op.left,
            RegisterOp::WriteSingle {
                addr: 200,
                value: 0
            }
        );
        assert_eq!(
            op.right,
            RegisterOp::WriteSingle {
                addr: 100,
                value: 0
            }
        );
    }

    #[test]
    fn outcome_states() {
        let homed = HomingOutcome::Homed {
            elapsed: Duration::ZERO,
            polls: 1,
        };
        assert!(homed.is_homed());
        assert_eq!(homed.state(), HomingState::Homed);
        let failed = HomingOutcome::Failed {
            reason: "x".into(),
        };
        assert_eq!(failed.state(), HomingState::Failed);
    }
}
