//! Paired operation executor.
//!
//! Runs one register operation per side, retrying each side independently:
//!
//! ```text
//! round:  issue pending sides concurrently ──► record per-side outcome
//!           ▲                                        │
//!           │   reconnect dropped sides, sleep       │ both done / budget spent
//!           └────────────────────────────────────────┴──► PairedOutcome
//! ```
//!
//! Attempts count failures only: a side that succeeds first time reports
//! zero attempts. The outcome is a success only when both sides succeeded.

use crate::connection::ConnectionManager;
use crate::error::{DriveError, TransportError};
use crate::session::ActuatorSession;
use crate::transport::{Connector, RegisterOp, RegisterReply, RegisterTransport};
use linact_common::config::RetryConfig;
use linact_common::consts::{FAULT_RESET_DELAY_FACTOR, MAX_RETRY_DELAY_S};
use linact_common::side::{Side, SidePair};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Retry budget and delay schedule of a paired operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Failed attempts allowed per side.
    pub max_attempts: u32,
    /// Delay after the first failed round.
    pub base_delay: Duration,
    /// Delay multiplier per further round.
    pub backoff_multiplier: f64,
    /// Extra delay multiplier after a round with a connection-class error.
    pub connection_delay_factor: f64,
}

impl RetryPolicy {
    /// Policy for configuration commands.
    pub fn command(retry: &RetryConfig) -> Self {
        Self {
            max_attempts: retry.command_attempts,
            base_delay: retry.delay(),
            backoff_multiplier: retry.backoff_multiplier,
            connection_delay_factor: retry.connection_delay_factor,
        }
    }

    /// Policy for the stop path and homing commands.
    pub fn stop(retry: &RetryConfig) -> Self {
        Self {
            max_attempts: retry.stop_attempts,
            ..Self::command(retry)
        }
    }

    /// Policy for fault reset: stop budget, tripled delay.
    pub fn fault_reset(retry: &RetryConfig) -> Self {
        let stop = Self::stop(retry);
        Self {
            base_delay: stop.base_delay * FAULT_RESET_DELAY_FACTOR,
            ..stop
        }
    }

    /// Delay before the round following `round` (0-based), capped at
    /// [`MAX_RETRY_DELAY_S`].
    pub fn delay_after(&self, round: u32, saw_connection_error: bool) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(round).unwrap_or(i32::MAX);
        let mut factor = self.backoff_multiplier.powi(exponent);
        if saw_connection_error {
            factor *= self.connection_delay_factor;
        }
        let cap = Duration::from_secs_f64(MAX_RETRY_DELAY_S);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(cap, |delay| delay.min(cap))
    }
}

/// One operation per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedOp {
    /// Operation for the left session.
    pub left: RegisterOp,
    /// Operation for the right session.
    pub right: RegisterOp,
}

impl PairedOp {
    /// The same operation on both sides.
    pub const fn both(op: RegisterOp) -> Self {
        Self {
            left: op,
            right: op,
        }
    }

    /// Operation for `side`.
    pub const fn get(&self, side: Side) -> RegisterOp {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Per-side result of a paired operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideOutcome {
    /// Failed attempts.
    pub attempts: u32,
    /// Reply, if the side succeeded.
    pub reply: Option<RegisterReply>,
    /// Most recent failure.
    pub last_error: Option<TransportError>,
}

impl SideOutcome {
    /// Whether the side succeeded.
    pub fn succeeded(&self) -> bool {
        self.reply.is_some()
    }

    fn pending(&self, max_attempts: u32) -> bool {
        self.reply.is_none() && self.attempts < max_attempts
    }
}

/// Result of a paired operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedOutcome {
    /// Operation name, for errors and logs.
    pub operation: &'static str,
    /// Per-side outcomes.
    pub sides: SidePair<SideOutcome>,
}

impl PairedOutcome {
    /// Both sides succeeded.
    pub fn is_success(&self) -> bool {
        self.sides.left.succeeded() && self.sides.right.succeeded()
    }

    /// Failed attempts on the left.
    pub fn attempts_left(&self) -> u32 {
        self.sides.left.attempts
    }

    /// Failed attempts on the right.
    pub fn attempts_right(&self) -> u32 {
        self.sides.right.attempts
    }

    /// Both replies, or `OperationFailed` carrying the attempt counts.
    pub fn into_result(self) -> Result<SidePair<RegisterReply>, DriveError> {
        let SidePair { left, right } = self.sides;
        match (left.reply, right.reply) {
            (Some(l), Some(r)) => Ok(SidePair::new(l, r)),
            (l, _) => {
                let last_error = if l.is_none() {
                    left.last_error.or(right.last_error)
                } else {
                    right.last_error.or(left.last_error)
                };
                Err(DriveError::OperationFailed {
                    operation: self.operation,
                    left_attempts: left.attempts,
                    right_attempts: right.attempts,
                    last_error: last_error.unwrap_or(TransportError::Disconnected),
                })
            }
        }
    }
}

async fn issue<T: RegisterTransport>(
    session: &mut ActuatorSession<T>,
    op: RegisterOp,
    pending: bool,
) -> Option<Result<RegisterReply, TransportError>> {
    if pending {
        Some(session.execute(&op).await)
    } else {
        None
    }
}

/// Execute `op` on both sides under `policy`.
///
/// Never returns early on a one-sided success: the outcome reports both
/// sides so the caller sees which drive failed.
pub async fn execute_paired<C: Connector>(
    conn: &mut ConnectionManager<C>,
    operation: &'static str,
    op: &PairedOp,
    policy: &RetryPolicy,
) -> PairedOutcome {
    let mut sides: SidePair<SideOutcome> = SidePair::default();
    let max = policy.max_attempts;
    let mut round = 0u32;

    loop {
        let pending = SidePair::new(sides.left.pending(max), sides.right.pending(max));
        if !pending.left && !pending.right {
            break;
        }

        let (left_session, right_session) = conn.sessions_mut();
        let (left_result, right_result) = tokio::join!(
            issue(left_session, op.left, pending.left),
            issue(right_session, op.right, pending.right),
        );

        let mut saw_connection_error = false;
        for (side, result) in [(Side::Left, left_result), (Side::Right, right_result)] {
            let Some(result) = result else { continue };
            let outcome = sides.get_mut(side);
            match result {
                Ok(reply) => {
                    debug!(%side, operation, "Succeeded");
                    outcome.reply = Some(reply);
                }
                Err(e) => {
                    outcome.attempts += 1;
                    if e.is_connection_class() {
                        saw_connection_error = true;
                        warn!(
                            %side, operation,
                            "Connection error (attempt {}/{max}): {e}", outcome.attempts
                        );
                    } else {
                        warn!(
                            %side, operation,
                            "Drive rejected request (attempt {}/{max}): {e}", outcome.attempts
                        );
                    }
                    outcome.last_error = Some(e);
                }
            }
        }

        let still_pending: Vec<Side> = Side::BOTH
            .into_iter()
            .filter(|side| sides.get(*side).pending(max))
            .collect();
        if still_pending.is_empty() {
            break;
        }

        for side in still_pending {
            if !conn.is_connected(side) {
                if let Err(e) = conn.reconnect(side).await {
                    warn!(%side, operation, "Reconnect failed: {e}");
                }
            }
        }

        let delay = policy.delay_after(round, saw_connection_error);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        round += 1;
    }

    let outcome = PairedOutcome { operation, sides };
    if !outcome.is_success() {
        error!(
            operation,
            left_attempts = outcome.attempts_left(),
            right_attempts = outcome.attempts_right(),
            "Operation failed on at least one drive"
        );
    }
    outcome
}
