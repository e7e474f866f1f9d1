//! Fault monitor: status check, fault code classification and reset.
//!
//! A poll cycle is:
//!
//! ```text
//! status ──not faulted──► Healthy
//!    │
//!    └─faulted──► read codes ──any critical──► Critical (no reset)
//!                     │
//!                     └─recoverable──► fault reset (default profile) ──► Reset
//! ```

use crate::connection::ConnectionManager;
use crate::error::{CriticalFailure, DriveError};
use crate::paired::{PairedOp, RetryPolicy, execute_paired};
use crate::transport::{Connector, RegisterOp, RegisterReply};
use linact_common::mode::{ModeGuard, ModeProfile};
use linact_common::side::SidePair;
use linact_common::status::{DriveStatus, FaultClass, FaultPolicy};
use serde::Serialize;
use tracing::{error, info, warn};

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum FaultCycle {
    /// Neither drive reports a fault.
    Healthy,
    /// Recoverable faults were reset.
    Reset {
        /// Fault codes read before the reset.
        codes: SidePair<u16>,
    },
    /// At least one critical fault; nothing was reset.
    Critical {
        /// Fault codes read.
        codes: SidePair<u16>,
    },
}

impl FaultCycle {
    /// The operator-facing failure of a `Critical` cycle.
    pub fn critical_failure(&self) -> Option<CriticalFailure> {
        match *self {
            Self::Critical { codes } => Some(CriticalFailure::CriticalFault {
                left: codes.left,
                right: codes.right,
            }),
            Self::Healthy | Self::Reset { .. } => None,
        }
    }
}

/// Register addresses and policies used by the fault monitor.
#[derive(Debug, Clone, Copy)]
pub struct FaultMonitor {
    /// Status (OEG) register.
    pub status_register: u16,
    /// Recent-fault register.
    pub fault_register: u16,
    /// Mode (IEG) register.
    pub mode_register: u16,
    /// Critical bit mask.
    pub policy: FaultPolicy,
    /// Mode word guard.
    pub guard: ModeGuard,
}

fn first_words(replies: SidePair<RegisterReply>) -> SidePair<u16> {
    replies.map(|_, reply| reply.first_word().unwrap_or_default())
}

impl FaultMonitor {
    /// Raw status words of both drives.
    pub async fn read_status<C: Connector>(
        &self,
        conn: &mut ConnectionManager<C>,
        policy: &RetryPolicy,
    ) -> Result<SidePair<DriveStatus>, DriveError> {
        let op = PairedOp::both(RegisterOp::Read {
            addr: self.status_register,
            count: 1,
        });
        let replies = execute_paired(conn, "read_status", &op, policy)
            .await
            .into_result()?;
        Ok(first_words(replies).map(|_, w| DriveStatus::from_word(w)))
    }

    /// Whether either drive reports "in fault" (status bit 3).
    pub async fn check_fault_status<C: Connector>(
        &self,
        conn: &mut ConnectionManager<C>,
        policy: &RetryPolicy,
    ) -> Result<bool, DriveError> {
        let status = self.read_status(conn, policy).await?;
        Ok(status.left.in_fault() || status.right.in_fault())
    }

    /// Most recent fault code of both drives.
    pub async fn get_recent_fault<C: Connector>(
        &self,
        conn: &mut ConnectionManager<C>,
        policy: &RetryPolicy,
    ) -> Result<SidePair<u16>, DriveError> {
        let op = PairedOp::both(RegisterOp::Read {
            addr: self.fault_register,
            count: 1,
        });
        let replies = execute_paired(conn, "get_recent_fault", &op, policy)
            .await
            .into_result()?;
        Ok(first_words(replies))
    }

    /// Classify one fault code.
    pub fn classify(&self, code: u16) -> FaultClass {
        self.policy.classify(code)
    }

    /// Write the guarded fault-reset word to both mode registers.
    pub async fn fault_reset<C: Connector>(
        &self,
        conn: &mut ConnectionManager<C>,
        profile: ModeProfile,
        policy: &RetryPolicy,
    ) -> Result<(), DriveError> {
        let value = self.guard.reset_word(profile);
        let op = PairedOp::both(RegisterOp::WriteSingle {
            addr: self.mode_register,
            value,
        });
        execute_paired(conn, "fault_reset", &op, policy)
            .await
            .into_result()?;
        info!(%profile, value = format_args!("{value:#06x}"), "Fault reset written");
        Ok(())
    }

    /// One polling step: check, classify, reset recoverable faults.
    pub async fn poll_cycle<C: Connector>(
        &self,
        conn: &mut ConnectionManager<C>,
        read_policy: &RetryPolicy,
        reset_policy: &RetryPolicy,
    ) -> Result<FaultCycle, DriveError> {
        if !self.check_fault_status(conn, read_policy).await? {
            return Ok(FaultCycle::Healthy);
        }
        let codes = self.get_recent_fault(conn, read_policy).await?;
        let classes = codes.map(|_, code| self.classify(code));
        warn!(
            left = format_args!("{:#06x}", codes.left),
            right = format_args!("{:#06x}", codes.right),
            left_class = ?classes.left,
            right_class = ?classes.right,
            "Drive fault detected"
        );

        if classes.left == FaultClass::Critical || classes.right == FaultClass::Critical {
            let cycle = FaultCycle::Critical { codes };
            if let Some(failure) = cycle.critical_failure() {
                error!(
                    critical = true,
                    "{failure}: not resetting, operator action required"
                );
            }
            return Ok(cycle);
        }

        self.fault_reset(conn, ModeProfile::Default, reset_policy)
            .await?;
        Ok(FaultCycle::Reset { codes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_critical_cycles_escalate() {
        let codes = SidePair::new(0x0010, 0x0000);
        assert_eq!(FaultCycle::Healthy.critical_failure(), None);
        assert_eq!(FaultCycle::Reset { codes }.critical_failure(), None);

        let failure = FaultCycle::Critical { codes }.critical_failure();
        assert_eq!(
            failure,
            Some(CriticalFailure::CriticalFault {
                left: 0x0010,
                right: 0x0000,
            })
        );
        assert_eq!(
            failure.map(|f| f.to_string()).as_deref(),
            Some("critical fault (left 0x0010, right 0x0000)")
        );
    }
}
