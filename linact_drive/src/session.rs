//! Actuator sessions and transaction id windows.

use crate::error::TransportError;
use crate::transport::{RegisterOp, RegisterReply, RegisterTransport};
use linact_common::config::Endpoint;
use linact_common::side::Side;
use tracing::{debug, warn};

/// Transaction id counter wrapping within `[start, last)`.
///
/// Separate processes talking to the same drives use disjoint windows so
/// their requests can be told apart in logs and captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TidWindow {
    start: u16,
    last: u16,
    next: u16,
}

impl TidWindow {
    /// Window `[start, last)`. An empty window degenerates to `start` only.
    pub const fn new(start: u16, last: u16) -> Self {
        let last = if last > start {
            last
        } else {
            start.saturating_add(1)
        };
        Self {
            start,
            last,
            next: start,
        }
    }

    /// Take the next transaction id.
    pub fn next_tid(&mut self) -> u16 {
        let tid = self.next;
        self.next = tid
            .checked_add(1)
            .filter(|n| *n < self.last)
            .unwrap_or(self.start);
        tid
    }

    /// Window start (inclusive).
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Window end (exclusive).
    pub const fn last(&self) -> u16 {
        self.last
    }
}

/// One side's session: transport handle, unit id and TID counter.
pub struct ActuatorSession<T> {
    side: Side,
    endpoint: Endpoint,
    unit: u8,
    tids: TidWindow,
    transport: Option<T>,
}

impl<T: RegisterTransport> ActuatorSession<T> {
    /// A closed session.
    pub fn new(side: Side, endpoint: Endpoint, unit: u8, tids: TidWindow) -> Self {
        Self {
            side,
            endpoint,
            unit,
            tids,
            transport: None,
        }
    }

    /// Side this session talks to.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Drive endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Slave/unit id.
    pub fn unit(&self) -> u8 {
        self.unit
    }

    /// Whether a usable transport is attached.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Attach a freshly opened transport.
    pub fn attach(&mut self, transport: T) {
        self.transport = Some(transport);
    }

    /// Issue one operation, tagging it with the next transaction id.
    pub async fn execute(&mut self, op: &RegisterOp) -> Result<RegisterReply, TransportError> {
        let tid = self.tids.next_tid();
        let side = self.side;
        let Some(transport) = self.transport.as_mut() else {
            debug!(%side, tid, ?op, "Request on closed session");
            return Err(TransportError::Disconnected);
        };
        debug!(%side, tid, unit = self.unit, ?op, "Request");
        let result = op.execute(transport).await;
        if let Err(ref e) = result {
            debug!(%side, tid, error = %e, "Request failed");
        }
        result
    }

    /// Close and drop the transport. Errors are logged, never returned.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!(side = %self.side, "Error closing session: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_wraps_within_window() {
        let mut tids = TidWindow::new(10, 13);
        let seen: Vec<u16> = (0..7).map(|_| tids.next_tid()).collect();
        assert_eq!(seen, vec![10, 11, 12, 10, 11, 12, 10]);
    }

    #[test]
    fn tid_window_at_top_of_range() {
        let mut tids = TidWindow::new(u16::MAX - 1, u16::MAX);
        assert_eq!(tids.next_tid(), u16::MAX - 1);
        assert_eq!(tids.next_tid(), u16::MAX - 1);
    }

    #[test]
    fn degenerate_window() {
        let mut tids = TidWindow::new(5, 5);
        assert_eq!(tids.last(), 6);
        assert_eq!(tids.next_tid(), 5);
        assert_eq!(tids.next_tid(), 5);
    }
}
