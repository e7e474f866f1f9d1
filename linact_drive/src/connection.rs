//! Connection manager: owns the left and right sessions.
//!
//! Both sessions are opened concurrently and independently. A side that
//! fails its attempt budget does not prevent the other from connecting, but
//! `connect()` only succeeds when both are up.

use crate::error::{ConnectError, TransportError};
use crate::session::{ActuatorSession, TidWindow};
use crate::transport::Connector;
use linact_common::config::{BusConfig, DriveConfig};
use linact_common::side::{Side, SidePair};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Owns both actuator sessions and the connector that opens them.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    bus: BusConfig,
    sessions: SidePair<ActuatorSession<C::Transport>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Build from configuration with the given TID window.
    ///
    /// Nothing is opened until [`connect`](Self::connect).
    pub fn new(config: &DriveConfig, connector: C, tids: TidWindow) -> Self {
        let unit = config.bus.slave_id;
        let sessions = SidePair::new(
            ActuatorSession::new(Side::Left, config.left.clone(), unit, tids),
            ActuatorSession::new(Side::Right, config.right.clone(), unit, tids),
        );
        Self {
            connector,
            bus: config.bus.clone(),
            sessions,
        }
    }

    /// Open both sessions concurrently, each within its own attempt budget.
    ///
    /// Already connected sessions are left alone.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        let attempts = self.bus.connect_attempts;
        let (left_ok, right_ok) = tokio::join!(
            open_session(&self.connector, &self.bus, &mut self.sessions.left),
            open_session(&self.connector, &self.bus, &mut self.sessions.right),
        );
        match (left_ok, right_ok) {
            (true, true) => {
                info!("Both drives connected");
                Ok(())
            }
            (false, true) => {
                warn!(attempts, "Connection failed: left down, right up");
                Err(ConnectError::Left { attempts })
            }
            (true, false) => {
                warn!(attempts, "Connection failed: left up, right down");
                Err(ConnectError::Right { attempts })
            }
            (false, false) => {
                warn!(attempts, "Connection failed on both drives");
                Err(ConnectError::Both { attempts })
            }
        }
    }

    /// Whether `side` has a usable session.
    pub fn is_connected(&self, side: Side) -> bool {
        self.sessions.get(side).is_connected()
    }

    /// Drop and reopen the session on `side`.
    pub async fn reconnect(&mut self, side: Side) -> Result<(), ConnectError> {
        info!(%side, "Reconnecting");
        let session = self.sessions.get_mut(side);
        session.close().await;
        if open_session(&self.connector, &self.bus, session).await {
            Ok(())
        } else {
            let attempts = self.bus.connect_attempts;
            Err(match side {
                Side::Left => ConnectError::Left { attempts },
                Side::Right => ConnectError::Right { attempts },
            })
        }
    }

    /// Close both sessions. Never fails; safe to call repeatedly.
    pub async fn cleanup(&mut self) {
        let SidePair { left, right } = &mut self.sessions;
        tokio::join!(left.close(), right.close());
        debug!("Sessions closed");
    }

    /// Both sessions, for concurrent issue.
    pub fn sessions_mut(
        &mut self,
    ) -> (
        &mut ActuatorSession<C::Transport>,
        &mut ActuatorSession<C::Transport>,
    ) {
        let SidePair { left, right } = &mut self.sessions;
        (left, right)
    }
}

/// Try to open `session` up to `connect_attempts` times. Returns success.
async fn open_session<C: Connector>(
    connector: &C,
    bus: &BusConfig,
    session: &mut ActuatorSession<C::Transport>,
) -> bool {
    if session.is_connected() {
        return true;
    }
    let side = session.side();
    let limit = bus.request_timeout();
    for attempt in 1..=bus.connect_attempts {
        let result = match timeout(limit, connector.connect(side, session.endpoint(), bus)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(limit)),
        };
        match result {
            Ok(transport) => {
                session.attach(transport);
                debug!(%side, attempt, "Connected");
                return true;
            }
            Err(e) => {
                debug!(%side, attempt, "Connection attempt failed: {e}");
            }
        }
    }
    false
}
