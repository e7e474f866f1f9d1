//! Modbus TCP transport built on `tokio-modbus`.
//!
//! Every request is bounded by the configured request timeout. Transport
//! failures mark the session disconnected so the executor reconnects it;
//! drive exceptions leave the session usable.

use crate::error::TransportError;
use crate::transport::{Connector, RegisterTransport};
use linact_common::config::{BusConfig, Endpoint};
use linact_common::side::Side;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use tokio_modbus::Slave;
use tokio_modbus::client::{Client as _, Context, Reader as _, Writer as _, tcp};
use tracing::debug;

/// One Modbus TCP session.
pub struct TcpTransport {
    side: Side,
    ctx: Context,
    request_timeout: Duration,
    connected: bool,
}

impl TcpTransport {
    /// Map the nested `tokio-modbus` result and update connectivity.
    fn settle<T>(
        &mut self,
        result: Result<tokio_modbus::Result<T>, tokio::time::error::Elapsed>,
    ) -> Result<T, TransportError> {
        match result {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(exception))) => Err(TransportError::Exception(format!("{exception:?}"))),
            Ok(Err(e)) => {
                self.connected = false;
                Err(TransportError::Io(e.to_string()))
            }
            Err(_) => {
                self.connected = false;
                Err(TransportError::Timeout(self.request_timeout))
            }
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

impl RegisterTransport for TcpTransport {
    async fn read_holding_registers(
        &mut self,
        addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.ensure_open()?;
        let result = timeout(
            self.request_timeout,
            self.ctx.read_holding_registers(addr, count),
        )
        .await;
        self.settle(result)
    }

    async fn write_single_register(&mut self, addr: u16, value: u16) -> Result<(), TransportError> {
        self.ensure_open()?;
        let result = timeout(
            self.request_timeout,
            self.ctx.write_single_register(addr, value),
        )
        .await;
        self.settle(result)
    }

    async fn write_multiple_registers(
        &mut self,
        addr: u16,
        values: &[u16],
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let result = timeout(
            self.request_timeout,
            self.ctx.write_multiple_registers(addr, values),
        )
        .await;
        self.settle(result)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        debug!(side = %self.side, "Closing Modbus TCP session");
        match timeout(self.request_timeout, self.ctx.disconnect()).await {
            Ok(result) => result
                .map(|_| ())
                .map_err(|e| TransportError::Io(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.request_timeout)),
        }
    }
}

/// Opens [`TcpTransport`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, TransportError> {
    let authority = endpoint.authority();
    tokio::net::lookup_host(authority.as_str())
        .await
        .map_err(|e| TransportError::Io(format!("resolve {authority}: {e}")))?
        .next()
        .ok_or_else(|| TransportError::Io(format!("no address for {authority}")))
}

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(
        &self,
        side: Side,
        endpoint: &Endpoint,
        bus: &BusConfig,
    ) -> impl Future<Output = Result<TcpTransport, TransportError>> + Send {
        let endpoint = endpoint.clone();
        let request_timeout = bus.request_timeout();
        let slave = Slave(bus.slave_id);
        async move {
            let addr = resolve(&endpoint).await?;
            debug!(%side, %addr, "Opening Modbus TCP session");
            let ctx = match timeout(request_timeout, tcp::connect_slave(addr, slave)).await {
                Ok(Ok(ctx)) => ctx,
                Ok(Err(e)) => return Err(TransportError::Io(e.to_string())),
                Err(_) => return Err(TransportError::Timeout(request_timeout)),
            };
            Ok(TcpTransport {
                side,
                ctx,
                request_timeout,
                connected: true,
            })
        }
    }
}
