//! Transport seam between the coordination core and the field bus.
//!
//! [`RegisterTransport`] is one open session to one drive. [`Connector`]
//! opens sessions. The Modbus TCP implementation lives in [`crate::tcp`],
//! the in-process simulation in [`crate::sim`].

use crate::error::TransportError;
use linact_common::config::{BusConfig, Endpoint};
use linact_common::side::Side;
use std::future::Future;

/// One open register session.
pub trait RegisterTransport: Send {
    /// Read `count` holding registers starting at `addr`.
    fn read_holding_registers(
        &mut self,
        addr: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, TransportError>> + Send;

    /// Write one holding register.
    fn write_single_register(
        &mut self,
        addr: u16,
        value: u16,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Write consecutive holding registers starting at `addr`.
    fn write_multiple_registers(
        &mut self,
        addr: u16,
        values: &[u16],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Whether the session is still usable.
    fn is_connected(&self) -> bool;

    /// Close the session.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Opens sessions to drives.
pub trait Connector: Send + Sync {
    /// Session type produced.
    type Transport: RegisterTransport;

    /// Open one session to the drive on `side`.
    fn connect(
        &self,
        side: Side,
        endpoint: &Endpoint,
        bus: &BusConfig,
    ) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// A single register operation, as issued to one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOp {
    /// Write one register.
    WriteSingle {
        /// Register address.
        addr: u16,
        /// Value.
        value: u16,
    },
    /// Write two consecutive registers, low word at `addr`.
    WritePair {
        /// Address of the low word.
        addr: u16,
        /// Low word.
        low: u16,
        /// High word, at `addr + 1`.
        high: u16,
    },
    /// Read a block of registers.
    Read {
        /// First register address.
        addr: u16,
        /// Number of registers.
        count: u16,
    },
}

/// Successful reply to a [`RegisterOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterReply {
    /// Write acknowledged.
    Written,
    /// Registers read.
    Words(Vec<u16>),
}

impl RegisterReply {
    /// First word of a read reply.
    pub fn first_word(&self) -> Option<u16> {
        match self {
            Self::Words(words) => words.first().copied(),
            Self::Written => None,
        }
    }

    /// All words of a read reply.
    pub fn words(&self) -> &[u16] {
        match self {
            Self::Words(words) => words,
            Self::Written => &[],
        }
    }
}

impl RegisterOp {
    /// Issue the operation on `transport`.
    ///
    /// A read reply with fewer words than requested is `Malformed`.
    pub async fn execute<T: RegisterTransport>(
        &self,
        transport: &mut T,
    ) -> Result<RegisterReply, TransportError> {
        match *self {
            Self::WriteSingle { addr, value } => {
                transport.write_single_register(addr, value).await?;
                Ok(RegisterReply::Written)
            }
            Self::WritePair { addr, low, high } => {
                transport
                    .write_multiple_registers(addr, &[low, high])
                    .await?;
                Ok(RegisterReply::Written)
            }
            Self::Read { addr, count } => {
                let words = transport.read_holding_registers(addr, count).await?;
                if words.len() < usize::from(count) {
                    return Err(TransportError::Malformed(format!(
                        "read of {count} registers at {addr} returned {}",
                        words.len()
                    )));
                }
                Ok(RegisterReply::Words(words))
            }
        }
    }
}
