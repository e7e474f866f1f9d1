//! Simulated drive pair.
//!
//! An in-process register model of both drives behind the same
//! [`Connector`]/[`RegisterTransport`] seam as the TCP transport. Used by the
//! integration tests and by `linact --simulate`.
//!
//! | Behaviour          | Trigger                                          |
//! |--------------------|--------------------------------------------------|
//! | homing             | `256` written to a homing command register       |
//! | homed bit          | set after the configured number of status reads  |
//! | fault              | [`SimBus::raise_fault`]                          |
//! | fault cleared      | mode word with the fault-reset bit written       |
//! | connect failure    | [`SimBus::fail_connects`], [`SimBus::set_unreachable`] |
//! | request failure    | [`SimBus::fail_next`], [`SimBus::fail_always`]   |

use crate::error::TransportError;
use crate::transport::{Connector, RegisterTransport};
use linact_common::codec::encode_revolutions;
use linact_common::config::{BusConfig, DriveConfig, Endpoint};
use linact_common::consts::{MOTION_PREPARE, MOTION_START_HOMING, MOTION_STOP};
use linact_common::side::{Side, SidePair};
use linact_common::status::DriveStatus;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Failure injected into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFailure {
    /// Drive answers with a protocol exception.
    Exception,
    /// No answer within the request timeout.
    Timeout,
    /// Connection drops; the session must be reopened.
    Drop,
}

/// Register addresses the simulation reacts to.
#[derive(Debug, Clone)]
struct SimMap {
    status: u16,
    homing_commands: Vec<u16>,
    ieg_mode: u16,
    recent_fault: u16,
    position_feedback: u16,
    fault_reset_mask: u16,
}

#[derive(Debug, Default)]
struct SimDrive {
    registers: HashMap<u16, u16>,
    connected: bool,
    unreachable: bool,
    connect_failures: u32,
    connects: u32,
    failures: VecDeque<SimFailure>,
    fail_always: Option<SimFailure>,
    homes_after: Option<u32>,
    homing_countdown: Option<u32>,
    stops: u32,
    writes: Vec<(u16, u16)>,
}

impl SimDrive {
    fn register(&self, addr: u16) -> u16 {
        self.registers.get(&addr).copied().unwrap_or_default()
    }

    fn update_status(&mut self, map: &SimMap, f: impl FnOnce(&mut DriveStatus)) {
        let mut status = DriveStatus::from_word(self.register(map.status));
        f(&mut status);
        self.registers.insert(map.status, status.bits());
    }

    fn injected_failure(&mut self) -> Option<TransportError> {
        let failure = self.failures.pop_front().or(self.fail_always)?;
        Some(match failure {
            SimFailure::Exception => TransportError::Exception("SlaveDeviceBusy".to_string()),
            SimFailure::Timeout => TransportError::Timeout(Duration::from_secs(1)),
            SimFailure::Drop => {
                self.connected = false;
                TransportError::Io("connection reset by peer".to_string())
            }
        })
    }

    fn read(&mut self, map: &SimMap, addr: u16, count: u16) -> Vec<u16> {
        if addr == map.status {
            if let Some(remaining) = self.homing_countdown {
                if remaining == 0 {
                    self.homing_countdown = None;
                    self.update_status(map, |s| s.insert(DriveStatus::HOMED));
                } else {
                    self.homing_countdown = Some(remaining - 1);
                }
            }
        }
        (0..count)
            .map(|i| self.register(addr.wrapping_add(i)))
            .collect()
    }

    fn write(&mut self, map: &SimMap, addr: u16, value: u16) {
        self.writes.push((addr, value));
        self.registers.insert(addr, value);

        if map.homing_commands.contains(&addr) {
            match value {
                MOTION_PREPARE => {
                    self.homing_countdown = None;
                    self.update_status(map, |s| s.remove(DriveStatus::HOMED));
                }
                MOTION_START_HOMING => self.homing_countdown = self.homes_after,
                MOTION_STOP => self.stops += 1,
                _ => {}
            }
        }
        if addr == map.ieg_mode && value & map.fault_reset_mask != 0 {
            self.registers.insert(map.recent_fault, 0);
            self.update_status(map, |s| s.remove(DriveStatus::IN_FAULT));
        }
    }
}

#[derive(Debug)]
struct SimState {
    map: SimMap,
    drives: SidePair<SimDrive>,
}

/// Shared handle to the simulated drive pair.
#[derive(Debug, Clone)]
pub struct SimBus {
    inner: Arc<Mutex<SimState>>,
}

impl SimBus {
    /// Drive pair matching `config`'s register map. Both drives home on the
    /// first status read after the homing command.
    pub fn new(config: &DriveConfig) -> Self {
        let regs = &config.registers;
        let mut homing_commands = vec![regs.motion_command];
        homing_commands.extend(config.homing.command_register_left);
        homing_commands.extend(config.homing.command_register_right);
        let map = SimMap {
            status: regs.status,
            homing_commands,
            ieg_mode: regs.ieg_mode,
            recent_fault: regs.recent_fault,
            position_feedback: regs.position_feedback,
            fault_reset_mask: 1u16
                .checked_shl(u32::from(config.mode.fault_reset))
                .unwrap_or(0),
        };
        let drive = || SimDrive {
            homes_after: Some(0),
            ..SimDrive::default()
        };
        Self {
            inner: Arc::new(Mutex::new(SimState {
                map,
                drives: SidePair::new(drive(), drive()),
            })),
        }
    }

    /// Connector opening sessions on this bus.
    pub fn connector(&self) -> SimConnector {
        SimConnector { bus: self.clone() }
    }

    fn with_drive<R>(&self, side: Side, f: impl FnOnce(&mut SimDrive, &SimMap) -> R) -> R {
        let mut state = self.inner.lock();
        let SimState { map, drives } = &mut *state;
        f(drives.get_mut(side), map)
    }

    /// Refuse every connect on `side` while set.
    pub fn set_unreachable(&self, side: Side, unreachable: bool) {
        self.with_drive(side, |d, _| d.unreachable = unreachable);
    }

    /// Fail the next `n` connects on `side`.
    pub fn fail_connects(&self, side: Side, n: u32) {
        self.with_drive(side, |d, _| d.connect_failures = n);
    }

    /// Fail the next `n` requests on `side`.
    pub fn fail_next(&self, side: Side, n: u32, failure: SimFailure) {
        self.with_drive(side, |d, _| {
            d.failures.extend((0..n).map(|_| failure))
        });
    }

    /// Fail every request on `side` (`None` restores normal operation).
    pub fn fail_always(&self, side: Side, failure: Option<SimFailure>) {
        self.with_drive(side, |d, _| d.fail_always = failure);
    }

    /// Status reads after the homing command before the homed bit appears.
    /// `None` never homes.
    pub fn set_homing_after(&self, side: Side, polls: Option<u32>) {
        self.with_drive(side, |d, _| d.homes_after = polls);
    }

    /// Put a fault code on `side` and set its in-fault bit.
    pub fn raise_fault(&self, side: Side, code: u16) {
        self.with_drive(side, |d, map| {
            d.registers.insert(map.recent_fault, code);
            d.update_status(map, |s| s.insert(DriveStatus::IN_FAULT));
        });
    }

    /// Set position feedback on `side`, in revolutions.
    pub fn set_position(&self, side: Side, revs: f64) {
        let (low, high) = encode_revolutions(revs).unwrap_or_default();
        self.with_drive(side, |d, map| {
            d.registers.insert(map.position_feedback, low);
            d.registers
                .insert(map.position_feedback.wrapping_add(1), high);
        });
    }

    /// Set any register on `side`.
    pub fn set_register(&self, side: Side, addr: u16, value: u16) {
        self.with_drive(side, |d, _| {
            d.registers.insert(addr, value);
        });
    }

    /// Current value of a register on `side`.
    pub fn register(&self, side: Side, addr: u16) -> u16 {
        self.with_drive(side, |d, _| d.register(addr))
    }

    /// Drop the connection on `side` as if the peer reset it.
    pub fn drop_connection(&self, side: Side) {
        self.with_drive(side, |d, _| d.connected = false);
    }

    /// Whether `side` currently has an open connection.
    pub fn is_connected(&self, side: Side) -> bool {
        self.with_drive(side, |d, _| d.connected)
    }

    /// Successful connects on `side`.
    pub fn connects(&self, side: Side) -> u32 {
        self.with_drive(side, |d, _| d.connects)
    }

    /// Stop commands received on `side`.
    pub fn stops(&self, side: Side) -> u32 {
        self.with_drive(side, |d, _| d.stops)
    }

    /// Every `(address, value)` written to `side`, in order.
    pub fn writes(&self, side: Side) -> Vec<(u16, u16)> {
        self.with_drive(side, |d, _| d.writes.clone())
    }

    /// Values written to `addr` on `side`, in order.
    pub fn writes_to(&self, side: Side, addr: u16) -> Vec<u16> {
        self.with_drive(side, |d, _| {
            d.writes
                .iter()
                .filter(|(a, _)| *a == addr)
                .map(|(_, v)| *v)
                .collect()
        })
    }
}

/// Session on a [`SimBus`].
#[derive(Debug)]
pub struct SimTransport {
    side: Side,
    bus: SimBus,
    open: bool,
}

impl SimTransport {
    fn request<R>(
        &mut self,
        f: impl FnOnce(&mut SimDrive, &SimMap) -> R,
    ) -> Result<R, TransportError> {
        if !self.open {
            return Err(TransportError::Disconnected);
        }
        self.bus.with_drive(self.side, |drive, map| {
            if !drive.connected {
                return Err(TransportError::Disconnected);
            }
            if let Some(e) = drive.injected_failure() {
                return Err(e);
            }
            Ok(f(drive, map))
        })
    }
}

impl RegisterTransport for SimTransport {
    async fn read_holding_registers(
        &mut self,
        addr: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        trace!(side = %self.side, addr, count, "sim read");
        self.request(|drive, map| drive.read(map, addr, count))
    }

    async fn write_single_register(&mut self, addr: u16, value: u16) -> Result<(), TransportError> {
        trace!(side = %self.side, addr, value, "sim write");
        self.request(|drive, map| drive.write(map, addr, value))
    }

    async fn write_multiple_registers(
        &mut self,
        addr: u16,
        values: &[u16],
    ) -> Result<(), TransportError> {
        trace!(side = %self.side, addr, ?values, "sim write block");
        self.request(|drive, map| {
            for (offset, value) in (0u16..).zip(values) {
                drive.write(map, addr.wrapping_add(offset), *value);
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.open && self.bus.is_connected(self.side)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.open {
            self.open = false;
            self.bus.drop_connection(self.side);
        }
        Ok(())
    }
}

/// Opens [`SimTransport`] sessions.
#[derive(Debug, Clone)]
pub struct SimConnector {
    bus: SimBus,
}

impl Connector for SimConnector {
    type Transport = SimTransport;

    async fn connect(
        &self,
        side: Side,
        _endpoint: &Endpoint,
        _bus: &BusConfig,
    ) -> Result<SimTransport, TransportError> {
        self.bus.with_drive(side, |drive, _| {
            if drive.unreachable {
                return Err(TransportError::Io("connection refused".to_string()));
            }
            if drive.connect_failures > 0 {
                drive.connect_failures -= 1;
                return Err(TransportError::Io("connection refused".to_string()));
            }
            drive.connected = true;
            drive.connects += 1;
            Ok(())
        })?;
        Ok(SimTransport {
            side,
            bus: self.bus.clone(),
            open: true,
        })
    }
}
