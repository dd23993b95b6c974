//! In-memory emulation of the random number core.
//!
//! [`DummyPeripheral`] implements [`Transport`] and answers register frames
//! the way the hardware does: MODE reads return the next LFSR or decay
//! sample, DECAY_SEED writes harvest a seed, indicators latch. Every bus
//! operation is recorded so tests can assert on exact traffic, and failures,
//! echo padding and busy responses can be injected. [`DummyDelay`] writes
//! into the same log, so settle delays show up in bus order.
//!
//! The LFSR taps and the decay source here are stand-ins; only the register
//! semantics match the real core.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::delay::Delay;
use crate::protocol::{BUSY_MARKER, FRAME_LEN, OP_READ, OP_WRITE};
use crate::registers::*;
use crate::transport::Transport;
use crate::{Error, Result};

/// One recorded bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Select,
    Deselect,
    Write(Vec<u8>),
    Exchange(Vec<u8>),
    /// Settle delay requested through a [`DummyDelay`].
    Delay(Duration),
}

type EventLog = Rc<RefCell<Vec<BusEvent>>>;

/// Delay provider that records into its peripheral's bus log.
///
/// Created by [`DummyPeripheral::delay_recorder`].
#[derive(Debug, Clone)]
pub struct DummyDelay {
    events: EventLog,
}

impl Delay for DummyDelay {
    fn delay(&mut self, duration: Duration) {
        self.events.borrow_mut().push(BusEvent::Delay(duration));
    }
}

/// Configuration for the dummy peripheral
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Extra bytes clocked back ahead of every exchange response.
    pub echo_padding: usize,
    /// Initial state of the decay entropy source.
    pub entropy: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            echo_padding: 0,
            entropy: 0x2545_F491,
        }
    }
}

/// Emulated peripheral behind a recording bus.
pub struct DummyPeripheral {
    config: DummyConfig,
    selected: bool,
    mode: Mode,
    lfsr: u16,
    polynomial: u16,
    harvested: u16,
    entropy: u32,
    indicators: [bool; 3],
    events: EventLog,
    fail_after: Option<usize>,
    ops: usize,
    busy_reads: u32,
}

impl DummyPeripheral {
    /// Create a peripheral in its power-on state.
    pub fn new() -> Self {
        Self::with_config(DummyConfig::default())
    }

    pub fn with_config(config: DummyConfig) -> Self {
        Self {
            entropy: config.entropy,
            config,
            selected: false,
            mode: Mode::Decay,
            lfsr: 0,
            polynomial: POLY_DEFAULT,
            harvested: 0,
            indicators: [false; 3],
            events: EventLog::default(),
            fail_after: None,
            ops: 0,
            busy_reads: 0,
        }
    }

    /// Fail every select, write and exchange after `n` more successful ones.
    ///
    /// Deselect never fails.
    pub fn fail_after(&mut self, n: usize) {
        self.fail_after = Some(self.ops + n);
    }

    /// Answer the next `n` exchanges with the busy sentinel.
    pub fn inject_busy(&mut self, n: u32) {
        self.busy_reads = n;
    }

    /// Snapshot of the bus log.
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&mut self) {
        self.events.borrow_mut().clear();
    }

    /// Delay provider sharing this peripheral's bus log.
    pub fn delay_recorder(&self) -> DummyDelay {
        DummyDelay {
            events: Rc::clone(&self.events),
        }
    }

    fn record(&self, event: BusEvent) {
        self.events.borrow_mut().push(event);
    }

    /// `(address, data)` of every write frame, in bus order.
    pub fn register_writes(&self) -> Vec<(u8, u16)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Write(f) if f.len() == FRAME_LEN && f[0] == OP_WRITE => {
                    Some((f[1], u16::from_be_bytes([f[2], f[3]])))
                }
                _ => None,
            })
            .collect()
    }

    /// Addresses of every read request, in bus order.
    pub fn register_reads(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Exchange(f) if f.len() == FRAME_LEN && f[0] == OP_READ => Some(f[1]),
                _ => None,
            })
            .collect()
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn polynomial(&self) -> u16 {
        self.polynomial
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.indicators[indicator as usize]
    }

    fn check_op(&mut self) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.ops >= limit {
                return Err(Error::Transport("injected bus failure".into()));
            }
        }
        self.ops += 1;
        Ok(())
    }

    fn require_selected(&self) -> Result<()> {
        if !self.selected {
            return Err(Error::Transport("transfer with chip-select deasserted".into()));
        }
        Ok(())
    }

    fn apply_write(&mut self, address: u8, data: u16) {
        let Ok(reg) = Register::try_from(address) else {
            log::trace!("dummy: ignoring write to {address:#04x}");
            return;
        };
        match reg {
            Register::Mode => match Mode::try_from(data) {
                Ok(mode) => self.mode = mode,
                Err(v) => log::trace!("dummy: ignoring mode value {v:#06x}"),
            },
            Register::Seed => self.lfsr = data,
            Register::DecaySeed => self.harvested = self.next_decay(),
            Register::Polynomial => self.polynomial = data,
            Register::IndicatorA => self.indicators[0] = data != 0,
            Register::IndicatorB => self.indicators[1] = data != 0,
            Register::IndicatorC => self.indicators[2] = data != 0,
        }
    }

    fn apply_read(&mut self, address: u8) -> u16 {
        match Register::try_from(address) {
            Ok(Register::Mode) => match self.mode {
                Mode::Lfsr => self.step_lfsr(),
                Mode::Decay => self.next_decay(),
            },
            Ok(Register::DecaySeed) => self.harvested,
            _ => 0,
        }
    }

    fn taps(&self) -> u16 {
        match self.polynomial {
            POLY_ALTERNATE => 0xD008,
            _ => 0xB400,
        }
    }

    fn step_lfsr(&mut self) -> u16 {
        let lsb = self.lfsr & 1;
        self.lfsr >>= 1;
        if lsb != 0 {
            self.lfsr ^= self.taps();
        }
        self.lfsr
    }

    fn next_decay(&mut self) -> u16 {
        let mut x = self.entropy;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.entropy = x;
        (x >> 16) as u16
    }
}

impl Default for DummyPeripheral {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for DummyPeripheral {
    fn select(&mut self) -> Result<()> {
        self.check_op()?;
        self.selected = true;
        self.record(BusEvent::Select);
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.selected = false;
        self.record(BusEvent::Deselect);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check_op()?;
        self.require_selected()?;
        self.record(BusEvent::Write(data.to_vec()));
        if data.len() == FRAME_LEN && data[0] == OP_WRITE {
            self.apply_write(data[1], u16::from_be_bytes([data[2], data[3]]));
        }
        Ok(())
    }

    fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.check_op()?;
        self.require_selected()?;
        self.record(BusEvent::Exchange(data.to_vec()));

        let mut resp = vec![0xFF; self.config.echo_padding];
        resp.resize(self.config.echo_padding + data.len(), 0x00);

        if self.busy_reads > 0 {
            self.busy_reads -= 1;
            if let Some(first) = resp.first_mut() {
                *first = BUSY_MARKER;
            }
            return Ok(resp);
        }

        if data.len() == FRAME_LEN {
            match data[0] {
                OP_READ => {
                    let value = self.apply_read(data[1]);
                    let n = resp.len();
                    resp[n - 2..].copy_from_slice(&value.to_be_bytes());
                }
                OP_WRITE => self.apply_write(data[1], u16::from_be_bytes([data[2], data[3]])),
                _ => {}
            }
        }
        Ok(resp)
    }
}
