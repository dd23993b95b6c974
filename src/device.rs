//! Typed register access to the random number core.

use std::time::Duration;

use crate::delay::{Delay, StdDelay};
use crate::protocol::*;
use crate::registers::*;
use crate::transport::{ChipSelect, Transport};
use crate::{ProtocolError, Result};

/// What to do when a read comes back with the busy sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Decode the response as-is.
    #[default]
    Never,
    /// Re-issue the read up to `attempts` times in total, then fail with
    /// [`ProtocolError::Busy`].
    OnBusy { attempts: u32 },
}

/// Device controller settings.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// How long each indicator is held during the self-test. The
    /// peripheral's reset line needs this long to propagate.
    pub settle_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(250),
            retry: RetryPolicy::Never,
        }
    }
}

/// Register-level interface to the random number core.
///
/// Owns the bus handle; every access is a complete select → transfer →
/// deselect round-trip. No register values are cached, the peripheral is
/// authoritative.
///
/// ```no_run
/// use decayrng::{Device, Register, SpiDriverTransport};
///
/// let mut device = Device::new(SpiDriverTransport::open(None, None)?);
/// device.reset_and_self_test()?;
/// device.write_register(Register::Seed, 0xBEEF)?;
/// # Ok::<(), decayrng::Error>(())
/// ```
pub struct Device<T: Transport, D: Delay = StdDelay> {
    transport: T,
    delay: D,
    config: DeviceConfig,
}

impl<T: Transport> Device<T, StdDelay> {
    /// Wrap a transport with default settings and real sleeps.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, StdDelay, DeviceConfig::default())
    }
}

impl<T: Transport, D: Delay> Device<T, D> {
    pub fn with_config(transport: T, delay: D, config: DeviceConfig) -> Self {
        Self {
            transport,
            delay,
            config,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Give back the bus handle.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Write a 16-bit value. Writes are not acknowledged.
    pub fn write_register(&mut self, register: Register, data: u16) -> Result<()> {
        let frame = encode_write(register.address(), data);
        log::debug!("write {register:?} <- {data:#06x}");
        log::trace!("tx {frame:02x?}");

        let mut cs = ChipSelect::acquire(&mut self.transport)?;
        cs.write(&frame)?;
        cs.release()
    }

    /// Read a register using its natural payload width.
    pub fn read_register(&mut self, register: Register) -> Result<u16> {
        self.read_register_width(register, register.width())
    }

    /// Read a register, decoding the trailing `width_bytes` of the exchange.
    pub fn read_register_width(&mut self, register: Register, width_bytes: usize) -> Result<u16> {
        if !register.is_readable() {
            return Err(ProtocolError::NotReadable(register).into());
        }
        check_width(width_bytes)?;
        let frame = encode_read_request(register.address());
        let max_attempts = match self.config.retry {
            RetryPolicy::Never => None,
            RetryPolicy::OnBusy { attempts } => Some(attempts.max(1)),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let resp = self.exchange_frame(&frame)?;
            if let Some(max) = max_attempts {
                if is_busy(&resp) {
                    if attempt >= max {
                        return Err(ProtocolError::Busy {
                            register,
                            attempts: attempt,
                        }
                        .into());
                    }
                    log::warn!("{register:?} busy, retrying ({attempt}/{max})");
                    continue;
                }
            }
            let value = decode_response(&resp, width_bytes)?;
            log::debug!("read {register:?} -> {value:#06x}");
            return Ok(value);
        }
    }

    fn exchange_frame(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        log::trace!("tx {frame:02x?}");
        let mut cs = ChipSelect::acquire(&mut self.transport)?;
        let resp = cs.exchange(frame)?;
        cs.release()?;
        log::trace!("rx {resp:02x?}");
        Ok(resp)
    }

    /// Clear indicators and polynomial, then blink each indicator in turn.
    ///
    /// Any bus failure aborts the sequence; the peripheral keeps whatever the
    /// last successful write left behind.
    pub fn reset_and_self_test(&mut self) -> Result<()> {
        for indicator in Indicator::ALL {
            self.write_register(indicator.register(), 0)?;
        }
        self.write_register(Register::Polynomial, POLY_DEFAULT)?;

        for indicator in Indicator::ALL {
            self.write_register(indicator.register(), 1)?;
            self.delay.delay(self.config.settle_delay);
            self.write_register(indicator.register(), 0)?;
        }
        log::info!("self-test complete");
        Ok(())
    }

    /// Latch a generation mode.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.write_register(Register::Mode, mode as u16)
    }

    pub fn set_seed(&mut self, seed: u16) -> Result<()> {
        self.write_register(Register::Seed, seed)
    }

    pub fn set_polynomial(&mut self, polynomial: u16) -> Result<()> {
        self.write_register(Register::Polynomial, polynomial)
    }

    pub fn set_indicator(&mut self, indicator: Indicator, on: bool) -> Result<()> {
        self.write_register(indicator.register(), on as u16)
    }

    /// Start harvesting a seed from decay timing.
    pub fn trigger_seed_harvest(&mut self) -> Result<()> {
        self.write_register(Register::DecaySeed, 0)
    }

    /// Fetch the seed produced by the last harvest.
    pub fn read_harvested_seed(&mut self) -> Result<u16> {
        self.read_register(Register::DecaySeed)
    }

    /// Read the next generated value.
    ///
    /// MODE reads return generator output, not the mode flag, while a
    /// generation mode is latched.
    pub fn next_value(&mut self) -> Result<u16> {
        self.read_register(Register::Mode)
    }
}
