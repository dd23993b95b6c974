//! USB-serial SPI adapter transport (SPIDriver command set).
//!
//! The adapter takes single-byte commands over a virtual serial port:
//!
//! | Byte          | Action                                    |
//! |---------------|-------------------------------------------|
//! | `s` / `u`     | assert / deassert chip-select             |
//! | `0xC0 + n-1`  | write the following `n` bytes (n <= 64)   |
//! | `0x80 + n-1`  | write `n` bytes and return `n` read back  |
//! | `e`           | echo the following byte                   |
//! | `?`           | 80-byte status string                     |
//! | `@`           | no-op                                     |

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

use crate::transport::Transport;
use crate::{Error, Result};

const BAUD_RATE: u32 = 460_800;
const MAX_CHUNK: usize = 64;
const STATUS_LEN: usize = 80;
/// Enough no-op bytes to complete the longest half-received command.
const RESYNC_LEN: usize = MAX_CHUNK;

const CMD_SELECT: u8 = b's';
const CMD_UNSELECT: u8 = b'u';
const CMD_ECHO: u8 = b'e';
const CMD_STATUS: u8 = b'?';
const CMD_NOP: u8 = b'@';
const CMD_WRITE: u8 = 0xC0;
const CMD_WRITE_READ: u8 = 0x80;

/// Auto-discover SPI adapters by serial port pattern.
pub fn find_devices() -> Vec<String> {
    let pattern = if cfg!(target_os = "macos") {
        "/dev/cu.usbserial-"
    } else {
        "/dev/ttyUSB"
    };

    let mut devices: Vec<String> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.port_name)
        .filter(|name| name.starts_with(pattern))
        .collect();
    devices.sort();
    devices
}

/// SPI bus behind a USB-serial adapter.
pub struct SpiDriverTransport {
    port: Box<dyn SerialPort>,
}

impl SpiDriverTransport {
    /// Connect to an adapter.
    ///
    /// - `port`: Serial port path. If `None`, uses the first discovered adapter.
    /// - `timeout`: Read timeout. If `None`, uses 1 second.
    pub fn open(port: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        let timeout = timeout.unwrap_or(Duration::from_secs(1));

        let port_name = match port {
            Some(p) => p.to_string(),
            None => find_devices().into_iter().next().ok_or(Error::NoDevice)?,
        };

        let port = serialport::new(&port_name, BAUD_RATE)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::Transport(format!("Failed to open {port_name}: {e}")))?;

        let bus = Self::from_port(port)?;
        log::info!("Opened SPI adapter on {port_name} at {BAUD_RATE} baud");
        Ok(bus)
    }

    /// Wrap an already open port and resynchronise the adapter.
    pub fn from_port(port: Box<dyn SerialPort>) -> Result<Self> {
        let mut bus = Self { port };
        bus.sync()?;
        Ok(bus)
    }

    /// Read the adapter's status string (model, serial, voltages).
    pub fn info(&mut self) -> Result<String> {
        self.send(&[CMD_STATUS])?;
        let raw = self.recv(STATUS_LEN)?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Flush any command a previous host left half-sent, drain stale input,
    /// then confirm the adapter echoes bytes back.
    fn sync(&mut self) -> Result<()> {
        self.port
            .clear(serialport::ClearBuffer::All)
            .map_err(|e| Error::Transport(format!("Clear buffer failed: {e}")))?;

        self.send(&[CMD_NOP; RESYNC_LEN])?;
        self.port
            .flush()
            .map_err(|e| Error::Transport(format!("Flush failed: {e}")))?;
        std::thread::sleep(Duration::from_millis(20));
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| Error::Transport(format!("Clear buffer failed: {e}")))?;

        for probe in [b'A', b'\r', b'\n', b'@'] {
            self.send(&[CMD_ECHO, probe])?;
            let resp = self.recv(1)?;
            if resp != [probe] {
                return Err(Error::Transport(format!(
                    "Adapter echo mismatch: sent {probe:#04x}, got {resp:02x?}"
                )));
            }
        }
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .map_err(|e| Error::Transport(format!("Write failed: {e}")))
    }

    /// Read exactly `len` bytes, failing on timeout.
    fn recv(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut total = 0;
        while total < len {
            match self.port.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(Error::Transport(format!("Read failed: {e}"))),
            }
        }
        if total < len {
            return Err(Error::Transport(format!(
                "Timed out: expected {len} bytes, got {total}"
            )));
        }
        Ok(buf)
    }
}

impl Transport for SpiDriverTransport {
    fn select(&mut self) -> Result<()> {
        self.send(&[CMD_SELECT])
    }

    fn deselect(&mut self) -> Result<()> {
        self.send(&[CMD_UNSELECT])
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(MAX_CHUNK) {
            let mut cmd = Vec::with_capacity(chunk.len() + 1);
            cmd.push(CMD_WRITE + (chunk.len() - 1) as u8);
            cmd.extend_from_slice(chunk);
            self.send(&cmd)?;
        }
        Ok(())
    }

    fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(MAX_CHUNK) {
            let mut cmd = Vec::with_capacity(chunk.len() + 1);
            cmd.push(CMD_WRITE_READ + (chunk.len() - 1) as u8);
            cmd.extend_from_slice(chunk);
            self.send(&cmd)?;
            out.extend(self.recv(chunk.len())?);
        }
        Ok(out)
    }
}
