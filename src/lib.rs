//! # decayrng
//!
//! Host SDK for the decay/LFSR random number core, a peripheral reached over
//! a full-duplex SPI register bus.
//!
//! The core exposes a handful of 16-bit registers. Writing MODE selects
//! between a deterministic LFSR and radioactive-decay sampling; reading MODE
//! while a generation mode is latched returns the next generated value.
//!
//! ## Quick Start
//!
//! ```no_run
//! use decayrng::{Device, ModeSession, SpiDriverTransport};
//!
//! let bus = SpiDriverTransport::open(None, None)?;
//! let mut device = Device::new(bus);
//! device.reset_and_self_test()?;
//!
//! let mut session = ModeSession::new(device);
//! session.select_lfsr(0xBEEF, 0)?;
//! let values = session.read_values(10)?;
//! println!("{:04x?}", values);
//! # Ok::<(), decayrng::Error>(())
//! ```

pub mod delay;
pub mod device;
pub mod dummy;
pub mod protocol;
pub mod registers;
pub mod session;
pub mod spidriver;
pub mod transport;

pub use delay::{Delay, NoDelay, StdDelay};
pub use device::{Device, DeviceConfig, RetryPolicy};
pub use dummy::{BusEvent, DummyDelay, DummyPeripheral};
pub use registers::*;
pub use session::{ModeSession, Samples, SessionConfig, SessionState};
pub use spidriver::{find_devices, SpiDriverTransport};
pub use transport::{ChipSelect, Transport};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the decayrng SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No SPI adapter found during auto-discovery.
    #[error("No SPI adapter found")]
    NoDevice,

    /// The underlying bus write or exchange failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Register protocol violation (short response, bad address, busy).
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Generation session used out of order.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Register-protocol level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The exchange returned fewer bytes than the payload width.
    #[error("short response: expected at least {expected} bytes, got {got}")]
    ShortResponse { expected: usize, got: usize },

    /// Payload width outside 1..=2 bytes.
    #[error("unsupported payload width: {0} bytes")]
    UnsupportedWidth(usize),

    /// The address is not part of the register map.
    #[error("unknown register address {0:#04x}")]
    UnknownRegister(u8),

    /// The register cannot be read back.
    #[error("register {0:?} is write-only")]
    NotReadable(Register),

    /// The peripheral kept answering busy until the retry policy gave up.
    #[error("register {register:?} still busy after {attempts} attempts")]
    Busy { register: Register, attempts: u32 },
}

/// Generation session state errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// `next_value` was called before any `select_*` call.
    #[error("no generation mode selected")]
    NotConfigured,
}
