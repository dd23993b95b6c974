//! Register map of the random number core.
//!
//! Every register carries a single 16-bit payload. Addresses are fixed for
//! the lifetime of the peripheral.

use crate::ProtocolError;

/// Width of every register payload, in bytes.
pub const REGISTER_WIDTH: usize = 2;

/// Default LFSR feedback-tap selector.
pub const POLY_DEFAULT: u16 = 0;
/// Alternate LFSR feedback-tap selector.
pub const POLY_ALTERNATE: u16 = 2;

/// Addressable peripheral registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// Operating mode on write, next generated value on read.
    Mode = 0x00,
    /// LFSR initial state.
    Seed = 0x01,
    /// Write triggers a decay-timing seed harvest, read fetches it.
    DecaySeed = 0x02,
    /// LFSR feedback-tap selector.
    Polynomial = 0x03,
    IndicatorA = 0x10,
    IndicatorB = 0x12,
    IndicatorC = 0x14,
}

/// How a register may be accessed over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    WriteOnly,
    /// Write starts an action, a later read fetches its result.
    TriggerRead,
}

impl Register {
    /// All mapped registers in address order.
    pub const ALL: [Register; 7] = [
        Register::Mode,
        Register::Seed,
        Register::DecaySeed,
        Register::Polynomial,
        Register::IndicatorA,
        Register::IndicatorB,
        Register::IndicatorC,
    ];

    pub fn address(self) -> u8 {
        self as u8
    }

    /// Payload width in bytes.
    pub fn width(self) -> usize {
        REGISTER_WIDTH
    }

    pub fn access(self) -> Access {
        match self {
            Register::Mode => Access::ReadWrite,
            Register::DecaySeed => Access::TriggerRead,
            Register::Seed
            | Register::Polynomial
            | Register::IndicatorA
            | Register::IndicatorB
            | Register::IndicatorC => Access::WriteOnly,
        }
    }

    pub fn is_readable(self) -> bool {
        self.access() != Access::WriteOnly
    }
}

impl TryFrom<u8> for Register {
    type Error = ProtocolError;

    fn try_from(addr: u8) -> Result<Self, ProtocolError> {
        Register::ALL
            .iter()
            .copied()
            .find(|r| r.address() == addr)
            .ok_or(ProtocolError::UnknownRegister(addr))
    }
}

/// Generation mode latched in the MODE register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Mode {
    /// Values sampled from radioactive-decay event timing.
    Decay = 0,
    /// Deterministic linear feedback shift register.
    Lfsr = 1,
}

impl TryFrom<u16> for Mode {
    type Error = u16;
    fn try_from(v: u16) -> Result<Self, u16> {
        match v {
            0 => Ok(Self::Decay),
            1 => Ok(Self::Lfsr),
            _ => Err(v),
        }
    }
}

/// Boolean status lamps driven by the indicator registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Indicator {
    A,
    B,
    C,
}

impl Indicator {
    /// Self-test order.
    pub const ALL: [Indicator; 3] = [Indicator::A, Indicator::B, Indicator::C];

    pub fn register(self) -> Register {
        match self {
            Indicator::A => Register::IndicatorA,
            Indicator::B => Register::IndicatorB,
            Indicator::C => Register::IndicatorC,
        }
    }
}
