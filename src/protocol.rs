//! Register bus wire protocol: frame builders, response decoding, constants.
//!
//! Pure functions with no I/O — reusable with any transport.
//!
//! Every command is a 4-byte big-endian frame:
//!
//! ```text
//! byte 0    byte 1    bytes 2..4
//! opcode    address   16-bit payload (zero for reads)
//! ```

use crate::ProtocolError;

// --- Opcodes ---
pub const OP_WRITE: u8 = 0x00;
pub const OP_READ: u8 = 0x80;

// --- Sizes ---
pub const FRAME_LEN: usize = 4;

/// First response byte the peripheral uses to signal it is not ready.
pub const BUSY_MARKER: u8 = 0x23;

/// Build a write frame: `0x00 | address | data (BE)`.
pub fn encode_write(address: u8, data: u16) -> [u8; FRAME_LEN] {
    let [hi, lo] = data.to_be_bytes();
    [OP_WRITE, address, hi, lo]
}

/// Build a read request frame: `0x80 | address | 0x0000`.
pub fn encode_read_request(address: u8) -> [u8; FRAME_LEN] {
    [OP_READ, address, 0x00, 0x00]
}

/// Widest payload a register read can carry.
pub const MAX_WIDTH: usize = std::mem::size_of::<u16>();

/// Reject payload widths that do not fit the 16-bit result.
pub fn check_width(width_bytes: usize) -> Result<(), ProtocolError> {
    if width_bytes == 0 || width_bytes > MAX_WIDTH {
        return Err(ProtocolError::UnsupportedWidth(width_bytes));
    }
    Ok(())
}

/// Decode the value carried by a duplex exchange.
///
/// The bus may clock out echo or padding bytes before the real answer, so
/// the value is always the trailing `width_bytes` of `buffer`, big-endian.
pub fn decode_response(buffer: &[u8], width_bytes: usize) -> Result<u16, ProtocolError> {
    check_width(width_bytes)?;
    if buffer.len() < width_bytes {
        return Err(ProtocolError::ShortResponse {
            expected: width_bytes,
            got: buffer.len(),
        });
    }
    let tail = &buffer[buffer.len() - width_bytes..];
    Ok(tail.iter().fold(0u16, |acc, &b| (acc << 8) | b as u16))
}

/// True when the exchange buffer starts with the busy sentinel.
pub fn is_busy(buffer: &[u8]) -> bool {
    buffer.first() == Some(&BUSY_MARKER)
}
