//! Packet framing for the servo bus.
//!
//! Every instruction on the wire is:
//!
//! ```text
//! +------+------+----+-----+-------+----------+----------+
//! | 0xFF | 0xFF | id | len | instr | params.. | checksum |
//! +------+------+----+-----+-------+----------+----------+
//! ```
//!
//! where `len = params + 2` and `checksum = ~(id + len + instr + sum(params))`.
//! Status packets replace `instr` with an error bitfield. The ACTION
//! broadcast (id `0xFE`) is the only instruction that never produces a
//! status packet.

use std::io::{self, Read};

use thiserror::Error;

/// The broadcast address: every servo acts, none replies.
pub const BROADCAST_ID: u8 = 0xFE;

const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Instruction codes understood by the servos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    /// Buffered write: takes effect at the next [`Instruction::Action`].
    RegWrite = 0x04,
    Action = 0x05,
}

/// Framing-level failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("serial I/O: {0}")]
    Io(#[from] io::Error),

    #[error("bad status header: {0:#04x} {1:#04x}")]
    BadHeader(u8, u8),

    #[error("bad status checksum: expected {expected:#04x}, got {got:#04x}")]
    BadChecksum { expected: u8, got: u8 },

    #[error("status packet too short: len field {0}")]
    Truncated(u8),
}

/// A decoded status packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: u8,
    /// Error bitfield reported by the servo; zero means success.
    pub error: u8,
    pub params: Vec<u8>,
}

/// Checksum over everything between the header and the checksum byte.
#[must_use]
pub fn checksum(body: &[u8]) -> u8 {
    let sum: u32 = body.iter().map(|&b| u32::from(b)).sum();
    !(sum as u8)
}

/// Assembles an instruction packet.
#[must_use]
pub fn instruction_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let len = params.len() as u8 + 2;
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push(len);
    packet.push(instruction as u8);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

/// Reads and validates one status packet from the stream.
pub fn read_status(reader: &mut impl Read) -> Result<StatusPacket, ProtocolError> {
    let mut head = [0u8; 4];
    reader.read_exact(&mut head)?;
    if head[0] != HEADER[0] || head[1] != HEADER[1] {
        return Err(ProtocolError::BadHeader(head[0], head[1]));
    }

    let id = head[2];
    let len = head[3];
    if len < 2 {
        return Err(ProtocolError::Truncated(len));
    }

    // len covers the error byte, params, and checksum.
    let mut rest = vec![0u8; len as usize];
    reader.read_exact(&mut rest)?;

    let error = rest[0];
    let params = rest[1..rest.len() - 1].to_vec();
    let got = rest[rest.len() - 1];

    let mut body = vec![id, len, error];
    body.extend_from_slice(&params);
    let expected = checksum(&body);
    if got != expected {
        return Err(ProtocolError::BadChecksum { expected, got });
    }

    Ok(StatusPacket { id, error, params })
}

/// Assembles a status packet. Only the loopback transport builds these; the
/// real servos do it in firmware.
#[must_use]
pub fn status_packet(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
    let len = params.len() as u8 + 2;
    let mut packet = Vec::with_capacity(6 + params.len());
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push(len);
    packet.push(error);
    packet.extend_from_slice(params);
    packet.push(checksum(&packet[2..]));
    packet
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
