//! The bus itself: instruction writes, status reads, and the ACTION
//! broadcast that commits buffered goals.

use std::io;

use thiserror::Error;
use tracing::trace;

use crate::protocol::{
    self, Instruction, ProtocolError, StatusPacket, BROADCAST_ID,
};
use crate::transport::Transport;

/// Bus-level failures: framing, timeouts, and servo-reported errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("opening serial port {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("servo #{id} timed out")]
    Timeout { id: u8 },

    #[error("servo #{id} reported error bits {bits:#04x}")]
    Status { id: u8, bits: u8 },

    #[error("servo #{expected} expected in status packet, got #{got}")]
    WrongServo { expected: u8, got: u8 },

    #[error("servo #{id} returned {got} bytes, expected {expected}")]
    ShortRead { id: u8, expected: usize, got: usize },
}

/// The shared servo bus.
///
/// Exactly one instance exists per robot; the orchestrator serialises
/// access with a mutex held for the duration of each tick. Writes never
/// wait for a status packet (the servos are provisioned to reply to reads
/// only); reads perform a full round-trip.
pub struct Bus {
    transport: Box<dyn Transport>,
    debug: bool,
}

impl Bus {
    #[must_use]
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            debug: false,
        }
    }

    /// Enables per-packet traffic tracing.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn send(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<(), BusError> {
        let packet = protocol::instruction_packet(id, instruction, params);
        if self.debug {
            trace!(id, ?instruction, packet = ?packet, "tx");
        }
        self.transport
            .write_all(&packet)
            .map_err(|e| io_to_bus(e, id))?;
        self.transport.flush().map_err(|e| io_to_bus(e, id))?;
        Ok(())
    }

    fn recv(&mut self, id: u8) -> Result<StatusPacket, BusError> {
        let status = protocol::read_status(&mut self.transport).map_err(|e| match e {
            ProtocolError::Io(io) if io.kind() == io::ErrorKind::TimedOut => {
                BusError::Timeout { id }
            }
            other => BusError::Protocol(other),
        })?;
        if self.debug {
            trace!(id = status.id, error = status.error, params = ?status.params, "rx");
        }
        if status.id != id {
            return Err(BusError::WrongServo {
                expected: id,
                got: status.id,
            });
        }
        if status.error != 0 {
            return Err(BusError::Status {
                id,
                bits: status.error,
            });
        }
        Ok(status)
    }

    /// Checks that a servo is alive and answering.
    pub fn ping(&mut self, id: u8) -> Result<(), BusError> {
        self.send(id, Instruction::Ping, &[])?;
        self.recv(id)?;
        Ok(())
    }

    /// Reads `len` bytes of the control table starting at `addr`.
    pub fn read(&mut self, id: u8, addr: u8, len: u8) -> Result<Vec<u8>, BusError> {
        self.send(id, Instruction::Read, &[addr, len])?;
        let status = self.recv(id)?;
        if status.params.len() != len as usize {
            return Err(BusError::ShortRead {
                id,
                expected: len as usize,
                got: status.params.len(),
            });
        }
        Ok(status.params)
    }

    pub fn read_u8(&mut self, id: u8, addr: u8) -> Result<u8, BusError> {
        Ok(self.read(id, addr, 1)?[0])
    }

    pub fn read_u16(&mut self, id: u8, addr: u8) -> Result<u16, BusError> {
        let params = self.read(id, addr, 2)?;
        Ok(u16::from_le_bytes([params[0], params[1]]))
    }

    /// Writes control-table bytes, taking effect immediately.
    pub fn write(&mut self, id: u8, addr: u8, data: &[u8]) -> Result<(), BusError> {
        let mut params = Vec::with_capacity(1 + data.len());
        params.push(addr);
        params.extend_from_slice(data);
        self.send(id, Instruction::Write, &params)
    }

    /// Writes control-table bytes into the servo's buffer; the value takes
    /// effect at the next [`action`](Self::action) broadcast.
    pub fn reg_write(&mut self, id: u8, addr: u8, data: &[u8]) -> Result<(), BusError> {
        let mut params = Vec::with_capacity(1 + data.len());
        params.push(addr);
        params.extend_from_slice(data);
        self.send(id, Instruction::RegWrite, &params)
    }

    /// Broadcasts ACTION, committing every buffered write at once.
    pub fn action(&mut self) -> Result<(), BusError> {
        self.send(BROADCAST_ID, Instruction::Action, &[])
    }
}

fn io_to_bus(e: io::Error, id: u8) -> BusError {
    if e.kind() == io::ErrorKind::TimedOut {
        BusError::Timeout { id }
    } else {
        BusError::Protocol(ProtocolError::Io(e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
