//! An in-process stand-in for the servo chain, used by `--offline` runs
//! and by tests.
//!
//! The loopback models just enough firmware to keep the control core
//! honest: it answers pings and reads, applies immediate writes at once,
//! holds buffered writes until ACTION, and mirrors committed goal
//! positions into the present position so convergence checks pass without
//! a physical servo. The reported battery voltage is programmable.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crate::protocol;
use crate::registers;

const PACKET_HEADER: [u8; 2] = [0xFF, 0xFF];
const CENTER_RAW: u16 = 512;

/// One decoded write, kept for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub id: u8,
    pub addr: u8,
    pub data: Vec<u8>,
    /// True for REG_WRITE (deferred until ACTION).
    pub buffered: bool,
}

#[derive(Debug, Default)]
struct LoopbackState {
    inbox: Vec<u8>,
    outbox: Vec<u8>,
    /// Committed goal positions, mirrored into present position.
    goals: HashMap<u8, u16>,
    /// REG_WRITTEN goals awaiting ACTION.
    pending: HashMap<u8, u16>,
    /// Every other control-table byte, keyed by (id, addr).
    table: HashMap<(u8, u8), u8>,
    voltage_raw: u8,
    writes: Vec<WriteRecord>,
    actions: usize,
    known_ids: Vec<u8>,
}

/// Cloneable handle to the shared loopback state; the bus owns one clone,
/// the test (or offline harness) keeps another for inspection.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    #[must_use]
    pub fn new() -> Self {
        let state = LoopbackState {
            voltage_raw: 126,
            ..LoopbackState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Sets the battery voltage every servo will report.
    pub fn set_voltage(&mut self, volts: f64) {
        self.lock().voltage_raw = (volts * 10.0).round() as u8;
    }

    /// The committed (post-ACTION) goal of a servo, if one was ever written.
    #[must_use]
    pub fn goal(&self, id: u8) -> Option<u16> {
        self.lock().goals.get(&id).copied()
    }

    /// A raw control-table byte, if it was ever written.
    #[must_use]
    pub fn table_byte(&self, id: u8, addr: u8) -> Option<u8> {
        self.lock().table.get(&(id, addr)).copied()
    }

    /// How many ACTION broadcasts have been seen.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.lock().actions
    }

    /// Every write observed so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Forgets the write log (not the servo state).
    pub fn clear_writes(&mut self) {
        self.lock().writes.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoopbackState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LoopbackState {
    fn note_id(&mut self, id: u8) {
        if id != protocol::BROADCAST_ID && !self.known_ids.contains(&id) {
            self.known_ids.push(id);
        }
    }

    /// Consumes complete instruction packets from the inbox.
    fn pump(&mut self) {
        loop {
            if self.inbox.len() < 4 {
                return;
            }
            if self.inbox[0] != PACKET_HEADER[0] || self.inbox[1] != PACKET_HEADER[1] {
                // Desynchronised; drop everything rather than guess.
                self.inbox.clear();
                return;
            }
            let len = self.inbox[3] as usize;
            let total = 4 + len;
            if self.inbox.len() < total {
                return;
            }
            let packet: Vec<u8> = self.inbox.drain(..total).collect();
            let id = packet[2];
            let instruction = packet[4];
            let params = &packet[5..packet.len() - 1];
            self.handle(id, instruction, params);
        }
    }

    fn handle(&mut self, id: u8, instruction: u8, params: &[u8]) {
        self.note_id(id);
        match instruction {
            0x01 => {
                // PING
                if id != protocol::BROADCAST_ID {
                    self.outbox.extend(protocol::status_packet(id, 0, &[]));
                }
            }
            0x02 => {
                // READ addr, len
                if id == protocol::BROADCAST_ID || params.len() != 2 {
                    return;
                }
                let (addr, len) = (params[0], params[1]);
                let reply = self.read_table(id, addr, len);
                self.outbox.extend(protocol::status_packet(id, 0, &reply));
            }
            0x03 => {
                // WRITE addr, data..
                if params.is_empty() {
                    return;
                }
                self.record_write(id, params, false);
                for target in self.targets(id) {
                    Self::apply_write(
                        &mut self.goals,
                        &mut self.table,
                        target,
                        params[0],
                        &params[1..],
                    );
                }
            }
            0x04 => {
                // REG_WRITE addr, data..
                if params.is_empty() {
                    return;
                }
                self.record_write(id, params, true);
                if params[0] == registers::GOAL_POSITION && params.len() == 3 {
                    let raw = u16::from_le_bytes([params[1], params[2]]);
                    for target in self.targets(id) {
                        self.pending.insert(target, raw);
                    }
                } else {
                    for target in self.targets(id) {
                        Self::apply_write(
                            &mut self.goals,
                            &mut self.table,
                            target,
                            params[0],
                            &params[1..],
                        );
                    }
                }
            }
            0x05 => {
                // ACTION: commit everything at once.
                self.actions += 1;
                for (id, raw) in self.pending.drain() {
                    self.goals.insert(id, raw);
                }
            }
            _ => {}
        }
    }

    fn targets(&self, id: u8) -> Vec<u8> {
        if id == protocol::BROADCAST_ID {
            self.known_ids.clone()
        } else {
            vec![id]
        }
    }

    fn record_write(&mut self, id: u8, params: &[u8], buffered: bool) {
        if params.is_empty() {
            return;
        }
        self.writes.push(WriteRecord {
            id,
            addr: params[0],
            data: params[1..].to_vec(),
            buffered,
        });
    }

    fn apply_write(
        goals: &mut HashMap<u8, u16>,
        table: &mut HashMap<(u8, u8), u8>,
        id: u8,
        addr: u8,
        data: &[u8],
    ) {
        if addr == registers::GOAL_POSITION && data.len() == 2 {
            goals.insert(id, u16::from_le_bytes([data[0], data[1]]));
        } else {
            for (i, &byte) in data.iter().enumerate() {
                table.insert((id, addr + i as u8), byte);
            }
        }
    }

    fn read_table(&self, id: u8, addr: u8, len: u8) -> Vec<u8> {
        match (addr, len) {
            (registers::PRESENT_POSITION, 2) | (registers::GOAL_POSITION, 2) => {
                // Present position mirrors the committed goal: the loopback
                // servo moves instantly.
                let raw = self.goals.get(&id).copied().unwrap_or(CENTER_RAW);
                raw.to_le_bytes().to_vec()
            }
            (registers::PRESENT_VOLTAGE, 1) => vec![self.voltage_raw],
            _ => (0..len)
                .map(|i| {
                    self.table
                        .get(&(id, addr + i))
                        .copied()
                        .unwrap_or(0)
                })
                .collect(),
        }
    }
}

impl Read for LoopbackTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if state.outbox.is_empty() {
            // Nothing queued: behaves like a serial read timeout.
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no status packet pending",
            ));
        }
        let n = buf.len().min(state.outbox.len());
        for (slot, byte) in buf.iter_mut().zip(state.outbox.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for LoopbackTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.inbox.extend_from_slice(buf);
        state.pump();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
