//! A single joint on the bus.
//!
//! A [`Servo`] is an id plus a buffered flag; it holds no bus reference.
//! Every operation takes `&mut Bus`, so ownership stays with the
//! orchestrator and the servo handles can live inside legs and the head
//! without back-pointers.

use crate::bus::{Bus, BusError};
use crate::registers;

/// Raw position range of the AX-series: 0..=1023 spans 300 degrees with
/// the mechanical center at 512.
const RAW_CENTER: f64 = 512.0;
const RAW_PER_DEGREE: f64 = 1023.0 / 300.0;

/// Converts a goal angle in degrees to the raw register value, clamped to
/// the mechanical range.
#[must_use]
pub fn degrees_to_raw(degrees: f64) -> u16 {
    let raw = RAW_CENTER + degrees * RAW_PER_DEGREE;
    raw.round().clamp(0.0, 1023.0) as u16
}

/// Converts a raw present-position register value to degrees.
#[must_use]
pub fn raw_to_degrees(raw: u16) -> f64 {
    (f64::from(raw) - RAW_CENTER) / RAW_PER_DEGREE
}

/// Handle to one servo.
#[derive(Debug, Clone)]
pub struct Servo {
    pub id: u8,
    buffered: bool,
}

impl Servo {
    #[must_use]
    pub const fn new(id: u8) -> Self {
        Self {
            id,
            buffered: false,
        }
    }

    /// Whether goal writes are currently deferred to the ACTION broadcast.
    #[must_use]
    pub const fn buffered(&self) -> bool {
        self.buffered
    }

    pub fn set_buffered(&mut self, buffered: bool) {
        self.buffered = buffered;
    }

    /// Brings a freshly powered servo into the expected state.
    ///
    /// Order matters: the status return level goes first so that none of
    /// the following writes are acked, and the ping proves the servo is
    /// alive before anything moves. Buffering comes last and is permanent:
    /// every goal write after provisioning waits for the ACTION broadcast.
    pub fn provision(&mut self, bus: &mut Bus) -> Result<(), BusError> {
        self.set_return_level(bus, registers::RETURN_LEVEL_READS)?;
        self.ping(bus)?;
        self.set_return_delay(bus, 0)?;
        self.set_torque_enable(bus, true)?;
        self.set_moving_speed(bus, 1023)?;
        self.set_buffered(true);
        Ok(())
    }

    pub fn ping(&self, bus: &mut Bus) -> Result<(), BusError> {
        bus.ping(self.id)
    }

    /// Commands a goal angle in degrees. While buffered, the write sits in
    /// the servo until the next ACTION broadcast.
    pub fn move_to(&self, bus: &mut Bus, degrees: f64) -> Result<(), BusError> {
        let raw = degrees_to_raw(degrees).to_le_bytes();
        if self.buffered {
            bus.reg_write(self.id, registers::GOAL_POSITION, &raw)
        } else {
            bus.write(self.id, registers::GOAL_POSITION, &raw)
        }
    }

    /// Reads the present angle in degrees. A full serial round-trip; keep
    /// out of the tick loop.
    pub fn present_angle(&self, bus: &mut Bus) -> Result<f64, BusError> {
        let raw = bus.read_u16(self.id, registers::PRESENT_POSITION)?;
        Ok(raw_to_degrees(raw))
    }

    /// Reads the supply voltage in volts.
    pub fn voltage(&self, bus: &mut Bus) -> Result<f64, BusError> {
        let raw = bus.read_u8(self.id, registers::PRESENT_VOLTAGE)?;
        Ok(f64::from(raw) / 10.0)
    }

    pub fn set_return_level(&self, bus: &mut Bus, level: u8) -> Result<(), BusError> {
        bus.write(self.id, registers::STATUS_RETURN_LEVEL, &[level])
    }

    pub fn set_return_delay(&self, bus: &mut Bus, delay: u8) -> Result<(), BusError> {
        bus.write(self.id, registers::RETURN_DELAY, &[delay])
    }

    pub fn set_torque_enable(&self, bus: &mut Bus, enabled: bool) -> Result<(), BusError> {
        bus.write(self.id, registers::TORQUE_ENABLE, &[u8::from(enabled)])
    }

    pub fn set_led(&self, bus: &mut Bus, on: bool) -> Result<(), BusError> {
        bus.write(self.id, registers::LED, &[u8::from(on)])
    }

    /// Moving speed, 0..=1023 (0 is the servo's unregulated maximum).
    pub fn set_moving_speed(&self, bus: &mut Bus, speed: u16) -> Result<(), BusError> {
        bus.write(self.id, registers::MOVING_SPEED, &speed.to_le_bytes())
    }

    /// Torque limit, 0..=1023.
    pub fn set_torque_limit(&self, bus: &mut Bus, limit: u16) -> Result<(), BusError> {
        bus.write(self.id, registers::TORQUE_LIMIT, &limit.to_le_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
