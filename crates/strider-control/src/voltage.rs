//! Battery supervision through one of the leg servos.

use std::time::{Duration, Instant};

use tracing::{debug, error};

use strider_bus::{Bus, Servo};
use strider_core::state::State;
use strider_core::time::RateLimiter;

use crate::component::Component;
use crate::error::ControlError;

/// How often to pay for a real voltage round-trip on the bus.
const CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Below this the pack is at risk; the robot sits down and powers off.
const MINIMUM_VOLTS: f64 = 9.6;

/// Periodically reads the battery voltage from one servo and latches
/// shutdown when it sags too low. The low-voltage error it returns is for
/// logging; the shutdown flag is already set by the time the orchestrator
/// sees it.
pub struct VoltageMonitor {
    servo: Servo,
    limiter: RateLimiter,
    minimum: f64,
}

impl VoltageMonitor {
    #[must_use]
    pub fn new(servo: Servo) -> Self {
        Self {
            servo,
            limiter: RateLimiter::new(CHECK_INTERVAL),
            minimum: MINIMUM_VOLTS,
        }
    }
}

impl Component for VoltageMonitor {
    fn name(&self) -> &'static str {
        "voltage"
    }

    fn tick(
        &mut self,
        now: Instant,
        state: &mut State,
        bus: &mut Bus,
    ) -> Result<(), ControlError> {
        if !self.limiter.ready(now) {
            return Ok(());
        }

        let volts = self.servo.voltage(bus)?;
        debug!(volts, "battery");

        if volts < self.minimum {
            error!(volts, minimum = self.minimum, "battery low; shutting down");
            state.request_shutdown();
            return Err(ControlError::LowVoltage(volts));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
