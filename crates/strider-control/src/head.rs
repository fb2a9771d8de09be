//! The pan/tilt head: aims the camera at the world-space look-at point.

use std::time::Instant;

use tracing::warn;

use strider_bus::{Bus, Servo};
use strider_core::pose::Pose;
use strider_core::state::State;
use strider_core::vec::Vec3;

use crate::component::Component;
use crate::error::ControlError;

pub const PAN_SERVO_ID: u8 = 71;
pub const TILT_SERVO_ID: u8 = 72;

const MOVE_SPEED: u16 = 1023;
const TORQUE_LIMIT: u16 = 1023;

/// Aiming limits, degrees. Tighter than the servos' range to protect the
/// camera ribbon.
#[derive(Debug, Clone)]
pub struct HeadConfig {
    /// Head frame in chassis space.
    pub origin: Pose,
    pub pan_min: f64,
    pub pan_max: f64,
    pub tilt_min: f64,
    pub tilt_max: f64,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            origin: Pose::with_heading(Vec3::new(0.0, 43.0, 70.0), 0.0),
            pan_min: -45.0,
            pan_max: 45.0,
            tilt_min: -20.0,
            tilt_max: 10.0,
        }
    }
}

pub struct HeadController {
    pan: Servo,
    tilt: Servo,
    config: HeadConfig,
}

impl HeadController {
    #[must_use]
    pub fn new(config: HeadConfig) -> Self {
        Self {
            pan: Servo::new(PAN_SERVO_ID),
            tilt: Servo::new(TILT_SERVO_ID),
            config,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(HeadConfig::default())
    }

    /// The pan/tilt angles that aim at a world-space point, after limits.
    fn aim(&self, state: &State, look_at: Vec3) -> (f64, f64) {
        // World -> chassis -> head-local, so the head origin is (0, 0, 0).
        let v = look_at
            .apply(&state.pose.to_local())
            .apply(&self.config.origin.to_local());

        let pan = -(v.x / v.z).atan().to_degrees();
        let tilt = -(v.y / v.z).atan().to_degrees();

        (
            pan.clamp(self.config.pan_min, self.config.pan_max),
            tilt.clamp(self.config.tilt_min, self.config.tilt_max),
        )
    }
}

impl Component for HeadController {
    fn name(&self) -> &'static str {
        "head"
    }

    fn boot(&mut self, _state: &mut State, bus: &mut Bus) -> Result<(), ControlError> {
        for servo in [&mut self.pan, &mut self.tilt] {
            servo.provision(bus)?;
            servo.set_moving_speed(bus, MOVE_SPEED)?;
            servo.set_torque_limit(bus, TORQUE_LIMIT)?;
        }
        Ok(())
    }

    fn tick(
        &mut self,
        _now: Instant,
        state: &mut State,
        bus: &mut Bus,
    ) -> Result<(), ControlError> {
        // No target: hold the last commanded position.
        let Some(look_at) = state.look_at else {
            return Ok(());
        };

        let (pan, tilt) = self.aim(state, look_at);
        self.pan.move_to(bus, pan)?;
        self.tilt.move_to(bus, tilt)?;
        Ok(())
    }

    fn shutdown(&mut self, bus: &mut Bus) -> Result<(), ControlError> {
        for servo in [&self.pan, &self.tilt] {
            servo.set_torque_enable(bus, false)?;
            servo.set_led(bus, false)?;
        }
        warn!("head powered off");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_bus::LoopbackTransport;

    fn harness() -> (HeadController, State, Bus, LoopbackTransport) {
        let transport = LoopbackTransport::new();
        let mut bus = Bus::new(Box::new(transport.clone()));
        let mut state = State::new();
        let mut head = HeadController::with_defaults();
        head.boot(&mut state, &mut bus).unwrap();
        (head, state, bus, transport)
    }

    #[test]
    fn dead_ahead_centers_both_axes() {
        let (head, state, _bus, _t) = harness();
        // A point straight out along the head's own Z.
        let (pan, tilt) = head.aim(&state, Vec3::new(0.0, 43.0, 1000.0));
        assert_relative_eq!(pan, 0.0, epsilon = 1e-9);
        assert_relative_eq!(tilt, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn target_to_the_right_pans_negative() {
        let (head, state, _bus, _t) = harness();
        let (pan, _tilt) = head.aim(&state, Vec3::new(500.0, 43.0, 500.0));
        assert_relative_eq!(pan, -45.0, epsilon = 1e-9);
    }

    #[test]
    fn target_above_tilts_negative_and_clamps() {
        let (head, state, _bus, _t) = harness();
        // 45 degrees up exceeds the -20 tilt limit.
        let (_pan, tilt) = head.aim(&state, Vec3::new(0.0, 543.0, 570.0));
        assert_relative_eq!(tilt, -20.0, epsilon = 1e-9);
    }

    #[test]
    fn aim_tracks_the_chassis_pose() {
        let (head, mut state, _bus, _t) = harness();
        // Turn the chassis so the target sits dead ahead of the head.
        state.pose.heading = 90.0;
        let (pan, _tilt) = head.aim(&state, Vec3::new(1000.0, 43.0, 0.0));
        assert_relative_eq!(pan, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn no_look_at_writes_nothing() {
        let (mut head, mut state, mut bus, transport) = harness();
        let before = transport.writes().len();
        head.tick(Instant::now(), &mut state, &mut bus).unwrap();
        assert_eq!(transport.writes().len(), before);
    }

    #[test]
    fn look_at_issues_buffered_goal_writes() {
        let (mut head, mut state, mut bus, mut transport) = harness();
        transport.clear_writes();

        state.look_at = Some(Vec3::new(100.0, 100.0, 1000.0));
        head.tick(Instant::now(), &mut state, &mut bus).unwrap();

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|w| w.buffered));
        assert_eq!(writes[0].id, PAN_SERVO_ID);
        assert_eq!(writes[1].id, TILT_SERVO_ID);
    }
}
