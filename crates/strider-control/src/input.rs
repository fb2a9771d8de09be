//! Gamepad input mapping.
//!
//! A background reader (see [`crate::hid`]) publishes the latest pad
//! state into a shared snapshot; the input controller samples it once per
//! tick and turns it into updates to the shared [`State`]. Nothing here
//! touches the bus.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::info;

use strider_bus::Bus;
use strider_core::pose::Pose;
use strider_core::state::State;
use strider_core::vec::Vec3;

use crate::component::Component;
use crate::error::ControlError;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One analog stick, each axis in `[-127, 127]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stick {
    pub x: i16,
    pub y: i16,
}

/// The latest known state of the pad.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadSnapshot {
    pub left_stick: Stick,
    pub right_stick: Stick,
    /// Analog triggers, `0..=255`.
    pub l2: u8,
    pub r2: u8,
    /// Pressure-sensitive D-pad, `0..=255`.
    pub dpad_up: u8,
    pub dpad_down: u8,
    pub start: bool,
    pub select: bool,
    pub ps: bool,
    /// Accelerometer orientation, each axis in `[-1, 1]`.
    pub orientation: [f64; 3],
}

/// Mutex-protected snapshot shared between the reader thread and the tick
/// thread.
#[derive(Debug, Clone, Default)]
pub struct SharedGamepad(Arc<Mutex<GamepadSnapshot>>);

impl SharedGamepad {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates the snapshot in place; called from the reader thread.
    pub fn publish(&self, update: impl FnOnce(&mut GamepadSnapshot)) {
        let mut guard = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        update(&mut guard);
    }

    /// Copies out the latest snapshot; called from the tick thread.
    #[must_use]
    pub fn sample(&self) -> GamepadSnapshot {
        *self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Latch
// ---------------------------------------------------------------------------

/// Rising-edge detector for a single button.
#[derive(Debug, Clone, Copy, Default)]
pub struct Latch {
    previous: bool,
}

impl Latch {
    /// True exactly once per press: on the tick the input goes high.
    pub fn step(&mut self, current: bool) -> bool {
        let rising = current && !self.previous;
        self.previous = current;
        rising
    }
}

// ---------------------------------------------------------------------------
// InputController
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Target translation speed at full stick, mm/s.
    pub move_speed: f64,
    /// Target rotation speed at full trigger, degrees/s.
    pub rot_speed: f64,
    /// Initial body clearance, mm, and the D-pad increment.
    pub clearance: f64,
    pub clearance_step: f64,
    /// Pitch/bank range in orientation mode, degrees at full tilt.
    pub orientation_scale: f64,
    /// Look-at geometry: how far ahead the camera focuses and how far the
    /// right stick swings the point, mm.
    pub focal_distance: f64,
    pub look_h_scale: f64,
    pub look_v_scale: f64,
    /// Lens height above the chassis origin, mm: head origin plus lens
    /// offset.
    pub focal_vertical_offset: f64,
    /// The tick rate the per-tick deltas are derived from.
    pub tick_hz: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            move_speed: 100.0,
            rot_speed: 15.0,
            clearance: 40.0,
            clearance_step: 10.0,
            orientation_scale: 15.0,
            focal_distance: 500.0,
            look_h_scale: 300.0,
            look_v_scale: 200.0,
            focal_vertical_offset: 43.0 + 34.5,
            tick_hz: 60.0,
        }
    }
}

pub struct InputController {
    pad: SharedGamepad,
    config: InputConfig,
    clearance: f64,
    orientation_mode: bool,
    up_latch: Latch,
    down_latch: Latch,
    ps_latch: Latch,
    start_latch: Latch,
}

impl InputController {
    #[must_use]
    pub fn new(pad: SharedGamepad, config: InputConfig) -> Self {
        let clearance = config.clearance;
        Self {
            pad,
            config,
            clearance,
            orientation_mode: false,
            up_latch: Latch::default(),
            down_latch: Latch::default(),
            ps_latch: Latch::default(),
            start_latch: Latch::default(),
        }
    }

    #[must_use]
    pub const fn clearance(&self) -> f64 {
        self.clearance
    }

    #[must_use]
    pub const fn orientation_mode(&self) -> bool {
        self.orientation_mode
    }
}

fn axis(raw: i16) -> f64 {
    f64::from(raw) / 127.0
}

impl Component for InputController {
    fn name(&self) -> &'static str {
        "input"
    }

    fn tick(
        &mut self,
        _now: Instant,
        state: &mut State,
        _bus: &mut Bus,
    ) -> Result<(), ControlError> {
        let pad = self.pad.sample();
        let per_tick = 1.0 / self.config.tick_hz;

        // Left stick: walk in the body frame. Pulling the stick down is
        // forward, so Y is negated.
        let step = Vec3::new(
            axis(pad.left_stick.x) * self.config.move_speed * per_tick,
            0.0,
            -axis(pad.left_stick.y) * self.config.move_speed * per_tick,
        );
        if !step.is_zero() {
            let forward = Pose::with_heading(state.target.position, state.pose.heading);
            state.target.position = step.apply(&forward.to_world());
        }

        // Triggers: turn. R2 clockwise, L2 counter-clockwise.
        let turn = (f64::from(pad.r2) - f64::from(pad.l2)) / 255.0;
        state.target.heading += turn * self.config.rot_speed * per_tick;

        // D-pad edges: body clearance up and down in fixed steps.
        if self.up_latch.step(pad.dpad_up > 0) {
            self.clearance += self.config.clearance_step;
        }
        if self.down_latch.step(pad.dpad_down > 0) {
            self.clearance -= self.config.clearance_step;
        }
        state.target.position.y = self.clearance;

        // PS button toggles driving the lean from the pad's accelerometer.
        if self.ps_latch.step(pad.ps) {
            self.orientation_mode = !self.orientation_mode;
            state.look_at = None;
            info!(on = self.orientation_mode, "orientation mode");
        }
        if self.orientation_mode {
            state.target.pitch = pad.orientation[2] * self.config.orientation_scale;
            state.target.bank = pad.orientation[0] * self.config.orientation_scale;
        } else {
            state.target.pitch = 0.0;
            state.target.bank = 0.0;
        }

        // Right stick: swing the look-at point around a spot ahead of the
        // lens. Heading only; the camera line stays level when the body
        // leans.
        if pad.right_stick.x != 0 || pad.right_stick.y != 0 {
            let local = Vec3::new(
                axis(pad.right_stick.x) * self.config.look_h_scale,
                -axis(pad.right_stick.y) * self.config.look_v_scale
                    + self.config.focal_vertical_offset,
                self.config.focal_distance,
            );
            let level = Pose::with_heading(state.pose.position, state.pose.heading);
            state.look_at = Some(local.apply(&level.to_world()));
        }

        // Start: request shutdown, once.
        if self.start_latch.step(pad.start) && !state.shutdown() {
            info!("start pressed; shutting down");
            state.request_shutdown();
        }

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
    use strider_bus::{Bus, LoopbackTransport};

    fn harness() -> (InputController, SharedGamepad, State, Bus) {
        let pad = SharedGamepad::new();
        let controller = InputController::new(pad.clone(), InputConfig::default());
        let bus = Bus::new(Box::new(LoopbackTransport::new()));
        (controller, pad, State::new(), bus)
    }

    fn tick(controller: &mut InputController, state: &mut State, bus: &mut Bus) {
        controller.tick(Instant::now(), state, bus).unwrap();
    }

    #[test]
    fn latch_fires_once_per_rising_edge() {
        let mut latch = Latch::default();
        assert!(!latch.step(false));
        assert!(latch.step(true));
        assert!(!latch.step(true));
        assert!(!latch.step(false));
        assert!(latch.step(true));
    }

    #[test]
    fn idle_pad_only_sets_clearance() {
        let (mut controller, _pad, mut state, mut bus) = harness();
        tick(&mut controller, &mut state, &mut bus);
        assert_eq!(state.target.position.y, 40.0);
        assert_eq!(state.target.position.x, 0.0);
        assert_eq!(state.target.heading, 0.0);
        assert!(state.look_at.is_none());
        assert!(!state.shutdown());
    }

    #[test]
    fn left_stick_pulled_down_walks_forward() {
        let (mut controller, pad, mut state, mut bus) = harness();
        pad.publish(|p| p.left_stick = Stick { x: 0, y: -127 });
        tick(&mut controller, &mut state, &mut bus);
        // 100mm/s at 60Hz.
        assert_relative_eq!(state.target.position.z, 100.0 / 60.0, epsilon = 1e-9);
        assert_relative_eq!(state.target.position.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn walk_command_follows_the_body_heading() {
        let (mut controller, pad, mut state, mut bus) = harness();
        state.pose.heading = 90.0;
        pad.publish(|p| p.left_stick = Stick { x: 0, y: -127 });
        tick(&mut controller, &mut state, &mut bus);
        // Forward in the body frame is +X in the world after a 90 degree
        // turn.
        assert_relative_eq!(state.target.position.x, 100.0 / 60.0, epsilon = 1e-9);
        assert_relative_eq!(state.target.position.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn triggers_steer_the_heading() {
        let (mut controller, pad, mut state, mut bus) = harness();
        pad.publish(|p| p.r2 = 255);
        tick(&mut controller, &mut state, &mut bus);
        assert_relative_eq!(state.target.heading, 15.0 / 60.0, epsilon = 1e-9);

        pad.publish(|p| {
            p.r2 = 0;
            p.l2 = 255;
        });
        tick(&mut controller, &mut state, &mut bus);
        assert_relative_eq!(state.target.heading, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn dpad_steps_clearance_on_edges_only() {
        let (mut controller, pad, mut state, mut bus) = harness();
        pad.publish(|p| p.dpad_up = 200);
        // Held for three ticks: one step.
        tick(&mut controller, &mut state, &mut bus);
        tick(&mut controller, &mut state, &mut bus);
        tick(&mut controller, &mut state, &mut bus);
        assert_eq!(state.target.position.y, 50.0);

        pad.publish(|p| p.dpad_up = 0);
        tick(&mut controller, &mut state, &mut bus);
        pad.publish(|p| p.dpad_up = 180);
        tick(&mut controller, &mut state, &mut bus);
        assert_eq!(state.target.position.y, 60.0);

        pad.publish(|p| {
            p.dpad_up = 0;
            p.dpad_down = 255;
        });
        tick(&mut controller, &mut state, &mut bus);
        assert_eq!(state.target.position.y, 50.0);
    }

    #[test]
    fn ps_toggles_orientation_mode() {
        let (mut controller, pad, mut state, mut bus) = harness();
        pad.publish(|p| {
            p.ps = true;
            p.orientation = [0.5, 0.0, -0.4];
        });
        tick(&mut controller, &mut state, &mut bus);
        assert!(controller.orientation_mode());
        assert_relative_eq!(state.target.bank, 7.5, epsilon = 1e-9);
        assert_relative_eq!(state.target.pitch, -6.0, epsilon = 1e-9);

        // Toggle off: lean snaps back to level.
        pad.publish(|p| p.ps = false);
        tick(&mut controller, &mut state, &mut bus);
        pad.publish(|p| p.ps = true);
        tick(&mut controller, &mut state, &mut bus);
        assert!(!controller.orientation_mode());
        assert_eq!(state.target.pitch, 0.0);
        assert_eq!(state.target.bank, 0.0);
    }

    #[test]
    fn right_stick_sets_and_holds_look_at() {
        let (mut controller, pad, mut state, mut bus) = harness();
        pad.publish(|p| p.right_stick = Stick { x: 0, y: 0 });
        tick(&mut controller, &mut state, &mut bus);
        assert!(state.look_at.is_none());

        pad.publish(|p| p.right_stick = Stick { x: 127, y: 0 });
        tick(&mut controller, &mut state, &mut bus);
        let look = state.look_at.unwrap();
        assert_relative_eq!(look.x, 300.0, epsilon = 1e-9);
        assert_relative_eq!(look.z, 500.0, epsilon = 1e-9);
        assert_relative_eq!(look.y, 77.5, epsilon = 1e-9);

        // Stick released: the head keeps looking where it was.
        pad.publish(|p| p.right_stick = Stick { x: 0, y: 0 });
        tick(&mut controller, &mut state, &mut bus);
        assert_eq!(state.look_at, Some(look));
    }

    #[test]
    fn start_requests_shutdown_once() {
        let (mut controller, pad, mut state, mut bus) = harness();
        pad.publish(|p| p.start = true);
        tick(&mut controller, &mut state, &mut bus);
        assert!(state.shutdown());
        // Still held: stays shut down, no panic, no un-shutdown.
        tick(&mut controller, &mut state, &mut bus);
        assert!(state.shutdown());
    }

    #[test]
    fn snapshot_round_trips_through_the_shared_pad() {
        let pad = SharedGamepad::new();
        pad.publish(|p| {
            p.left_stick = Stick { x: 5, y: -9 };
            p.start = true;
        });
        let snap = pad.sample();
        assert_eq!(snap.left_stick, Stick { x: 5, y: -9 });
        assert!(snap.start);
    }
}
