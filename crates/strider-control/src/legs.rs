//! The body state machine: standing up, walking a cyclic gait toward the
//! commanded pose, and sitting down for shutdown.
//!
//! Foot positions are kept in world space so they stay planted while the
//! chassis origin moves; they are transformed into chassis space at the
//! end of every tick when the goals go out to the legs.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use strider_bus::Bus;
use strider_core::error::ConfigError;
use strider_core::pose::Pose;
use strider_core::state::State;
use strider_core::vec::Vec3;
use strider_gait::{Gait, GroupSize};
use strider_legs::{Leg, LEG_COUNT, MOUNTS};

use crate::component::Component;
use crate::error::ControlError;

/// Legs power up one at a time in this order, alternating sides, so the
/// inrush current never hits the supply all at once.
const BOOT_ORDER: [usize; LEG_COUNT] = [0, 3, 1, 4, 2, 5];

/// Servo settings while the legs feel their way to the home posture.
const BOOT_MOVING_SPEED: u16 = 128;
const BOOT_TORQUE_LIMIT: u16 = 512;

/// Full-rate settings once the robot is standing on its feet.
const RUN_MOVING_SPEED: u16 = 1023;
const RUN_TORQUE_LIMIT: u16 = 1023;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Tunables for the walk. The defaults are the values the chassis was
/// dialed in with; change them together or not at all.
#[derive(Debug, Clone)]
pub struct LegsConfig {
    pub ticks_per_step: usize,
    pub group_size: GroupSize,
    /// Distance from the body to each foot's home position, mm.
    pub step_radius: f64,
    /// Peak foot lift during a step, mm.
    pub step_height: f64,
    /// Steps shorter than this are not worth taking, mm.
    pub min_step_distance: f64,
    /// Cap on how far the body may travel in one step cycle, mm.
    pub max_step_distance: f64,
    /// Vertical slew rate of the body, mm per tick.
    pub y_move_speed: f64,
    /// Bank/pitch slew rates, degrees per tick.
    pub bank_move_speed: f64,
    pub pitch_move_speed: f64,
    /// Total foot-position error at which boot is considered converged, mm.
    pub boot_tolerance: f64,
    /// Pause between powering up consecutive legs.
    pub boot_stagger: Duration,
    /// Interval between convergence polls, and how many to attempt.
    pub boot_poll_interval: Duration,
    pub boot_max_polls: usize,
}

impl Default for LegsConfig {
    fn default() -> Self {
        Self {
            ticks_per_step: 20,
            group_size: GroupSize::Two,
            step_radius: 220.0,
            step_height: 40.0,
            min_step_distance: 20.0,
            max_step_distance: 70.0,
            y_move_speed: 1.0,
            bank_move_speed: 1.0,
            pitch_move_speed: 1.0,
            boot_tolerance: 6.0,
            boot_stagger: Duration::from_millis(250),
            boot_poll_interval: Duration::from_millis(100),
            boot_max_polls: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// BodyState
// ---------------------------------------------------------------------------

/// Where the body is in its life cycle. Transitions are evaluated once
/// per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyState {
    /// Constructed, not yet booted.
    #[default]
    Default,
    /// Powering legs and converging on the home posture.
    Booting,
    /// Raising the body to the target clearance.
    StandUp,
    /// Walking the gait cycle toward the target pose.
    Stepping,
    /// Lowering the body to the ground.
    SitDown,
    /// On the ground, torque about to drop. Terminal.
    Halted,
}

// ---------------------------------------------------------------------------
// LegsController
// ---------------------------------------------------------------------------

pub struct LegsController {
    legs: [Leg; LEG_COUNT],
    gait: Gait,
    config: LegsConfig,

    body_state: BodyState,
    /// Ticks spent in the current state; 1 on the first tick after a
    /// transition.
    state_tick: usize,
    state_since: Option<Instant>,
    /// Set once boot converges; until then every tick is a no-op.
    ready: bool,

    /// Current, cycle-start, and cycle-end foot positions, world space.
    feet: [Vec3; LEG_COUNT],
    last_feet: [Vec3; LEG_COUNT],
    next_feet: [Vec3; LEG_COUNT],

    /// Chassis pose at the start of the current step cycle, and where the
    /// cycle is taking it.
    last_pose: Pose,
    step_target: Pose,
}

impl LegsController {
    pub fn new(config: LegsConfig) -> Result<Self, ConfigError> {
        let gait = Gait::build(config.ticks_per_step, config.group_size)?;
        Ok(Self {
            legs: MOUNTS.each_ref().map(Leg::new),
            gait,
            config,
            body_state: BodyState::Default,
            state_tick: 0,
            state_since: None,
            ready: false,
            feet: [Vec3::ZERO; LEG_COUNT],
            last_feet: [Vec3::ZERO; LEG_COUNT],
            next_feet: [Vec3::ZERO; LEG_COUNT],
            last_pose: Pose::default(),
            step_target: Pose::default(),
        })
    }

    #[must_use]
    pub const fn body_state(&self) -> BodyState {
        self.body_state
    }

    #[must_use]
    pub const fn ready(&self) -> bool {
        self.ready
    }

    /// Current world-space foot positions.
    #[must_use]
    pub const fn feet(&self) -> &[Vec3; LEG_COUNT] {
        &self.feet
    }

    pub fn legs(&self) -> &[Leg; LEG_COUNT] {
        &self.legs
    }

    fn set_state(&mut self, next: BodyState, now: Instant) {
        let dwell = self.state_since.map(|since| now.duration_since(since));
        debug!(from = ?self.body_state, to = ?next, ?dwell, "body state");
        self.body_state = next;
        self.state_tick = 0;
        self.state_since = Some(now);
    }

    /// Home position for one leg under a given chassis pose.
    fn home(&self, leg: usize, pose: &Pose) -> Vec3 {
        self.legs[leg].home_position(pose, self.config.step_radius)
    }

    /// Runs one tick of the state machine proper. The caller handles the
    /// epilogue (pose slewing and goal writes).
    fn step_state(&mut self, now: Instant, state: &mut State) {
        match self.body_state {
            BodyState::Default | BodyState::Booting | BodyState::Halted => {}

            BodyState::StandUp => {
                if state.shutdown() {
                    self.set_state(BodyState::SitDown, now);
                } else if (state.pose.position.y - state.target.position.y).abs() < 1.0 {
                    self.set_state(BodyState::Stepping, now);
                }
            }

            BodyState::Stepping => self.step_cycle(now, state),

            BodyState::SitDown => {
                // Force the body flat and down, whatever the input wants.
                state.target.position.y = 0.0;
                state.target.bank = 0.0;
                state.target.pitch = 0.0;

                if state.pose.position.y.abs() < 1.0 {
                    info!("seated; halting");
                    self.ready = false;
                    self.set_state(BodyState::Halted, now);
                }
            }
        }
    }

    /// One tick of the Stepping state.
    fn step_cycle(&mut self, now: Instant, state: &mut State) {
        let cycle_len = self.gait.cycle_len();

        if self.state_tick == 1 {
            // Cycle start: decide where this cycle takes the body.
            self.last_pose = state.pose;
            self.last_feet = self.feet;

            let mut to_goal = state.target.position - state.pose.position;
            to_goal.y = 0.0;
            let dist_to_step = to_goal.magnitude().min(self.config.max_step_distance);
            let heading_err = (state.target.heading - state.pose.heading).abs();

            if dist_to_step > self.config.min_step_distance || heading_err > 5.0 {
                self.step_target = Pose::with_heading(
                    self.last_pose.position + to_goal.unit() * dist_to_step,
                    state.target.heading,
                );
            } else {
                // Nothing worth doing: hold position and re-evaluate next
                // tick instead of marching in place. An idle cycle is a
                // completed cycle, so shutdown exits from here too.
                self.step_target = self.last_pose;
                for i in 0..LEG_COUNT {
                    self.next_feet[i] = self.home(i, &self.step_target);
                }
                if state.shutdown() {
                    self.set_state(BodyState::SitDown, now);
                } else {
                    self.set_state(BodyState::Stepping, now);
                }
                return;
            }

            for i in 0..LEG_COUNT {
                self.next_feet[i] = self.home(i, &self.step_target);
            }
        }

        // Advance the body and the feet along the cycle.
        let r = self.state_tick as f64 / cycle_len as f64;
        state.pose.position.x = self.last_pose.position.x
            + (self.step_target.position.x - self.last_pose.position.x) * r;
        state.pose.position.z = self.last_pose.position.z
            + (self.step_target.position.z - self.last_pose.position.z) * r;
        state.pose.heading = self.last_pose.heading
            + (self.step_target.heading - self.last_pose.heading) * r;

        for i in 0..LEG_COUNT {
            let frame = self.gait.frame(i, self.state_tick - 1);
            self.feet[i].y = self.config.step_height * frame.y;
            self.feet[i].x =
                self.last_feet[i].x + (self.next_feet[i].x - self.last_feet[i].x) * frame.xz;
            self.feet[i].z =
                self.last_feet[i].z + (self.next_feet[i].z - self.last_feet[i].z) * frame.xz;
        }

        if self.state_tick >= cycle_len {
            if state.shutdown() {
                self.set_state(BodyState::SitDown, now);
            } else {
                self.set_state(BodyState::Stepping, now);
            }
        }
    }

    /// Slews the vertical/bank/pitch components toward the target and
    /// pushes every foot goal out to the legs.
    fn epilogue(&mut self, state: &mut State, bus: &mut Bus) -> Result<(), ControlError> {
        state.pose.position.y = slew(
            state.pose.position.y,
            state.target.position.y,
            self.config.y_move_speed,
        );
        state.pose.bank = slew(state.pose.bank, state.target.bank, self.config.bank_move_speed);
        state.pose.pitch = slew(
            state.pose.pitch,
            state.target.pitch,
            self.config.pitch_move_speed,
        );

        let to_local = state.pose.to_local();
        for (i, leg) in self.legs.iter().enumerate() {
            leg.set_goal(bus, self.feet[i].apply(&to_local))?;
        }
        Ok(())
    }
}

fn slew(current: f64, target: f64, rate: f64) -> f64 {
    let delta = target - current;
    current + delta.clamp(-rate, rate)
}

impl Component for LegsController {
    fn name(&self) -> &'static str {
        "legs"
    }

    /// Powers the legs up gently, walks them to the home posture, and
    /// waits for the feet to physically arrive before declaring ready.
    fn boot(&mut self, state: &mut State, bus: &mut Bus) -> Result<(), ControlError> {
        self.body_state = BodyState::Booting;

        for (n, &i) in BOOT_ORDER.iter().enumerate() {
            let leg = &mut self.legs[i];
            info!(leg = leg.name, "powering up");
            for servo in leg.servos_mut() {
                servo.provision(bus)?;
                servo.set_moving_speed(bus, BOOT_MOVING_SPEED)?;
                servo.set_torque_limit(bus, BOOT_TORQUE_LIMIT)?;
            }
            if n + 1 < LEG_COUNT && !self.config.boot_stagger.is_zero() {
                std::thread::sleep(self.config.boot_stagger);
            }
        }

        // Send every foot to its home position for the boot pose. Goal
        // writes are buffered from provisioning onward, so one ACTION
        // commits the whole posture at once before the poll starts.
        for i in 0..LEG_COUNT {
            self.feet[i] = self.home(i, &state.pose);
        }
        let to_local = state.pose.to_local();
        for (i, leg) in self.legs.iter().enumerate() {
            leg.set_goal(bus, self.feet[i].apply(&to_local))?;
        }
        bus.action()?;

        // Poll until the feet have converged on their goals.
        let mut residual = f64::INFINITY;
        for poll in 0..self.config.boot_max_polls {
            residual = 0.0;
            for (i, leg) in self.legs.iter().enumerate() {
                let present = leg.present_position(bus)?;
                residual += present.distance(self.feet[i].apply(&to_local));
            }
            if residual < self.config.boot_tolerance {
                debug!(residual, polls = poll + 1, "boot converged");
                break;
            }
            std::thread::sleep(self.config.boot_poll_interval);
        }
        if residual >= self.config.boot_tolerance {
            return Err(ControlError::BootConvergence {
                residual,
                polls: self.config.boot_max_polls,
            });
        }

        // Converged: bring the joints up to full speed for the tick loop.
        for leg in &self.legs {
            for servo in leg.servos() {
                servo.set_moving_speed(bus, RUN_MOVING_SPEED)?;
                servo.set_torque_limit(bus, RUN_TORQUE_LIMIT)?;
            }
        }

        self.ready = true;
        self.set_state(BodyState::StandUp, Instant::now());
        info!("legs ready");
        Ok(())
    }

    fn tick(
        &mut self,
        now: Instant,
        state: &mut State,
        bus: &mut Bus,
    ) -> Result<(), ControlError> {
        if !self.ready {
            return Ok(());
        }

        self.state_tick += 1;
        self.step_state(now, state);

        if self.body_state != BodyState::Halted {
            self.epilogue(state, bus)?;
        }
        Ok(())
    }

    fn shutdown(&mut self, bus: &mut Bus) -> Result<(), ControlError> {
        for leg in &self.legs {
            for servo in leg.servos() {
                servo.set_torque_enable(bus, false)?;
                servo.set_led(bus, false)?;
            }
        }
        warn!("legs powered off");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use strider_bus::LoopbackTransport;

    fn test_config() -> LegsConfig {
        LegsConfig {
            boot_stagger: Duration::ZERO,
            boot_poll_interval: Duration::ZERO,
            ..LegsConfig::default()
        }
    }

    struct Harness {
        controller: LegsController,
        state: State,
        bus: Bus,
        transport: LoopbackTransport,
        now: Instant,
    }

    impl Harness {
        fn booted() -> Self {
            let transport = LoopbackTransport::new();
            let mut bus = Bus::new(Box::new(transport.clone()));
            let mut state = State::new();
            let mut controller = LegsController::new(test_config()).unwrap();
            controller.boot(&mut state, &mut bus).unwrap();
            Self {
                controller,
                state,
                bus,
                transport,
                now: Instant::now(),
            }
        }

        fn tick(&mut self) {
            self.now += Duration::from_millis(16);
            self.controller
                .tick(self.now, &mut self.state, &mut self.bus)
                .unwrap();
            self.bus.action().unwrap();
        }

        fn tick_n(&mut self, n: usize) {
            for _ in 0..n {
                self.tick();
            }
        }
    }

    #[test]
    fn boot_converges_and_reports_ready() {
        let harness = Harness::booted();
        assert!(harness.controller.ready());
        assert_eq!(harness.controller.body_state(), BodyState::StandUp);
        // Every foot starts at its home position on the ground.
        for foot in harness.controller.feet() {
            assert_eq!(foot.y, 0.0);
        }
    }

    #[test]
    fn boot_leaves_servos_at_full_speed() {
        let harness = Harness::booted();
        for leg in harness.controller.legs() {
            for servo in leg.servos() {
                assert_eq!(
                    harness
                        .transport
                        .table_byte(servo.id, strider_bus::registers::MOVING_SPEED),
                    Some((RUN_MOVING_SPEED & 0xFF) as u8)
                );
                assert!(servo.buffered());
            }
        }
    }

    #[test]
    fn stand_and_settle() {
        let mut harness = Harness::booted();
        harness.state.target.position.y = 40.0;

        harness.tick_n(41);

        assert!(
            (39.0..=41.0).contains(&harness.state.pose.position.y),
            "y = {}",
            harness.state.pose.position.y
        );
        assert_eq!(harness.controller.body_state(), BodyState::Stepping);
    }

    #[test]
    fn walk_forward() {
        let mut harness = Harness::booted();
        harness.state.target = Pose::with_heading(Vec3::new(0.0, 40.0, 200.0), 0.0);

        let cycle = harness.controller.gait.cycle_len();
        harness.tick_n(41 + cycle * 4);

        let z = harness.state.pose.position.z;
        assert!((195.0..=205.0).contains(&z), "z = {z}");
        // The body never overshoots sideways.
        assert!(harness.state.pose.position.x.abs() < 1.0);
    }

    #[test]
    fn walk_is_paced_by_max_step_distance() {
        let mut harness = Harness::booted();
        harness.state.target = Pose::with_heading(Vec3::new(0.0, 40.0, 1000.0), 0.0);

        let cycle = harness.controller.gait.cycle_len();
        harness.tick_n(41);
        let z0 = harness.state.pose.position.z;
        harness.tick_n(cycle);
        let z1 = harness.state.pose.position.z;

        let travelled = z1 - z0;
        assert!(
            travelled <= 70.0 + 1e-6,
            "one cycle travelled {travelled}mm"
        );
    }

    #[test]
    fn rotate_in_place() {
        let mut harness = Harness::booted();
        harness.state.target = Pose::with_heading(Vec3::new(0.0, 40.0, 0.0), 90.0);

        let cycle = harness.controller.gait.cycle_len();
        harness.tick_n(41 + cycle * 2);

        let heading = harness.state.pose.heading;
        assert!((89.0..=91.0).contains(&heading), "heading = {heading}");

        // Every foot within a step of its new home position.
        let pose = harness.state.pose;
        for (i, foot) in harness.controller.feet().iter().enumerate() {
            let home = harness.controller.home(i, &pose);
            let err = Vec3::new(foot.x, 0.0, foot.z).distance(home);
            assert!(err < 20.0, "leg {i}: {err}mm from home");
        }
    }

    #[test]
    fn shutdown_request_sits_down_and_halts() {
        let mut harness = Harness::booted();
        harness.state.target.position.y = 40.0;
        harness.tick_n(41);
        assert_eq!(harness.controller.body_state(), BodyState::Stepping);

        harness.state.request_shutdown();
        let cycle = harness.controller.gait.cycle_len();
        harness.tick_n(cycle + 41 + 1);

        assert_eq!(harness.controller.body_state(), BodyState::Halted);
        assert!(!harness.controller.ready());
        assert!(
            harness.state.pose.position.y.abs() <= 0.5,
            "y = {}",
            harness.state.pose.position.y
        );
    }

    #[test]
    fn shutdown_during_standup_goes_straight_to_sitdown() {
        let mut harness = Harness::booted();
        harness.state.target.position.y = 40.0;
        harness.tick_n(10);
        harness.state.request_shutdown();
        harness.tick();
        assert_eq!(harness.controller.body_state(), BodyState::SitDown);
    }

    #[test]
    fn sitdown_overrides_lean_targets() {
        let mut harness = Harness::booted();
        harness.state.target.position.y = 40.0;
        harness.tick_n(41);

        harness.state.target.bank = 10.0;
        harness.state.target.pitch = -10.0;
        harness.state.request_shutdown();
        let cycle = harness.controller.gait.cycle_len();
        harness.tick_n(cycle + 41 + 1);

        assert_eq!(harness.state.target.bank, 0.0);
        assert_eq!(harness.state.target.pitch, 0.0);
        assert!(harness.state.pose.bank.abs() < 1e-9);
        assert!(harness.state.pose.pitch.abs() < 1e-9);
    }

    #[test]
    fn halted_controller_stops_writing() {
        let mut harness = Harness::booted();
        harness.state.request_shutdown();
        harness.tick_n(60);
        assert_eq!(harness.controller.body_state(), BodyState::Halted);

        let mut transport = harness.transport.clone();
        transport.clear_writes();
        harness.tick_n(5);
        assert!(transport.writes().is_empty());
    }

    #[test]
    fn shutdown_disables_torque_everywhere() {
        let mut harness = Harness::booted();
        harness.controller.shutdown(&mut harness.bus).unwrap();
        for leg in harness.controller.legs() {
            for servo in leg.servos() {
                assert_eq!(
                    harness
                        .transport
                        .table_byte(servo.id, strider_bus::registers::TORQUE_ENABLE),
                    Some(0)
                );
            }
        }
    }

    #[test]
    fn idle_stepping_does_not_march() {
        let mut harness = Harness::booted();
        harness.state.target.position.y = 40.0;
        harness.tick_n(41);
        assert_eq!(harness.controller.body_state(), BodyState::Stepping);

        // Target reached; feet should stay planted through idle cycles.
        let feet_before = *harness.controller.feet();
        harness.tick_n(120);
        for (before, after) in feet_before.iter().zip(harness.controller.feet()) {
            assert!(before.distance(*after) < 1e-9);
        }
    }
}
