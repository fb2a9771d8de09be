//! End-to-end scenarios on the loopback bus: the full component stack
//! wired through the orchestrator, ticked with synthetic time.

use std::time::{Duration, Instant};

use strider_bus::{registers, Bus, LoopbackTransport, Servo};
use strider_control::{
    HeadController, InputController, LegsConfig, LegsController, Orchestrator, SharedGamepad,
    VoltageMonitor,
};
use strider_control::head::HeadConfig;
use strider_control::input::InputConfig;

const TICK: Duration = Duration::from_millis(16);

struct Robot {
    orchestrator: Orchestrator,
    transport: LoopbackTransport,
    pad: SharedGamepad,
    now: Instant,
}

impl Robot {
    fn boot(volts: f64) -> Self {
        let mut transport = LoopbackTransport::new();
        transport.set_voltage(volts);
        let bus = Bus::new(Box::new(transport.clone()));

        let pad = SharedGamepad::new();
        let legs_config = LegsConfig {
            boot_stagger: Duration::ZERO,
            boot_poll_interval: Duration::ZERO,
            ..LegsConfig::default()
        };

        let mut orchestrator = Orchestrator::new(bus, 60).unwrap();
        orchestrator.register(Box::new(InputController::new(
            pad.clone(),
            InputConfig::default(),
        )));
        orchestrator.register(Box::new(LegsController::new(legs_config).unwrap()));
        orchestrator.register(Box::new(HeadController::new(HeadConfig::default())));
        orchestrator.register(Box::new(VoltageMonitor::new(Servo::new(41))));
        orchestrator.boot().unwrap();

        Self {
            orchestrator,
            transport,
            pad,
            now: Instant::now(),
        }
    }

    fn tick(&mut self) {
        self.now += TICK;
        self.orchestrator.tick(self.now).unwrap();
    }

    fn tick_n(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }
}

#[test]
fn stands_up_to_the_commanded_clearance() {
    let mut robot = Robot::boot(11.1);

    // The input controller maintains the default 40mm clearance target;
    // the legs controller raises the body to it.
    robot.tick_n(60);
    let y = robot.orchestrator.state().pose.position.y;
    assert!((39.0..=41.0).contains(&y), "y = {y}");
}

#[test]
fn walks_forward_on_stick_input() {
    let mut robot = Robot::boot(11.1);
    robot.tick_n(60); // stand

    // Hold the left stick fully forward for twenty seconds of ticks.
    robot
        .pad
        .publish(|p| p.left_stick = strider_control::Stick { x: 0, y: -127 });
    robot.tick_n(20 * 60);

    let z = robot.orchestrator.state().pose.position.z;
    assert!(z > 100.0, "walked only {z}mm");
    // The target advances ~1.67mm per tick; the body never outruns it.
    assert!(z <= robot.orchestrator.state().target.position.z + 1e-6);
}

#[test]
fn one_action_flush_per_tick_while_walking() {
    let mut robot = Robot::boot(11.1);
    let after_boot = robot.transport.action_count();

    robot.tick_n(100);
    assert_eq!(robot.transport.action_count(), after_boot + 100);
}

#[test]
fn start_button_shuts_the_robot_down() {
    let mut robot = Robot::boot(11.1);
    robot.tick_n(60); // standing

    robot.pad.publish(|p| p.start = true);

    // One cycle to finish, forty ticks to sit, then the pose must hold on
    // the ground while the grace period plays out.
    robot.tick_n(60 + 41 + 10);

    let state = robot.orchestrator.state();
    assert!(state.shutdown());
    assert!(
        state.pose.position.y.abs() <= 0.5,
        "y = {}",
        state.pose.position.y
    );

    // The orchestrator powers everything off after the loop; do it
    // explicitly here since we tick by hand.
    robot.orchestrator.power_off();
    for base in [10, 20, 30, 40, 50, 60] {
        for joint in 1..=4 {
            assert_eq!(
                robot
                    .transport
                    .table_byte(base + joint, registers::TORQUE_ENABLE),
                Some(0),
                "servo {} still powered",
                base + joint
            );
        }
    }
    for head in [71, 72] {
        assert_eq!(
            robot.transport.table_byte(head, registers::TORQUE_ENABLE),
            Some(0)
        );
    }
}

#[test]
fn low_battery_triggers_a_graceful_shutdown() {
    let mut robot = Robot::boot(9.5);
    robot.tick_n(60);

    // The first voltage check latched shutdown; the body ends up seated.
    assert!(robot.orchestrator.state().shutdown());

    robot.tick_n(120);
    let y = robot.orchestrator.state().pose.position.y;
    assert!(y.abs() <= 0.5, "y = {y}");
}

#[test]
fn look_at_point_drives_the_head_with_the_tick_flush() {
    let mut robot = Robot::boot(11.1);
    robot.tick_n(60);

    robot
        .pad
        .publish(|p| p.right_stick = strider_control::Stick { x: 127, y: 0 });
    robot.tick();

    assert!(robot.orchestrator.state().look_at.is_some());
    // Pan swung toward the target and was committed by the tick's ACTION.
    let pan_goal = robot.transport.goal(71).unwrap();
    assert_ne!(pan_goal, 512);
}

#[test]
fn walking_keeps_feet_reachable() {
    // Drive hard diagonally and spin at the same time; every tick must
    // produce solvable leg goals (set_goal errors would fail the tick).
    let mut robot = Robot::boot(11.1);
    robot.tick_n(60);
    robot.pad.publish(|p| {
        p.left_stick = strider_control::Stick { x: 100, y: -100 };
        p.r2 = 255;
    });
    robot.tick_n(10 * 60);

    let state = robot.orchestrator.state();
    assert!(state.pose.position.magnitude() > 50.0);
    assert!(state.pose.heading > 10.0);
}

#[test]
fn fps_counter_reaches_the_state() {
    let mut robot = Robot::boot(11.1);
    // 16ms synthetic ticks: ~62 frames fill the one-second window.
    robot.tick_n(70);
    let fps = robot.orchestrator.state().fps;
    assert!(fps >= 60, "fps = {fps}");
}
