//! The strider control daemon.
//!
//! Wires the component stack onto the servo bus and runs the tick loop at
//! the target frame rate until a shutdown request (START button, low
//! battery, or a signal) lets the robot sit down and power off.
//!
//! Exit codes: 0 on a normal shutdown, 1 for a boot failure, 2 for a
//! fatal error in the main loop.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use strider_bus::{open_serial, Bus, LoopbackTransport, Servo, Transport};
use strider_control::{
    hid, HeadController, InputController, LegsConfig, LegsController, Orchestrator,
    SharedGamepad, ShutdownFlag, SignalWatcher, VoltageMonitor,
};
use strider_control::head::HeadConfig;
use strider_control::input::InputConfig;

/// Control daemon for the strider hexapod.
#[derive(Parser, Debug)]
#[command(name = "strider")]
#[command(about = "Six legs, one serial port")]
struct Args {
    /// Serial port for the servo bus.
    #[arg(long, default_value = "/dev/ttyACM0")]
    serial_port: String,

    /// Event device for the gamepad.
    #[arg(long, default_value = "/dev/input/event0")]
    controller_port: String,

    /// Target tick rate in frames per second.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Run against in-process fakes instead of hardware.
    #[arg(long)]
    offline: bool,

    /// Verbose logging, including serial traffic.
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let mut orchestrator = match build(&args) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!(error = ?e, "setup failed");
            return ExitCode::from(1);
        }
    };

    info!("booting");
    if let Err(e) = orchestrator.boot() {
        error!(error = %e, "boot failed");
        orchestrator.power_off();
        return ExitCode::from(1);
    }

    info!(fps = args.fps, "entering main loop");
    match orchestrator.run() {
        Ok(()) => {
            info!("shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::from(2),
    }
}

/// Opens the hardware (or its fakes) and assembles the component stack in
/// tick order: signals, input, legs, head, voltage.
fn build(args: &Args) -> Result<Orchestrator> {
    let transport: Box<dyn Transport> = if args.offline {
        info!("offline: using the loopback bus");
        Box::new(LoopbackTransport::new())
    } else {
        open_serial(&args.serial_port)
            .with_context(|| format!("opening servo bus on {}", args.serial_port))?
    };
    let bus = Bus::new(transport).with_debug(args.debug);

    let pad = SharedGamepad::new();
    if args.offline {
        info!("offline: gamepad disabled");
    } else {
        hid::spawn(&args.controller_port, pad.clone())
            .with_context(|| format!("opening gamepad on {}", args.controller_port))?;
    }

    let flag = ShutdownFlag::new();
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || handler_flag.raise())
        .context("installing the signal handler")?;

    let mut orchestrator = Orchestrator::new(bus, args.fps)?;
    orchestrator.register(Box::new(SignalWatcher::new(flag)));
    orchestrator.register(Box::new(InputController::new(
        pad,
        InputConfig {
            tick_hz: f64::from(args.fps),
            ..InputConfig::default()
        },
    )));
    orchestrator.register(Box::new(LegsController::new(LegsConfig::default())?));
    orchestrator.register(Box::new(HeadController::new(HeadConfig::default())));
    orchestrator.register(Box::new(VoltageMonitor::new(Servo::new(41))));
    Ok(orchestrator)
}
