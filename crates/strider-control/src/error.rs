//! Control-layer error taxonomy.

use thiserror::Error;

use strider_bus::BusError;
use strider_core::error::ConfigError;
use strider_legs::LegError;

/// Anything a component can fail with during boot or a tick.
///
/// Bus and kinematics failures are fatal: the orchestrator powers the
/// servos off and exits. [`LowVoltage`](Self::LowVoltage) is the one
/// non-fatal variant — the voltage monitor has already latched the
/// shutdown flag, so the orchestrator just logs it and lets the robot sit
/// down.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Leg(#[from] LegError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("low voltage: {0:.2}V")]
    LowVoltage(f64),

    #[error("boot did not converge: {residual:.1}mm residual after {polls} polls")]
    BootConvergence { residual: f64, polls: usize },
}
