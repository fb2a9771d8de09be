// strider-control: everything that runs inside the tick.
//
// Components own their private state and are ticked in registration order
// against the shared `State` and the bus; the orchestrator flushes the
// buffered servo writes with one ACTION broadcast per tick.

pub mod component;
pub mod error;
pub mod head;
pub mod hid;
pub mod input;
pub mod legs;
pub mod orchestrator;
pub mod signal;
pub mod voltage;

pub use component::Component;
pub use error::ControlError;
pub use head::HeadController;
pub use input::{GamepadSnapshot, InputController, Latch, SharedGamepad, Stick};
pub use legs::{BodyState, LegsConfig, LegsController};
pub use orchestrator::Orchestrator;
pub use signal::{ShutdownFlag, SignalWatcher};
pub use voltage::VoltageMonitor;
