// strider-bus: the serial bus that drives the robot's smart servos.
//
// The bus speaks the classic two-header-byte instruction protocol at 1 Mbps
// 8N1. Goal-position writes are buffered at the servo (REG_WRITE) and
// committed atomically by the ACTION broadcast, which the orchestrator
// issues exactly once per tick.

pub mod bus;
pub mod loopback;
pub mod protocol;
pub mod registers;
pub mod servo;
pub mod transport;

pub use bus::{Bus, BusError};
pub use loopback::LoopbackTransport;
pub use protocol::ProtocolError;
pub use servo::Servo;
pub use transport::{open_serial, Transport};
