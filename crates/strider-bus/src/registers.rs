//! Control-table addresses for the AX-series servos on the bus.

pub const RETURN_DELAY: u8 = 5;
pub const STATUS_RETURN_LEVEL: u8 = 16;
pub const TORQUE_ENABLE: u8 = 24;
pub const LED: u8 = 25;
pub const GOAL_POSITION: u8 = 30;
pub const MOVING_SPEED: u8 = 32;
pub const TORQUE_LIMIT: u8 = 34;
pub const PRESENT_POSITION: u8 = 36;
pub const PRESENT_VOLTAGE: u8 = 42;

/// Status return levels: 0 = never reply, 1 = reply to reads only,
/// 2 = reply to everything.
pub const RETURN_LEVEL_READS: u8 = 1;
