// strider-legs: the four-joint legs and the geometry that drives them.

pub mod layout;
pub mod leg;

pub use layout::{LegMount, LEG_COUNT, MOUNTS};
pub use leg::{IkError, IkTrace, JointAngles, Leg, LegError};
