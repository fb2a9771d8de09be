//! The contract every tick participant implements.

use std::time::Instant;

use strider_bus::Bus;
use strider_core::state::State;

use crate::error::ControlError;

/// A participant in the tick loop.
///
/// The orchestrator boots components in registration order before the
/// first tick, then ticks them in that same order forever. Components get
/// exclusive access to the shared [`State`] and the bus for the duration
/// of their call; nothing runs concurrently within a tick.
pub trait Component: Send {
    fn name(&self) -> &'static str;

    /// One-time hardware setup, run before the loop starts. May block on
    /// serial round-trips.
    fn boot(&mut self, state: &mut State, bus: &mut Bus) -> Result<(), ControlError> {
        let _ = (state, bus);
        Ok(())
    }

    /// One frame of work. Must not block for I/O beyond buffered writes.
    fn tick(&mut self, now: Instant, state: &mut State, bus: &mut Bus)
        -> Result<(), ControlError>;

    /// Final power-down, run once after the loop ends. Errors are logged
    /// by the orchestrator, not propagated — every component gets its
    /// chance to power off.
    fn shutdown(&mut self, bus: &mut Bus) -> Result<(), ControlError> {
        let _ = bus;
        Ok(())
    }
}
