//! Bridges process signals into the shared state.
//!
//! The signal handler itself runs on its own thread and may only flip an
//! atomic; this component samples the atomic on the tick thread, keeping
//! the single-writer rule for [`State`] intact. A signal is therefore
//! observed at most one tick late.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use strider_bus::Bus;
use strider_core::state::State;

use crate::component::Component;
use crate::error::ControlError;

/// Cloneable flag for the signal handler to set.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tick component that latches the shared state's shutdown from the flag.
pub struct SignalWatcher {
    flag: ShutdownFlag,
    reported: bool,
}

impl SignalWatcher {
    #[must_use]
    pub fn new(flag: ShutdownFlag) -> Self {
        Self {
            flag,
            reported: false,
        }
    }
}

impl Component for SignalWatcher {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn tick(
        &mut self,
        _now: Instant,
        state: &mut State,
        _bus: &mut Bus,
    ) -> Result<(), ControlError> {
        if self.flag.raised() && !self.reported {
            info!("signal received; shutting down");
            state.request_shutdown();
            self.reported = true;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
