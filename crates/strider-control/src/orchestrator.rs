//! The tick loop: owns the shared state and the bus, drives every
//! component in registration order, and commits the buffered servo writes
//! with exactly one ACTION broadcast per tick.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use strider_bus::Bus;
use strider_core::error::ConfigError;
use strider_core::state::State;
use strider_core::time::{FpsCounter, RateLimiter};

use crate::component::Component;
use crate::error::ControlError;

/// How long the loop keeps ticking after shutdown latches, so the legs
/// can finish sitting down before torque drops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Minimum seconds between "running slow" warnings.
const FPS_WARN_INTERVAL: Duration = Duration::from_secs(5);

pub struct Orchestrator {
    bus: Mutex<Bus>,
    state: State,
    components: Vec<Box<dyn Component>>,
    target_fps: u32,
    period: Duration,
    fps: FpsCounter,
    fps_warning: RateLimiter,
    grace: Duration,
}

impl Orchestrator {
    pub fn new(bus: Bus, target_fps: u32) -> Result<Self, ConfigError> {
        if target_fps == 0 {
            return Err(ConfigError::InvalidFps(target_fps));
        }
        Ok(Self {
            bus: Mutex::new(bus),
            state: State::new(),
            components: Vec::new(),
            target_fps,
            period: Duration::from_secs(1) / target_fps,
            fps: FpsCounter::new(Instant::now()),
            fps_warning: RateLimiter::new(FPS_WARN_INTERVAL),
            grace: SHUTDOWN_GRACE,
        })
    }

    /// Registration order is execution order, every tick.
    pub fn register(&mut self, component: Box<dyn Component>) {
        self.components.push(component);
    }

    #[must_use]
    pub const fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    fn lock_bus(bus: &Mutex<Bus>) -> std::sync::MutexGuard<'_, Bus> {
        bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Boots every component in order, then flushes the bus once.
    pub fn boot(&mut self) -> Result<(), ControlError> {
        let mut bus = Self::lock_bus(&self.bus);
        for component in &mut self.components {
            info!(component = component.name(), "booting");
            component.boot(&mut self.state, &mut bus)?;
        }
        bus.action()?;
        Ok(())
    }

    /// One tick: every component in order, then one ACTION flush.
    pub fn tick(&mut self, now: Instant) -> Result<(), ControlError> {
        let mut bus = Self::lock_bus(&self.bus);

        self.state.fps = self.fps.frame(now);

        for component in &mut self.components {
            match component.tick(now, &mut self.state, &mut bus) {
                Ok(()) => {}
                // Non-fatal by design: shutdown is already latched, the
                // robot sits down on its own.
                Err(ControlError::LowVoltage(volts)) => {
                    warn!(volts, "low battery; letting the shutdown play out");
                }
                Err(e) => {
                    error!(component = component.name(), error = %e, "tick failed");
                    return Err(e);
                }
            }
        }

        if self.state.fps > 0
            && self.state.fps < self.target_fps
            && self.fps_warning.ready(now)
        {
            warn!(
                fps = self.state.fps,
                target = self.target_fps,
                "running below target frame rate"
            );
        }

        bus.action()?;
        Ok(())
    }

    /// Runs the loop at the target rate until the shutdown grace period
    /// expires or a tick fails. The servos are powered off either way.
    pub fn run(&mut self) -> Result<(), ControlError> {
        let result = self.run_loop();
        if let Err(e) = &result {
            error!(error = %e, "main loop failed");
        }
        self.power_off();
        result
    }

    fn run_loop(&mut self) -> Result<(), ControlError> {
        let mut shutdown_at: Option<Instant> = None;

        loop {
            let tick_start = Instant::now();
            self.tick(tick_start)?;

            if self.state.shutdown() {
                let since = *shutdown_at.get_or_insert(tick_start);
                if tick_start.duration_since(since) >= self.grace {
                    info!("shutdown grace period over");
                    return Ok(());
                }
            }

            let took = tick_start.elapsed();
            if took < self.period {
                spin_sleep::sleep(self.period - took);
            }
        }
    }

    /// Disables torque and LEDs on every servo, via each component.
    pub fn power_off(&mut self) {
        let mut bus = Self::lock_bus(&self.bus);
        for component in &mut self.components {
            if let Err(e) = component.shutdown(&mut bus) {
                // Keep going: every component gets a chance to power off.
                error!(component = component.name(), error = %e, "power-off failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
