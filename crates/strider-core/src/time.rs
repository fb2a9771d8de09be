//! Frame-rate accounting and wall-clock rate limiting for the tick loop.

use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// FpsCounter
// ---------------------------------------------------------------------------

/// Counts frames over a one-second sliding window.
///
/// Call [`frame`](Self::frame) once per tick; the returned value is the
/// number of frames completed in the previous full window (zero until the
/// first window closes).
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    fps: u32,
}

impl FpsCounter {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0,
        }
    }

    /// Records one frame and returns the most recent full-window rate.
    pub fn frame(&mut self, now: Instant) -> u32 {
        self.frames += 1;
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.fps = self.frames;
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    #[must_use]
    pub const fn fps(&self) -> u32 {
        self.fps
    }
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Gates an action to at most once per interval.
///
/// The first call is always ready; the timestamp is updated on every ready
/// call, so a slow consumer drifts rather than bursts.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` if the interval has elapsed since the last ready call,
    /// updating the internal timestamp when it has.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
