//! The gait table: per-leg, per-tick step phases for a cyclic walk.
//!
//! Each frame holds two ratios. `xz` is the interpolation fraction between
//! a foot's previous down-position and its next down-position; `y` is the
//! vertical lift as a fraction of the nominal step height. The table is
//! deterministic for a given `(ticks_per_step, group_size)` and immutable
//! once built, so one cycle can be replayed indefinitely.

use std::f64::consts::{E, PI};

use strider_core::error::ConfigError;

/// Number of legs the table is built for.
pub const LEG_COUNT: usize = 6;

/// How many legs lift together.
///
/// With six legs the only stable choices are one at a time (slow, maximum
/// stability), opposite pairs (the usual tripod-free compromise), or
/// alternating tripods (fastest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSize {
    One,
    Two,
    Three,
}

impl GroupSize {
    /// Validates a raw group size from configuration.
    pub fn from_raw(raw: usize) -> Result<Self, ConfigError> {
        match raw {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(ConfigError::InvalidGroupSize(other)),
        }
    }
}

/// One tick of one leg's step schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Interpolation fraction between the last and next foot down-position,
    /// in `[0, 1]`.
    pub xz: f64,
    /// Vertical lift as a fraction of the nominal step height, `>= 0`.
    pub y: f64,
}

/// A complete, immutable gait cycle.
#[derive(Debug, Clone)]
pub struct Gait {
    frames: [Vec<Frame>; LEG_COUNT],
    cycle_len: usize,
}

impl Gait {
    /// Builds the cycle table.
    ///
    /// The cycle is `ticks_per_step * 3` ticks long, so that with
    /// [`GroupSize::Two`] the three leg pairs get equal phases. Each leg's
    /// lift is a Gaussian centered on its group's slot; its travel is a
    /// cosine smoothstep across the same window.
    pub fn build(ticks_per_step: usize, group_size: GroupSize) -> Result<Self, ConfigError> {
        if ticks_per_step == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ticks_per_step",
                message: "must be > 0".into(),
            });
        }

        let cycle_len = ticks_per_step * 3;
        let centers = curve_centers(group_size, cycle_len);

        let frames = centers.map(|center| single_leg(cycle_len, ticks_per_step, center));

        Ok(Self { frames, cycle_len })
    }

    /// Number of ticks in one full cycle.
    #[must_use]
    pub const fn cycle_len(&self) -> usize {
        self.cycle_len
    }

    /// The frame for `leg` at tick `n` of the cycle.
    ///
    /// # Panics
    ///
    /// Panics if `leg >= LEG_COUNT` or `n >= cycle_len()`.
    #[must_use]
    pub fn frame(&self, leg: usize, n: usize) -> Frame {
        self.frames[leg][n]
    }
}

/// The tick at which each leg's step curve peaks.
///
/// Slots are laid out on a twelfths grid so the same cycle length serves
/// all three groupings:
///
/// ```text
/// group size 1:  centers at 1,3,5,7,9,11 twelfths (six groups)
/// group size 2:  centers at 2,6,10 twelfths        (three pairs)
/// group size 3:  centers at 3,9 twelfths           (two tripods)
/// ```
fn curve_centers(group_size: GroupSize, cycle_len: usize) -> [f64; LEG_COUNT] {
    let p = cycle_len as f64 / 12.0;
    match group_size {
        GroupSize::One => [1.0, 3.0, 5.0, 7.0, 9.0, 11.0].map(|s| p * s),
        GroupSize::Two => [2.0, 6.0, 10.0, 2.0, 6.0, 10.0].map(|s| p * s),
        GroupSize::Three => [3.0, 9.0, 3.0, 9.0, 3.0, 9.0].map(|s| p * s),
    }
}

fn single_leg(cycle_len: usize, ticks_per_step: usize, center: f64) -> Vec<Frame> {
    let tps = ticks_per_step as f64;
    let start = center - tps / 2.0;
    let end = center + tps / 2.0;

    (0..cycle_len)
        .map(|tick| {
            let i = tick as f64;

            // Lift is a Gaussian peaking at the curve center, with
            // full width at baseline of about one step.
            let y = 2f64.powf(-((i - center) * (E * 2.0 / tps)).powi(2));

            // Travel is a cosine smoothstep from 0 to 1 across the window.
            let xz = if i < start {
                0.0
            } else if i > end {
                1.0
            } else {
                0.5 - ((i - start) / tps * PI).cos() / 2.0
            };

            Frame { xz, y }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
