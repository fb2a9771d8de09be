//! Positions with orientation in a parent/child coordinate chain.
//!
//! A [`Pose`] is a position plus Heading/Pitch/Bank in **degrees** — the
//! only user-facing angular unit. Poses compose: the chassis pose lives in
//! world space, a leg frame lives in chassis space, and so on. Forward
//! kinematics is a fold of [`Pose::add`] over the segment chain, with no
//! mutable segment graph.

use std::fmt;

use crate::matrix::{EulerAngles, Matrix44};
use crate::vec::Vec3;

/// A position and orientation in the parent frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vec3,
    /// Rotation around Y, degrees.
    pub heading: f64,
    /// Rotation around X, degrees.
    pub pitch: f64,
    /// Rotation around Z, degrees.
    pub bank: f64,
}

impl Pose {
    #[must_use]
    pub const fn new(position: Vec3, heading: f64, pitch: f64, bank: f64) -> Self {
        Self {
            position,
            heading,
            pitch,
            bank,
        }
    }

    /// A pose with only a position and heading, the common case for frames
    /// that stay level.
    #[must_use]
    pub const fn with_heading(position: Vec3, heading: f64) -> Self {
        Self::new(position, heading, 0.0, 0.0)
    }

    fn euler(&self) -> EulerAngles {
        EulerAngles::from_degrees(self.heading, self.pitch, self.bank)
    }

    /// Matrix taking a vector in this pose's local frame to the parent
    /// frame.
    #[must_use]
    pub fn to_world(&self) -> Matrix44 {
        Matrix44::new(self.position, self.euler())
    }

    /// Matrix taking a vector in the parent frame to this pose's local
    /// frame.
    #[must_use]
    pub fn to_local(&self) -> Matrix44 {
        self.to_world().inverse()
    }

    /// Treats `child` as a pose expressed in this pose's local frame and
    /// returns it composed into the parent frame. Angles add componentwise.
    #[must_use]
    pub fn add(&self, child: Self) -> Self {
        Self {
            position: child.position.apply(&self.to_world()),
            heading: self.heading + child.heading,
            pitch: self.pitch + child.pitch,
            bank: self.bank + child.bank,
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose{{x={:+07.2} y={:+07.2} z={:+07.2} h={:+07.2} p={:+07.2} b={:+07.2}}}",
            self.position.x, self.position.y, self.position.z, self.heading, self.pitch, self.bank
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
