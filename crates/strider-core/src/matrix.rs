//! 4x4 affine transforms and Euler angles.
//!
//! The convention is fixed once for the whole workspace: a vector `v` is a
//! row and transforms as `v . M`, so composition reads left to right —
//! `(v . a) . b == v . (a * b)`. Rotation occupies the upper-left 3x3 and
//! translation the fourth row.
//!
//! Euler angles are Heading (Y), Pitch (X), Bank (Z), applied in ZXY order
//! (Bank, then Pitch, then Heading). The sign convention is pinned by the
//! calibration test below: a 90 degree heading takes `(0, 0, 1)` to
//! `(1, 0, 0)`.

use std::fmt;
use std::ops::Mul;

use nalgebra::{Matrix4, RowVector4};

use crate::vec::Vec3;

// ---------------------------------------------------------------------------
// EulerAngles
// ---------------------------------------------------------------------------

/// A Heading/Pitch/Bank triple in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    /// Rotation around Y (yaw).
    pub heading: f64,
    /// Rotation around X.
    pub pitch: f64,
    /// Rotation around Z (roll).
    pub bank: f64,
}

impl EulerAngles {
    pub const IDENTITY: Self = Self {
        heading: 0.0,
        pitch: 0.0,
        bank: 0.0,
    };

    #[must_use]
    pub const fn new(heading: f64, pitch: f64, bank: f64) -> Self {
        Self {
            heading,
            pitch,
            bank,
        }
    }

    /// Build from degrees, the only user-facing angular unit.
    #[must_use]
    pub fn from_degrees(heading: f64, pitch: f64, bank: f64) -> Self {
        Self {
            heading: heading.to_radians(),
            pitch: pitch.to_radians(),
            bank: bank.to_radians(),
        }
    }
}

impl fmt::Display for EulerAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(h={:+.2} p={:+.2} b={:+.2})",
            self.heading.to_degrees(),
            self.pitch.to_degrees(),
            self.bank.to_degrees()
        )
    }
}

// ---------------------------------------------------------------------------
// Matrix44
// ---------------------------------------------------------------------------

/// A 4x4 affine transform over row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix44(Matrix4<f64>);

impl Matrix44 {
    #[must_use]
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    /// Build a transform that rotates by `ea` and then translates by `v`.
    ///
    /// The rotation is the ZXY product: a transformed vector sees Bank
    /// first, then Pitch, then Heading. This is what lets forward
    /// kinematics fold pose additions over a segment chain — pitch joints
    /// nest inside the heading of the joint that carries them.
    #[must_use]
    pub fn new(v: Vec3, ea: EulerAngles) -> Self {
        let (sy, cy) = ea.heading.sin_cos();
        let (sx, cx) = ea.pitch.sin_cos();
        let (sz, cz) = ea.bank.sin_cos();

        #[rustfmt::skip]
        let m = Matrix4::new(
            cz * cy + sz * sx * sy,  sz * cx,  -cz * sy + sz * sx * cy,  0.0,
            -sz * cy + cz * sx * sy, cz * cx,  sz * sy + cz * sx * cy,   0.0,
            cx * sy,                 -sx,      cx * cy,                  0.0,
            v.x,                     v.y,      v.z,                      1.0,
        );
        Self(m)
    }

    /// The full affine inverse.
    ///
    /// Every transform constructed by this crate is rotation + translation,
    /// so the inverse always exists.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self(
            self.0
                .try_inverse()
                .expect("affine transform is invertible"),
        )
    }

    /// Applies the transform to a point: `v' = v . M`.
    #[must_use]
    pub fn transform(&self, v: Vec3) -> Vec3 {
        let row = RowVector4::new(v.x, v.y, v.z, 1.0) * self.0;
        Vec3::new(row[0], row[1], row[2])
    }
}

impl Mul for Matrix44 {
    type Output = Self;

    /// Composes `a * b` such that `(v . a) . b == v . (a * b)`.
    fn mul(self, rhs: Self) -> Self {
        Self(self.0 * rhs.0)
    }
}

impl fmt::Display for Matrix44 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..4 {
            let row = self.0.row(r);
            writeln!(
                f,
                "[{:+.4} {:+.4} {:+.4} {:+.4}]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn assert_vec_eq(a: Vec3, b: Vec3, eps: f64) {
        assert_relative_eq!(a.x, b.x, epsilon = eps);
        assert_relative_eq!(a.y, b.y, epsilon = eps);
        assert_relative_eq!(a.z, b.z, epsilon = eps);
    }

    #[test]
    fn identity_construction() {
        let m = Matrix44::new(Vec3::ZERO, EulerAngles::IDENTITY);
        assert_eq!(m, Matrix44::identity());
    }

    #[test]
    fn translation_only() {
        let m = Matrix44::new(Vec3::new(10.0, 20.0, 30.0), EulerAngles::IDENTITY);
        let v = Vec3::new(1.0, 2.0, 3.0).apply(&m);
        assert_vec_eq(v, Vec3::new(11.0, 22.0, 33.0), 1e-12);
    }

    #[test]
    fn heading_calibration_identity() {
        // The sign convention for the whole workspace: heading 90 degrees
        // takes +Z to +X.
        let m = Matrix44::new(Vec3::ZERO, EulerAngles::from_degrees(90.0, 0.0, 0.0));
        let v = Vec3::new(0.0, 0.0, 1.0).apply(&m);
        assert_vec_eq(v, Vec3::new(1.0, 0.0, 0.0), 1e-12);
    }

    #[test]
    fn quarter_turns_are_exact_sign_flips() {
        let v = Vec3::new(0.0, 0.0, 1.0);
        for (deg, expected) in [
            (90.0, Vec3::new(1.0, 0.0, 0.0)),
            (180.0, Vec3::new(0.0, 0.0, -1.0)),
            (270.0, Vec3::new(-1.0, 0.0, 0.0)),
            (360.0, Vec3::new(0.0, 0.0, 1.0)),
        ] {
            let m = Matrix44::new(Vec3::ZERO, EulerAngles::from_degrees(deg, 0.0, 0.0));
            assert_vec_eq(v.apply(&m), expected, 1e-9);
        }
    }

    #[test]
    fn pitch_rotates_around_x() {
        let m = Matrix44::new(Vec3::ZERO, EulerAngles::from_degrees(0.0, 90.0, 0.0));
        let v = Vec3::new(0.0, 0.0, 1.0).apply(&m);
        // Pitch tips +Z toward -Y under this convention.
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y.abs(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn pitch_nests_inside_heading() {
        // The property forward kinematics relies on: building one matrix
        // from summed angles equals applying the pitch rotation first and
        // the heading rotation second.
        let combined = Matrix44::new(Vec3::ZERO, EulerAngles::from_degrees(35.0, 80.0, 0.0));
        let pitch = Matrix44::new(Vec3::ZERO, EulerAngles::from_degrees(0.0, 80.0, 0.0));
        let heading = Matrix44::new(Vec3::ZERO, EulerAngles::from_degrees(35.0, 0.0, 0.0));
        let v = Vec3::new(12.0, -7.0, 43.0);
        assert_vec_eq(v.apply(&combined), v.apply(&pitch).apply(&heading), 1e-9);
    }

    #[test]
    fn inverse_round_trip_random() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let m = Matrix44::new(
                Vec3::new(
                    rng.gen_range(-500.0..500.0),
                    rng.gen_range(-500.0..500.0),
                    rng.gen_range(-500.0..500.0),
                ),
                EulerAngles::from_degrees(
                    rng.gen_range(-180.0..180.0),
                    rng.gen_range(-90.0..90.0),
                    rng.gen_range(-180.0..180.0),
                ),
            );
            let v = Vec3::new(
                rng.gen_range(-300.0..300.0),
                rng.gen_range(-300.0..300.0),
                rng.gen_range(-300.0..300.0),
            );
            let back = v.apply(&m).apply(&m.inverse());
            assert_vec_eq(back, v, 1e-9);
        }
    }

    #[test]
    fn composition_is_associative() {
        let a = Matrix44::new(Vec3::new(1.0, 2.0, 3.0), EulerAngles::from_degrees(30.0, 0.0, 0.0));
        let b = Matrix44::new(Vec3::new(-4.0, 0.0, 9.0), EulerAngles::from_degrees(0.0, 45.0, 0.0));
        let c = Matrix44::new(Vec3::new(0.5, -1.0, 2.0), EulerAngles::from_degrees(0.0, 0.0, 60.0));
        let v = Vec3::new(7.0, -2.0, 11.0);
        let lhs = v.apply(&((a * b) * c));
        let rhs = v.apply(&(a * (b * c)));
        assert_vec_eq(lhs, rhs, 1e-9);
    }

    #[test]
    fn composition_matches_sequential_application() {
        let a = Matrix44::new(Vec3::new(5.0, 0.0, 0.0), EulerAngles::from_degrees(90.0, 0.0, 0.0));
        let b = Matrix44::new(Vec3::new(0.0, 0.0, 10.0), EulerAngles::IDENTITY);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_vec_eq(v.apply(&a).apply(&b), v.apply(&(a * b)), 1e-12);
    }
}
