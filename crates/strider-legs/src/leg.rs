//! One leg: four servos, forward kinematics, and the closed-form solver
//! that turns a chassis-space foot target into joint angles.

use std::fmt;

use thiserror::Error;
use tracing::error;

use strider_bus::{Bus, BusError, Servo};
use strider_core::pose::Pose;
use strider_core::vec::Vec3;

use crate::layout::{
    LegMount, COXA_OFFSET_Y, COXA_OFFSET_Z, FEMUR_LENGTH, TARSUS_LENGTH, TARSUS_TRIM_DEG,
    TIBIA_LENGTH,
};

/// Reference distance below the coxa end used to anchor the angle
/// decomposition. Any fixed drop works; 50mm keeps the triangles well
/// conditioned across the workspace.
const ANCHOR_DROP: f64 = 50.0;

/// The four joint angles of a leg, in degrees, outward from the body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointAngles {
    pub coxa: f64,
    pub femur: f64,
    pub tibia: f64,
    pub tarsus: f64,
}

/// Every length and angle the solver computed on the way to a failure.
/// Logged whole, so an unreachable target can be diagnosed from one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkTrace {
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub g: f64,
    pub aa: f64,
    pub bb: f64,
    pub cc: f64,
    pub dd: f64,
    pub ee: f64,
    pub hh: f64,
}

impl fmt::Display for IkTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "d={:.2} e={:.2} f={:.2} g={:.2} aa={:.2} bb={:.2} cc={:.2} dd={:.2} ee={:.2} hh={:.2}",
            self.d, self.e, self.f, self.g, self.aa, self.bb, self.cc, self.dd, self.ee, self.hh
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IkError {
    /// The target cannot be reached; no joint was commanded. This means a
    /// caller asked for something geometrically impossible, which is a bug
    /// upstream, not a runtime condition to retry.
    #[error("{leg}: unreachable target {target}: {trace}")]
    UnreachableTarget {
        leg: &'static str,
        target: Vec3,
        trace: IkTrace,
    },
}

#[derive(Debug, Error)]
pub enum LegError {
    #[error(transparent)]
    Ik(#[from] IkError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// One leg of the hexapod.
#[derive(Debug, Clone)]
pub struct Leg {
    pub name: &'static str,
    origin: Vec3,
    /// Mounting heading, degrees: the direction the leg points at zero
    /// coxa angle.
    heading: f64,
    pub coxa: Servo,
    pub femur: Servo,
    pub tibia: Servo,
    pub tarsus: Servo,
}

impl Leg {
    #[must_use]
    pub fn new(mount: &LegMount) -> Self {
        Self {
            name: mount.name,
            origin: mount.origin,
            heading: mount.heading,
            coxa: Servo::new(mount.base_id + 1),
            femur: Servo::new(mount.base_id + 2),
            tibia: Servo::new(mount.base_id + 3),
            tarsus: Servo::new(mount.base_id + 4),
        }
    }

    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    #[must_use]
    pub const fn mounting_heading(&self) -> f64 {
        self.heading
    }

    pub fn servos(&self) -> [&Servo; 4] {
        [&self.coxa, &self.femur, &self.tibia, &self.tarsus]
    }

    pub fn servos_mut(&mut self) -> [&mut Servo; 4] {
        [
            &mut self.coxa,
            &mut self.femur,
            &mut self.tibia,
            &mut self.tarsus,
        ]
    }

    /// The leg's root frame in chassis space.
    fn frame(&self) -> Pose {
        Pose::with_heading(self.origin, self.heading)
    }

    /// Where the coxa segment ends for a given coxa angle, in chassis
    /// space.
    fn coxa_end(&self, coxa_deg: f64) -> Vec3 {
        self.frame()
            .add(Pose::with_heading(Vec3::ZERO, coxa_deg))
            .add(Pose::with_heading(
                Vec3::new(0.0, COXA_OFFSET_Y, COXA_OFFSET_Z),
                0.0,
            ))
            .position
    }

    /// Foot position in chassis space for the given joint angles.
    ///
    /// A fold of pose additions over the segment chain: the coxa rotates
    /// around Y, the remaining joints pitch around X in the coxa's frame.
    #[must_use]
    pub fn forward_kinematics(&self, q: &JointAngles) -> Vec3 {
        let mut frame = self
            .frame()
            .add(Pose::with_heading(Vec3::ZERO, q.coxa))
            .add(Pose::with_heading(
                Vec3::new(0.0, COXA_OFFSET_Y, COXA_OFFSET_Z),
                0.0,
            ));

        for (pitch, length) in [
            (q.femur, FEMUR_LENGTH),
            (q.tibia, TIBIA_LENGTH),
            (q.tarsus, TARSUS_LENGTH),
        ] {
            frame = frame
                .add(Pose::new(Vec3::ZERO, 0.0, pitch, 0.0))
                .add(Pose::new(Vec3::new(0.0, 0.0, length), 0.0, 0.0, 0.0));
        }

        frame.position
    }

    /// Solves the four joint angles for a chassis-space foot target.
    ///
    /// The coxa is the only Y-axis joint, so its angle falls straight out
    /// of the target's bearing from the leg origin. The remaining three
    /// joints share a plane through the coxa end and the target; with the
    /// tarsus constrained vertical, the plane reduces to triangles solved
    /// side-side-side.
    pub fn solve(&self, target: Vec3) -> Result<JointAngles, IkError> {
        let coxa = (target.x - self.origin.x)
            .atan2(target.z - self.origin.z)
            .to_degrees()
            - self.heading;

        // vr: femur pivot. vq: tarsus top (the tarsus hangs vertical).
        // vp: a fixed anchor below vr that pins the decomposition.
        let vr = self.coxa_end(coxa);
        let vq = target + Vec3::new(0.0, TARSUS_LENGTH, 0.0);
        let vp = vr + Vec3::new(0.0, -ANCHOR_DROP, 0.0);

        let a = FEMUR_LENGTH;
        let b = TIBIA_LENGTH;
        let c = TARSUS_LENGTH;
        let d = vr.distance(vq);
        let e = vr.distance(target);
        let f = ANCHOR_DROP;
        let g = vp.distance(target);

        let aa = sss(b, a, d);
        let bb = sss(c, d, e);
        let cc = sss(g, e, f);
        let dd = sss(a, d, b);
        let ee = sss(e, c, d);
        let hh = 180.0 - (aa + dd);

        let femur = 90.0 - (aa + bb + cc);
        let tibia = 180.0 - hh;
        let tarsus = 180.0 - (dd + ee);

        if coxa.is_nan() || femur.is_nan() || tibia.is_nan() || tarsus.is_nan() {
            let trace = IkTrace {
                d,
                e,
                f,
                g,
                aa,
                bb,
                cc,
                dd,
                ee,
                hh,
            };
            error!(leg = self.name, %target, %trace, "unreachable foot target");
            return Err(IkError::UnreachableTarget {
                leg: self.name,
                target,
                trace,
            });
        }

        Ok(JointAngles {
            coxa,
            femur,
            tibia,
            tarsus,
        })
    }

    /// Solves and commands all four joints.
    ///
    /// Exactly one goal write per joint per call; while the servos are
    /// buffered the moves take effect on the next ACTION broadcast. An
    /// unreachable target commands nothing.
    pub fn set_goal(&self, bus: &mut Bus, target: Vec3) -> Result<(), LegError> {
        let q = self.solve(target)?;
        self.coxa.move_to(bus, q.coxa)?;
        self.femur.move_to(bus, q.femur)?;
        self.tibia.move_to(bus, q.tibia)?;
        self.tarsus.move_to(bus, q.tarsus + TARSUS_TRIM_DEG)?;
        Ok(())
    }

    /// Reads all four present angles and runs forward kinematics.
    ///
    /// Four serial round-trips; used during boot convergence, never inside
    /// the tick loop.
    pub fn present_position(&self, bus: &mut Bus) -> Result<Vec3, LegError> {
        let q = JointAngles {
            coxa: self.coxa.present_angle(bus)?,
            femur: self.femur.present_angle(bus)?,
            tibia: self.tibia.present_angle(bus)?,
            tarsus: self.tarsus.present_angle(bus)?,
        };
        Ok(self.forward_kinematics(&q))
    }

    /// The foot's home position for a given chassis pose: on the ground at
    /// `step_radius` from the body, out along the mounting heading rotated
    /// by the pose's heading.
    #[must_use]
    pub fn home_position(&self, pose: &Pose, step_radius: f64) -> Vec3 {
        let hyp = (self.origin.x * self.origin.x + self.origin.z * self.origin.z).sqrt();
        let mut home = pose
            .add(Pose::with_heading(self.origin, self.heading))
            .add(Pose::with_heading(
                Vec3::new(0.0, 0.0, step_radius - hyp),
                0.0,
            ))
            .position;
        home.y = 0.0;
        home
    }
}

/// Law of cosines, side-side-side: the angle (in degrees) opposite side
/// `a`, between sides `b` and `c`. NaN when no such triangle exists.
fn sss(a: f64, b: f64, c: f64) -> f64 {
    ((b * b + c * c - a * a) / (2.0 * b * c)).acos().to_degrees()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
