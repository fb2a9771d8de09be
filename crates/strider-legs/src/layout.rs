//! The mechanical layout: segment lengths and where each leg bolts on.
//!
//! All lengths in millimetres, headings in degrees. These numbers are
//! measurements of the physical chassis, not tunables.

use strider_core::vec::Vec3;

/// Offset from the coxa pivot to the femur pivot, in the coxa's rotated
/// frame.
pub const COXA_OFFSET_Y: f64 = -12.0;
pub const COXA_OFFSET_Z: f64 = 39.0;

/// Segment lengths, measured along each segment's +Z.
pub const FEMUR_LENGTH: f64 = 100.0;
pub const TIBIA_LENGTH: f64 = 85.0;
pub const TARSUS_LENGTH: f64 = 80.5;

/// Extra degrees added to the tarsus goal to take up mechanical slack in
/// the linkage. Tune on hardware; zero on a tight build.
pub const TARSUS_TRIM_DEG: f64 = 0.0;

pub const LEG_COUNT: usize = 6;

/// Where one leg attaches: servo id block, chassis-space origin of the
/// coxa pivot, and the direction the leg points at zero coxa angle.
#[derive(Debug, Clone, Copy)]
pub struct LegMount {
    pub name: &'static str,
    /// Joint ids are `base_id + 1..=base_id + 4`, coxa outward to tarsus.
    pub base_id: u8,
    pub origin: Vec3,
    /// Mounting heading in degrees.
    pub heading: f64,
}

/// The six legs, indexed FL, FR, MR, BR, BL, ML.
///
/// Origins are relative to the chassis origin: the X/Z centre of the body,
/// level with the coxa pivot plane on Y.
pub const MOUNTS: [LegMount; LEG_COUNT] = [
    LegMount {
        name: "FL",
        base_id: 40,
        origin: Vec3::new(-61.167, 24.0, 98.0),
        heading: 300.0,
    },
    LegMount {
        name: "FR",
        base_id: 50,
        origin: Vec3::new(61.167, 24.0, 98.0),
        heading: 60.0,
    },
    LegMount {
        name: "MR",
        base_id: 60,
        origin: Vec3::new(81.0, 24.0, 0.0),
        heading: 90.0,
    },
    LegMount {
        name: "BR",
        base_id: 10,
        origin: Vec3::new(61.167, 24.0, -98.0),
        heading: 120.0,
    },
    LegMount {
        name: "BL",
        base_id: 20,
        origin: Vec3::new(-61.167, 24.0, -98.0),
        heading: 240.0,
    },
    LegMount {
        name: "ML",
        base_id: 30,
        origin: Vec3::new(-81.0, 24.0, 0.0),
        heading: 270.0,
    },
];
