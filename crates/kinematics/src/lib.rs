//! Kinematics
//!
//! Pure, stateless angle extraction: one pose frame in, a small set of
//! biomechanical angles out. No side effects, so extraction may be offloaded
//! to a worker without changing semantics.

mod angles;
mod geometry;

pub use angles::{classify_camera_view, extract_angles, select_side, BodySide, ExerciseAngles};
pub use geometry::{angle_from_vertical, joint_angle};

/// Minimum landmark visibility for alignment-grade checks
pub const ALIGNMENT_VISIBILITY: f32 = 0.5;

/// Minimum landmark visibility for injury-risk-grade checks
pub const RISK_VISIBILITY: f32 = 0.7;
