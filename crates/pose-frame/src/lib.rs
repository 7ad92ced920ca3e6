//! Pose frame types
//!
//! Input data model for the analysis pipeline: per-frame body landmarks
//! produced by an external pose detector. The pipeline only reads these
//! types; it never owns capture or detection.

mod frame;

pub use frame::{CameraView, Joint, Landmark, PoseFrame, LANDMARK_COUNT};
