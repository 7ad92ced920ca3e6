//! Per-frame angle extraction

use crate::geometry::joint_angle;
use crate::ALIGNMENT_VISIBILITY;
use pose_frame::{CameraView, Joint, PoseFrame};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Offset angle below which the camera is considered side-on (degrees)
const SIDE_VIEW_MAX_OFFSET: f32 = 25.0;

/// Offset angle at and above which the view is considered frontal (degrees)
const FRONTAL_MIN_OFFSET: f32 = 45.0;

/// Biomechanical angles derived from one frame, in degrees
///
/// Ephemeral: recomputed every frame, retained only inside the state
/// machine's short smoothing window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseAngles {
    /// Hip-knee-ankle angle (vertex at the knee)
    pub knee_angle: f32,
    /// Shoulder-hip-knee angle (vertex at the hip)
    pub hip_angle: f32,
    /// Knee-ankle-toe angle (vertex at the ankle)
    pub ankle_angle: f32,
    /// Apparent shoulder separation seen from the nose; grows as the camera
    /// rotates from side-on toward frontal
    pub offset_angle: f32,
}

/// Body side whose landmark chain drives the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodySide {
    Left,
    Right,
}

impl BodySide {
    /// Shoulder, hip, knee, ankle, toe joints for this side
    pub fn chain(self) -> [Joint; 5] {
        match self {
            BodySide::Left => [
                Joint::LeftShoulder,
                Joint::LeftHip,
                Joint::LeftKnee,
                Joint::LeftAnkle,
                Joint::LeftFootIndex,
            ],
            BodySide::Right => [
                Joint::RightShoulder,
                Joint::RightHip,
                Joint::RightKnee,
                Joint::RightAnkle,
                Joint::RightFootIndex,
            ],
        }
    }
}

/// Pick the side with the better-detected landmark chain
pub fn select_side(frame: &PoseFrame) -> BodySide {
    let left = frame.mean_visibility(&BodySide::Left.chain());
    let right = frame.mean_visibility(&BodySide::Right.chain());
    if right > left {
        BodySide::Right
    } else {
        BodySide::Left
    }
}

/// Extract exercise angles from a frame
///
/// Returns `None` (never an error) when any joint of the better-visible side
/// chain is missing or below the alignment visibility threshold. The offset
/// angle falls back to 0.0 when the nose or a shoulder is undetected; camera
/// usability is handled separately by [`classify_camera_view`].
pub fn extract_angles(frame: &PoseFrame) -> Option<ExerciseAngles> {
    let side = select_side(frame);
    let [shoulder_j, hip_j, knee_j, ankle_j, toe_j] = side.chain();

    let shoulder = frame.visible(shoulder_j, ALIGNMENT_VISIBILITY);
    let hip = frame.visible(hip_j, ALIGNMENT_VISIBILITY);
    let knee = frame.visible(knee_j, ALIGNMENT_VISIBILITY);
    let ankle = frame.visible(ankle_j, ALIGNMENT_VISIBILITY);
    let toe = frame.visible(toe_j, ALIGNMENT_VISIBILITY);

    let (shoulder, hip, knee, ankle, toe) = match (shoulder, hip, knee, ankle, toe) {
        (Some(s), Some(h), Some(k), Some(a), Some(t)) => (s, h, k, a, t),
        _ => {
            debug!(?side, "angle extraction abstained: landmark chain not visible");
            return None;
        }
    };

    Some(ExerciseAngles {
        knee_angle: joint_angle(hip, knee, ankle),
        hip_angle: joint_angle(shoulder, hip, knee),
        ankle_angle: joint_angle(knee, ankle, toe),
        offset_angle: offset_angle(frame).unwrap_or(0.0),
    })
}

/// Shoulder separation angle at the nose vertex, if classifiable
fn offset_angle(frame: &PoseFrame) -> Option<f32> {
    let nose = frame.visible(Joint::Nose, ALIGNMENT_VISIBILITY)?;
    let left = frame.visible(Joint::LeftShoulder, ALIGNMENT_VISIBILITY)?;
    let right = frame.visible(Joint::RightShoulder, ALIGNMENT_VISIBILITY)?;
    Some(joint_angle(left, nose, right))
}

/// Classify the camera viewing angle for this frame
///
/// Side-on views keep the shoulders nearly collinear with the nose (small
/// offset angle); frontal views spread them wide.
pub fn classify_camera_view(frame: &PoseFrame) -> CameraView {
    match offset_angle(frame) {
        None => CameraView::Unknown,
        Some(offset) if offset < SIDE_VIEW_MAX_OFFSET => CameraView::Side,
        Some(offset) if offset < FRONTAL_MIN_OFFSET => CameraView::Angled,
        Some(_) => CameraView::Frontal,
    }
}
