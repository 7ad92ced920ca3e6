//! Landmark and frame types

use serde::{Deserialize, Serialize};

/// Number of landmarks per frame (MediaPipe-style 33-point body model)
pub const LANDMARK_COUNT: usize = 33;

/// Named body joints used by the pipeline, with their fixed landmark indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum Joint {
    Nose = 0,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Joint {
    /// Landmark index of this joint within a frame
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A detected body joint position with a detection-confidence score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Normalized horizontal position (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Normalized vertical position (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Depth relative to the hips (negative = closer to camera)
    pub z: f32,
    /// Detection confidence in [0, 1]
    pub visibility: f32,
}

impl Landmark {
    /// Create a landmark at (x, y) with full visibility
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: 1.0,
        }
    }

    /// Euclidean distance to another landmark in the image plane
    pub fn distance_to(&self, other: &Landmark) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Midpoint between two landmarks; visibility is the lower of the two
    pub fn midpoint(a: &Landmark, b: &Landmark) -> Landmark {
        Landmark {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
            z: (a.z + b.z) / 2.0,
            visibility: a.visibility.min(b.visibility),
        }
    }
}

/// One complete set of landmarks for one time instant
///
/// Produced once per processed video frame by the external detector.
/// Immutable from the pipeline's point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Fixed-index landmark collection (index -> joint mapping per [`Joint`])
    pub landmarks: Vec<Landmark>,
    /// Capture timestamp (milliseconds, monotonic per session)
    pub timestamp_ms: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl PoseFrame {
    /// Create a frame from a full landmark set
    pub fn new(landmarks: Vec<Landmark>, timestamp_ms: u64, sequence: u32) -> Self {
        Self {
            landmarks,
            timestamp_ms,
            sequence,
        }
    }

    /// Create an empty frame (all landmarks at origin, zero visibility)
    pub fn empty(timestamp_ms: u64, sequence: u32) -> Self {
        Self {
            landmarks: vec![Landmark::default(); LANDMARK_COUNT],
            timestamp_ms,
            sequence,
        }
    }

    /// Get a joint's landmark, if the frame carries its index
    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.landmarks.get(joint.index())
    }

    /// Get a joint's landmark only if its visibility meets `min_visibility`
    pub fn visible(&self, joint: Joint, min_visibility: f32) -> Option<&Landmark> {
        self.get(joint)
            .filter(|l| l.visibility >= min_visibility)
    }

    /// Whether every listed joint meets the visibility threshold
    pub fn all_visible(&self, joints: &[Joint], min_visibility: f32) -> bool {
        joints
            .iter()
            .all(|&j| self.visible(j, min_visibility).is_some())
    }

    /// Mean visibility over the listed joints (0.0 when none are present)
    pub fn mean_visibility(&self, joints: &[Joint]) -> f32 {
        if joints.is_empty() {
            return 0.0;
        }
        let sum: f32 = joints
            .iter()
            .filter_map(|&j| self.get(j))
            .map(|l| l.visibility)
            .sum();
        sum / joints.len() as f32
    }

    /// Set a joint's landmark (builder-style helper for synthetic frames)
    pub fn with_joint(mut self, joint: Joint, landmark: Landmark) -> Self {
        if let Some(slot) = self.landmarks.get_mut(joint.index()) {
            *slot = landmark;
        }
        self
    }
}

/// Classified camera viewing angle for the current frame
///
/// Squat analysis needs a side-on view; frontal and unclassifiable views are
/// unusable and gate all other feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraView {
    /// Side-on view, full analysis available
    Side,
    /// Oblique view, analysis still usable
    Angled,
    /// Facing the camera, depth geometry unusable
    Frontal,
    /// Required landmarks missing, view cannot be classified
    #[default]
    Unknown,
}

impl CameraView {
    /// Whether analysis feedback may be produced for this view
    pub fn is_usable(self) -> bool {
        matches!(self, CameraView::Side | CameraView::Angled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_with(joint: Joint, landmark: Landmark) -> PoseFrame {
        PoseFrame::empty(0, 0).with_joint(joint, landmark)
    }

    #[test]
    fn test_visible_respects_threshold() {
        let frame = frame_with(
            Joint::LeftKnee,
            Landmark {
                visibility: 0.6,
                ..Landmark::new(0.5, 0.5)
            },
        );

        assert!(frame.visible(Joint::LeftKnee, 0.5).is_some());
        assert!(frame.visible(Joint::LeftKnee, 0.7).is_none());
    }

    #[test]
    fn test_empty_frame_has_no_visible_joints() {
        let frame = PoseFrame::empty(0, 0);
        assert!(!frame.all_visible(&[Joint::LeftHip, Joint::LeftKnee], 0.5));
        assert_eq!(frame.landmarks.len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_midpoint() {
        let a = Landmark::new(0.0, 0.0);
        let b = Landmark {
            visibility: 0.4,
            ..Landmark::new(1.0, 1.0)
        };
        let mid = Landmark::midpoint(&a, &b);
        assert!((mid.x - 0.5).abs() < 1e-6);
        assert!((mid.y - 0.5).abs() < 1e-6);
        assert!((mid.visibility - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_unusable_views() {
        assert!(CameraView::Side.is_usable());
        assert!(CameraView::Angled.is_usable());
        assert!(!CameraView::Frontal.is_usable());
        assert!(!CameraView::Unknown.is_usable());
    }

    proptest! {
        #[test]
        fn prop_distance_symmetric(ax in 0.0f32..1.0, ay in 0.0f32..1.0,
                                   bx in 0.0f32..1.0, by in 0.0f32..1.0) {
            let a = Landmark::new(ax, ay);
            let b = Landmark::new(bx, by);
            prop_assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-6);
        }

        #[test]
        fn prop_mean_visibility_bounded(v in 0.0f32..=1.0) {
            let frame = frame_with(
                Joint::LeftHip,
                Landmark { visibility: v, ..Landmark::new(0.5, 0.5) },
            );
            let mean = frame.mean_visibility(&[Joint::LeftHip, Joint::LeftKnee]);
            prop_assert!((0.0..=1.0).contains(&mean));
        }
    }
}
