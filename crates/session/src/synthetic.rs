//! Synthetic side-view squat frames for demos and tests
//!
//! Builds an articulated leg-and-torso rig from a target knee angle: the
//! shin tilts forward, the thigh folds back, and the torso leans the way a
//! real squat does, so every downstream check sees plausible geometry.

use pose_frame::{Joint, Landmark, PoseFrame};

/// Frames held at each end of the movement before reversing
const HOLD_FRAMES: u32 = 8;

/// Knee-angle sweep bounds and per-frame step (degrees)
const TOP_ANGLE: f32 = 178.0;
const BOTTOM_ANGLE: f32 = 70.0;
const STEP: f32 = 3.0;

/// One side-view squat frame at the given knee angle
pub fn squat_frame(knee_angle_deg: f32, timestamp_ms: u64, sequence: u32) -> PoseFrame {
    let bend = (180.0 - knee_angle_deg).max(0.0);
    let sigma = (0.2 * bend).to_radians(); // shin forward tilt
    let tau = (0.2 * bend - bend).to_radians(); // thigh fold, hips travel back
    let gamma = (0.27 * bend).to_radians(); // torso lean

    let shin = 0.17f32;
    let thigh = 0.16f32;
    let torso = 0.17f32;

    let ankle = (0.52f32, 0.78f32);
    let toe = (ankle.0 + 0.08, ankle.1 + 0.01);
    let knee = (ankle.0 + shin * sigma.sin(), ankle.1 - shin * sigma.cos());
    let hip = (knee.0 + thigh * tau.sin(), knee.1 - thigh * tau.cos());
    let shoulder = (hip.0 + torso * gamma.sin(), hip.1 - torso * gamma.cos());
    let nose = (shoulder.0 + 0.04, shoulder.1 - 0.06);

    // The far side overlaps the near side, as a true side view would
    let mirror = 0.01f32;
    PoseFrame::empty(timestamp_ms, sequence)
        .with_joint(Joint::Nose, Landmark::new(nose.0, nose.1))
        .with_joint(Joint::LeftShoulder, Landmark::new(shoulder.0, shoulder.1))
        .with_joint(Joint::RightShoulder, Landmark::new(shoulder.0 + mirror, shoulder.1))
        .with_joint(Joint::LeftHip, Landmark::new(hip.0, hip.1))
        .with_joint(Joint::RightHip, Landmark::new(hip.0 + mirror, hip.1))
        .with_joint(Joint::LeftKnee, Landmark::new(knee.0, knee.1))
        .with_joint(Joint::RightKnee, Landmark::new(knee.0 + mirror, knee.1))
        .with_joint(Joint::LeftAnkle, Landmark::new(ankle.0, ankle.1))
        .with_joint(Joint::RightAnkle, Landmark::new(ankle.0 + mirror, ankle.1))
        .with_joint(Joint::LeftFootIndex, Landmark::new(toe.0, toe.1))
        .with_joint(Joint::RightFootIndex, Landmark::new(toe.0 + mirror, toe.1))
}

/// Triangle-wave squat generator, pausing briefly at the top and bottom
pub struct SquatSimulator {
    angle: f32,
    direction: f32,
    hold: u32,
    sequence: u32,
}

impl SquatSimulator {
    pub fn new() -> Self {
        Self {
            angle: TOP_ANGLE,
            direction: -1.0,
            hold: 0,
            sequence: 0,
        }
    }

    /// Current knee angle of the rig
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Produce the next frame of the sweep
    pub fn next_frame(&mut self, timestamp_ms: u64) -> PoseFrame {
        let frame = squat_frame(self.angle, timestamp_ms, self.sequence);
        self.sequence += 1;

        if self.hold > 0 {
            self.hold -= 1;
            return frame;
        }

        self.angle += self.direction * STEP;
        if self.angle <= BOTTOM_ANGLE {
            self.angle = BOTTOM_ANGLE;
            self.direction = 1.0;
            self.hold = HOLD_FRAMES;
        } else if self.angle >= TOP_ANGLE {
            self.angle = TOP_ANGLE;
            self.direction = -1.0;
            self.hold = HOLD_FRAMES;
        }
        frame
    }
}

impl Default for SquatSimulator {
    fn default() -> Self {
        Self::new()
    }
}
