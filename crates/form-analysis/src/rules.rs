//! Declarative per-exercise rule tables

use crate::report::{FormViolation, Severity, ViolationKind};
use exercise_config::ExerciseType;
use exercise_state::ExercisePhase;
use kinematics::{ExerciseAngles, ALIGNMENT_VISIBILITY};
use pose_frame::{Joint, Landmark, PoseFrame};

/// Score multipliers per failing rule category; multiplicative so repeated
/// violations in a category compound
const ALIGNMENT_PENALTY: f32 = 0.8;
const ROM_PENALTY: f32 = 0.85;
const POSTURE_PENALTY: f32 = 0.75;

/// Which extracted angle a range-of-motion rule reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleKind {
    Knee,
    Hip,
    Ankle,
    Offset,
}

impl AngleKind {
    fn read(self, angles: &ExerciseAngles) -> f32 {
        match self {
            AngleKind::Knee => angles.knee_angle,
            AngleKind::Hip => angles.hip_angle,
            AngleKind::Ankle => angles.ankle_angle,
            AngleKind::Offset => angles.offset_angle,
        }
    }
}

/// Expected geometric relation between named joints
#[derive(Debug, Clone, Copy)]
pub enum AlignmentRelation {
    /// `|a.x - b.x|` within tolerance (normalized units)
    Vertical(Joint, Joint),
    /// `|a.y - b.y|` within tolerance (normalized units)
    Horizontal(Joint, Joint),
    /// Segment slopes within tolerance of each other (degrees)
    Parallel((Joint, Joint), (Joint, Joint)),
}

/// One alignment expectation
#[derive(Debug, Clone, Copy)]
pub struct AlignmentRule {
    pub name: &'static str,
    pub relation: AlignmentRelation,
    pub tolerance: f32,
    pub severity: Severity,
    pub hint: &'static str,
}

/// Allowed angle band for a phase
#[derive(Debug, Clone, Copy)]
pub struct RomRule {
    pub name: &'static str,
    pub phase: ExercisePhase,
    pub angle: AngleKind,
    pub min: f32,
    pub max: f32,
    pub severity: Severity,
    pub hint: &'static str,
}

/// Exercise-specific boolean check; `None` abstains, `Some(true)` violates
pub type PosturePredicate = fn(&PoseFrame, &ExerciseAngles) -> Option<bool>;

/// One posture expectation
#[derive(Clone, Copy)]
pub struct PostureRule {
    pub name: &'static str,
    pub severity: Severity,
    pub hint: &'static str,
    pub check: PosturePredicate,
}

/// Declarative rule table for one exercise
pub struct RuleSet {
    alignment: Vec<AlignmentRule>,
    range_of_motion: Vec<RomRule>,
    posture: Vec<PostureRule>,
}

impl RuleSet {
    /// Built-in table for an exercise
    pub fn for_exercise(exercise: ExerciseType) -> Self {
        match exercise {
            ExerciseType::Squat => Self::squat(),
            ExerciseType::Pushup => Self::pushup(),
            ExerciseType::Plank => Self::plank(),
            ExerciseType::Deadlift => Self::deadlift(),
            ExerciseType::BicepCurl => Self::bicep_curl(),
        }
    }

    /// Assemble a table from explicit rule lists
    pub fn custom(
        alignment: Vec<AlignmentRule>,
        range_of_motion: Vec<RomRule>,
        posture: Vec<PostureRule>,
    ) -> Self {
        Self {
            alignment,
            range_of_motion,
            posture,
        }
    }

    fn squat() -> Self {
        Self {
            alignment: vec![
                AlignmentRule {
                    name: "shoulders-level",
                    relation: AlignmentRelation::Horizontal(Joint::LeftShoulder, Joint::RightShoulder),
                    tolerance: 0.08,
                    severity: Severity::Low,
                    hint: "Level your shoulders",
                },
                AlignmentRule {
                    name: "hips-level",
                    relation: AlignmentRelation::Horizontal(Joint::LeftHip, Joint::RightHip),
                    tolerance: 0.08,
                    severity: Severity::Low,
                    hint: "Keep your hips level",
                },
                AlignmentRule {
                    name: "shoulders-hips-parallel",
                    relation: AlignmentRelation::Parallel(
                        (Joint::LeftShoulder, Joint::RightShoulder),
                        (Joint::LeftHip, Joint::RightHip),
                    ),
                    tolerance: 12.0,
                    severity: Severity::Low,
                    hint: "Keep shoulders and hips square",
                },
            ],
            range_of_motion: vec![
                RomRule {
                    name: "standing-knee-extension",
                    phase: ExercisePhase::Standing,
                    angle: AngleKind::Knee,
                    min: 140.0,
                    max: 185.0,
                    severity: Severity::Low,
                    hint: "Stand fully upright between reps",
                },
                RomRule {
                    name: "bottom-hip-range",
                    phase: ExercisePhase::DeepSquat,
                    angle: AngleKind::Hip,
                    min: 40.0,
                    max: 130.0,
                    severity: Severity::Medium,
                    hint: "Hinge at the hips through the bottom",
                },
            ],
            posture: vec![PostureRule {
                name: "hips-below-shoulders",
                severity: Severity::Medium,
                hint: "Keep your chest above your hips",
                check: hips_below_shoulders,
            }],
        }
    }

    fn pushup() -> Self {
        Self {
            alignment: vec![
                AlignmentRule {
                    name: "shoulders-level",
                    relation: AlignmentRelation::Horizontal(Joint::LeftShoulder, Joint::RightShoulder),
                    tolerance: 0.08,
                    severity: Severity::Low,
                    hint: "Level your shoulders",
                },
                AlignmentRule {
                    name: "body-line",
                    relation: AlignmentRelation::Parallel(
                        (Joint::LeftShoulder, Joint::LeftHip),
                        (Joint::LeftHip, Joint::LeftAnkle),
                    ),
                    tolerance: 15.0,
                    severity: Severity::Medium,
                    hint: "Hold a straight line from shoulders to ankles",
                },
            ],
            range_of_motion: vec![RomRule {
                name: "body-line-angle",
                phase: ExercisePhase::Transition,
                angle: AngleKind::Hip,
                min: 150.0,
                max: 185.0,
                severity: Severity::Medium,
                hint: "Keep your body straight through the press",
            }],
            posture: vec![PostureRule {
                name: "hips-not-sagging",
                severity: Severity::High,
                hint: "Squeeze your glutes to lift the hips",
                check: hips_not_sagging,
            }],
        }
    }

    fn plank() -> Self {
        Self {
            alignment: Vec::new(),
            range_of_motion: vec![RomRule {
                name: "hold-hip-angle",
                phase: ExercisePhase::Standing,
                angle: AngleKind::Hip,
                min: 150.0,
                max: 185.0,
                severity: Severity::Medium,
                hint: "Keep the hips in line during the hold",
            }],
            posture: vec![PostureRule {
                name: "hips-not-sagging",
                severity: Severity::High,
                hint: "Brace your core to keep the hips up",
                check: hips_not_sagging,
            }],
        }
    }

    fn deadlift() -> Self {
        Self {
            alignment: vec![AlignmentRule {
                name: "shoulders-hips-parallel",
                relation: AlignmentRelation::Parallel(
                    (Joint::LeftShoulder, Joint::RightShoulder),
                    (Joint::LeftHip, Joint::RightHip),
                ),
                tolerance: 12.0,
                severity: Severity::Low,
                hint: "Keep shoulders and hips square",
            }],
            range_of_motion: vec![RomRule {
                name: "pull-hip-hinge",
                phase: ExercisePhase::Transition,
                angle: AngleKind::Hip,
                min: 60.0,
                max: 185.0,
                severity: Severity::Medium,
                hint: "Hinge without collapsing the torso",
            }],
            posture: vec![PostureRule {
                name: "torso-not-collapsed",
                severity: Severity::High,
                hint: "Set your back flat before pulling",
                check: torso_not_collapsed,
            }],
        }
    }

    fn bicep_curl() -> Self {
        Self {
            alignment: vec![
                AlignmentRule {
                    name: "elbow-pinned",
                    relation: AlignmentRelation::Vertical(Joint::LeftShoulder, Joint::LeftElbow),
                    tolerance: 0.06,
                    severity: Severity::Medium,
                    hint: "Keep your elbow pinned to your side",
                },
                AlignmentRule {
                    name: "shoulders-level",
                    relation: AlignmentRelation::Horizontal(Joint::LeftShoulder, Joint::RightShoulder),
                    tolerance: 0.08,
                    severity: Severity::Low,
                    hint: "Level your shoulders",
                },
            ],
            range_of_motion: Vec::new(),
            posture: Vec::new(),
        }
    }

    /// Evaluate every rule; returns the violations and the compounded
    /// correctness score, clamped to [0, 1]
    pub fn evaluate(
        &self,
        frame: &PoseFrame,
        angles: &ExerciseAngles,
        phase: ExercisePhase,
    ) -> (Vec<FormViolation>, f32) {
        let mut violations = Vec::new();
        let mut score = 1.0f32;

        for rule in &self.alignment {
            if alignment_violated(frame, rule) == Some(true) {
                score *= ALIGNMENT_PENALTY;
                violations.push(FormViolation {
                    kind: ViolationKind::Alignment,
                    severity: rule.severity,
                    description: format!("Alignment off: {}", rule.name),
                    correction_hint: rule.hint.to_string(),
                });
            }
        }

        for rule in &self.range_of_motion {
            if rule.phase != phase {
                continue;
            }
            let value = rule.angle.read(angles);
            if value < rule.min || value > rule.max {
                score *= ROM_PENALTY;
                violations.push(FormViolation {
                    kind: ViolationKind::RangeOfMotion,
                    severity: rule.severity,
                    description: format!(
                        "{}: {:.0} degrees outside {:.0}..{:.0}",
                        rule.name, value, rule.min, rule.max
                    ),
                    correction_hint: rule.hint.to_string(),
                });
            }
        }

        for rule in &self.posture {
            if (rule.check)(frame, angles) == Some(true) {
                score *= POSTURE_PENALTY;
                violations.push(FormViolation {
                    kind: ViolationKind::Posture,
                    severity: rule.severity,
                    description: format!("Posture check failed: {}", rule.name),
                    correction_hint: rule.hint.to_string(),
                });
            }
        }

        (violations, score.clamp(0.0, 1.0))
    }
}

/// `None` when either joint is below the alignment visibility threshold
fn alignment_violated(frame: &PoseFrame, rule: &AlignmentRule) -> Option<bool> {
    match rule.relation {
        AlignmentRelation::Vertical(a, b) => {
            let a = frame.visible(a, ALIGNMENT_VISIBILITY)?;
            let b = frame.visible(b, ALIGNMENT_VISIBILITY)?;
            Some((a.x - b.x).abs() > rule.tolerance)
        }
        AlignmentRelation::Horizontal(a, b) => {
            let a = frame.visible(a, ALIGNMENT_VISIBILITY)?;
            let b = frame.visible(b, ALIGNMENT_VISIBILITY)?;
            Some((a.y - b.y).abs() > rule.tolerance)
        }
        AlignmentRelation::Parallel((a1, a2), (b1, b2)) => {
            let a1 = frame.visible(a1, ALIGNMENT_VISIBILITY)?;
            let a2 = frame.visible(a2, ALIGNMENT_VISIBILITY)?;
            let b1 = frame.visible(b1, ALIGNMENT_VISIBILITY)?;
            let b2 = frame.visible(b2, ALIGNMENT_VISIBILITY)?;
            let slope_a = segment_angle(a1, a2)?;
            let slope_b = segment_angle(b1, b2)?;
            let mut diff = (slope_a - slope_b).abs();
            if diff > 90.0 {
                diff = 180.0 - diff;
            }
            Some(diff > rule.tolerance)
        }
    }
}

/// Segment orientation in degrees, folded into [0, 180); `None` for a
/// degenerate segment
fn segment_angle(a: &Landmark, b: &Landmark) -> Option<f32> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if dx.abs() < 1e-6 && dy.abs() < 1e-6 {
        return None;
    }
    Some(dy.atan2(dx).to_degrees().rem_euclid(180.0))
}

/// Hips must stay below the shoulders (image y grows downward)
fn hips_below_shoulders(frame: &PoseFrame, _angles: &ExerciseAngles) -> Option<bool> {
    let shoulder = shoulder_center(frame)?;
    let hip = hip_center(frame)?;
    Some(hip.y < shoulder.y - 0.02)
}

/// Hip midpoint must not sag below the shoulder-ankle line
fn hips_not_sagging(frame: &PoseFrame, _angles: &ExerciseAngles) -> Option<bool> {
    let shoulder = shoulder_center(frame)?;
    let hip = hip_center(frame)?;
    let ankle = frame.visible(Joint::LeftAnkle, ALIGNMENT_VISIBILITY)?;

    // Interpolate the shoulder-ankle line at the hip's x position
    let span = ankle.x - shoulder.x;
    if span.abs() < 1e-6 {
        return None;
    }
    let t = ((hip.x - shoulder.x) / span).clamp(0.0, 1.0);
    let line_y = shoulder.y + t * (ankle.y - shoulder.y);
    Some(hip.y > line_y + 0.05)
}

/// Torso collapsed onto the thighs
fn torso_not_collapsed(_frame: &PoseFrame, angles: &ExerciseAngles) -> Option<bool> {
    Some(angles.hip_angle < 40.0)
}

fn shoulder_center(frame: &PoseFrame) -> Option<Landmark> {
    let l = frame.visible(Joint::LeftShoulder, ALIGNMENT_VISIBILITY)?;
    let r = frame.visible(Joint::RightShoulder, ALIGNMENT_VISIBILITY)?;
    Some(Landmark::midpoint(l, r))
}

fn hip_center(frame: &PoseFrame) -> Option<Landmark> {
    let l = frame.visible(Joint::LeftHip, ALIGNMENT_VISIBILITY)?;
    let r = frame.visible(Joint::RightHip, ALIGNMENT_VISIBILITY)?;
    Some(Landmark::midpoint(l, r))
}
