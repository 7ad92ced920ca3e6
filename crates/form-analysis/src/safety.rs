//! Squat safety tier: explicit biomechanical checks
//!
//! Every check abstains when its landmarks fall below the risk visibility
//! threshold, and escalates the running risk level by max only.

use crate::report::{FormViolation, RiskLevel, Severity, ViolationKind};
use exercise_config::ExerciseMode;
use exercise_state::ExercisePhase;
use kinematics::{angle_from_vertical, select_side, ExerciseAngles, RISK_VISIBILITY};
use pose_frame::{Joint, Landmark, PoseFrame};

/// Ankle widths below this are a side view; the valgus ratio is undefined
const VALGUS_MIN_ANKLE_WIDTH: f32 = 0.02;

/// Tuned safety thresholds for one mode
///
/// Carried over from the reference parameter tables; values are tuned, not
/// derived.
#[derive(Debug, Clone, Copy)]
pub struct SafetyConfig {
    /// Normalized knee-past-ankle displacement that draws a warning
    pub knee_over_toe_warn: f32,
    /// Displacement past which severity escalates
    pub knee_over_toe_high: f32,
    /// Bottom-phase knee angle above this is not deep enough
    pub insufficient_depth_above: f32,
    /// Bottom-phase knee angle below this is too deep
    pub excessive_depth_below: f32,
    /// Max tolerated forward torso lean (degrees from vertical)
    pub forward_lean_max: f32,
    /// Max tolerated backward torso lean; tighter than forward
    pub backward_lean_max: f32,
    /// Knee-width / ankle-width ratio thresholds for valgus collapse
    pub valgus_caution_ratio: f32,
    pub valgus_warning_ratio: f32,
    pub valgus_danger_ratio: f32,
}

impl SafetyConfig {
    /// Pro requires deeper depth but flags excessive depth at a shallower
    /// cutoff, and tolerates less lean
    pub fn for_mode(mode: ExerciseMode) -> Self {
        match mode {
            ExerciseMode::Beginner => Self {
                knee_over_toe_warn: 0.08,
                knee_over_toe_high: 0.12,
                insufficient_depth_above: 73.0,
                excessive_depth_below: 45.0,
                forward_lean_max: 45.0,
                backward_lean_max: 15.0,
                valgus_caution_ratio: 0.7,
                valgus_warning_ratio: 0.65,
                valgus_danger_ratio: 0.5,
            },
            ExerciseMode::Pro => Self {
                knee_over_toe_warn: 0.08,
                knee_over_toe_high: 0.12,
                insufficient_depth_above: 68.0,
                excessive_depth_below: 55.0,
                forward_lean_max: 40.0,
                backward_lean_max: 12.0,
                valgus_caution_ratio: 0.7,
                valgus_warning_ratio: 0.65,
                valgus_danger_ratio: 0.5,
            },
        }
    }
}

/// Run every safety check for one frame
pub fn evaluate(
    config: &SafetyConfig,
    frame: &PoseFrame,
    angles: &ExerciseAngles,
    phase: ExercisePhase,
) -> (Vec<FormViolation>, RiskLevel) {
    let mut violations = Vec::new();
    let mut risk = RiskLevel::Safe;

    check_knee_over_toe(config, frame, &mut violations, &mut risk);
    check_depth(config, angles, phase, &mut violations, &mut risk);
    check_torso_lean(config, frame, &mut violations, &mut risk);
    check_valgus(config, frame, &mut violations, &mut risk);

    (violations, risk)
}

/// Horizontal knee displacement past the ankle, in the facing direction
fn check_knee_over_toe(
    config: &SafetyConfig,
    frame: &PoseFrame,
    violations: &mut Vec<FormViolation>,
    risk: &mut RiskLevel,
) {
    let [_, _, knee_j, ankle_j, toe_j] = select_side(frame).chain();
    let (Some(knee), Some(ankle), Some(toe)) = (
        frame.visible(knee_j, RISK_VISIBILITY),
        frame.visible(ankle_j, RISK_VISIBILITY),
        frame.visible(toe_j, RISK_VISIBILITY),
    ) else {
        return;
    };

    let facing = toe.x - ankle.x;
    if facing.abs() < 1e-4 {
        return;
    }
    let displacement = (knee.x - ankle.x) * facing.signum();

    if displacement > config.knee_over_toe_high {
        risk.escalate(RiskLevel::Warning);
        violations.push(FormViolation {
            kind: ViolationKind::KneeOverToe,
            severity: Severity::High,
            description: format!("Knee tracking {displacement:.2} past the ankle"),
            correction_hint: "Sit back into your hips".to_string(),
        });
    } else if displacement > config.knee_over_toe_warn {
        risk.escalate(RiskLevel::Caution);
        violations.push(FormViolation {
            kind: ViolationKind::KneeOverToe,
            severity: Severity::Medium,
            description: format!("Knee drifting {displacement:.2} past the ankle"),
            correction_hint: "Keep your weight over mid-foot".to_string(),
        });
    }
}

/// Mode-dependent knee-angle depth bands, judged at the bottom phase
fn check_depth(
    config: &SafetyConfig,
    angles: &ExerciseAngles,
    phase: ExercisePhase,
    violations: &mut Vec<FormViolation>,
    risk: &mut RiskLevel,
) {
    if phase != ExercisePhase::DeepSquat {
        return;
    }

    if angles.knee_angle > config.insufficient_depth_above {
        risk.escalate(RiskLevel::Caution);
        violations.push(FormViolation {
            kind: ViolationKind::InsufficientDepth,
            severity: Severity::Medium,
            description: format!(
                "Bottom knee angle {:.0} above the {:.0} depth target",
                angles.knee_angle, config.insufficient_depth_above
            ),
            correction_hint: "Lower a little further".to_string(),
        });
    } else if angles.knee_angle < config.excessive_depth_below {
        risk.escalate(RiskLevel::Warning);
        violations.push(FormViolation {
            kind: ViolationKind::ExcessiveDepth,
            severity: Severity::Medium,
            description: format!(
                "Bottom knee angle {:.0} below the {:.0} depth floor",
                angles.knee_angle, config.excessive_depth_below
            ),
            correction_hint: "Stop the descent at your target depth".to_string(),
        });
    }
}

/// Shoulder-center to hip-center line angle from vertical; forward lean is
/// tolerated more than backward lean
fn check_torso_lean(
    config: &SafetyConfig,
    frame: &PoseFrame,
    violations: &mut Vec<FormViolation>,
    risk: &mut RiskLevel,
) {
    let Some(shoulder) = center(frame, Joint::LeftShoulder, Joint::RightShoulder) else {
        return;
    };
    let Some(hip) = center(frame, Joint::LeftHip, Joint::RightHip) else {
        return;
    };

    let lean = angle_from_vertical(&shoulder, &hip);
    let forward = facing_sign(frame)
        .map(|sign| (shoulder.x - hip.x) * sign > 0.0)
        .unwrap_or(true);

    if forward && lean > config.forward_lean_max {
        risk.escalate(RiskLevel::Caution);
        violations.push(FormViolation {
            kind: ViolationKind::ForwardLean,
            severity: Severity::Medium,
            description: format!("Torso leaning {lean:.0} degrees forward"),
            correction_hint: "Lift your chest".to_string(),
        });
    } else if !forward && lean > config.backward_lean_max {
        risk.escalate(RiskLevel::Warning);
        violations.push(FormViolation {
            kind: ViolationKind::BackwardLean,
            severity: Severity::Medium,
            description: format!("Torso leaning {lean:.0} degrees backward"),
            correction_hint: "Shift your weight forward over mid-foot".to_string(),
        });
    }
}

/// Knee-width to ankle-width collapse ratio (frontal-plane valgus)
fn check_valgus(
    config: &SafetyConfig,
    frame: &PoseFrame,
    violations: &mut Vec<FormViolation>,
    risk: &mut RiskLevel,
) {
    let (Some(lk), Some(rk), Some(la), Some(ra)) = (
        frame.visible(Joint::LeftKnee, RISK_VISIBILITY),
        frame.visible(Joint::RightKnee, RISK_VISIBILITY),
        frame.visible(Joint::LeftAnkle, RISK_VISIBILITY),
        frame.visible(Joint::RightAnkle, RISK_VISIBILITY),
    ) else {
        return;
    };

    let knee_width = (lk.x - rk.x).abs();
    let ankle_width = (la.x - ra.x).abs();
    if ankle_width < VALGUS_MIN_ANKLE_WIDTH {
        return;
    }

    let ratio = knee_width / ankle_width;
    let (severity, level) = if ratio < config.valgus_danger_ratio {
        (Severity::High, RiskLevel::Danger)
    } else if ratio < config.valgus_warning_ratio {
        (Severity::High, RiskLevel::Warning)
    } else if ratio < config.valgus_caution_ratio {
        (Severity::Medium, RiskLevel::Caution)
    } else {
        return;
    };

    risk.escalate(level);
    violations.push(FormViolation {
        kind: ViolationKind::KneeValgus,
        severity,
        description: format!("Knees collapsing inward (width ratio {ratio:.2})"),
        correction_hint: "Push your knees outward in line with your toes".to_string(),
    });
}

fn center(frame: &PoseFrame, a: Joint, b: Joint) -> Option<Landmark> {
    let a = frame.visible(a, RISK_VISIBILITY)?;
    let b = frame.visible(b, RISK_VISIBILITY)?;
    Some(Landmark::midpoint(a, b))
}

/// Facing direction from toe-ankle offset; `None` when undecidable
fn facing_sign(frame: &PoseFrame) -> Option<f32> {
    let [_, _, _, ankle_j, toe_j] = select_side(frame).chain();
    let ankle = frame.visible(ankle_j, RISK_VISIBILITY)?;
    let toe = frame.visible(toe_j, RISK_VISIBILITY)?;
    let dx = toe.x - ankle.x;
    if dx.abs() < 1e-4 {
        None
    } else {
        Some(dx.signum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angles(knee: f32) -> ExerciseAngles {
        ExerciseAngles {
            knee_angle: knee,
            hip_angle: 120.0,
            ankle_angle: 100.0,
            offset_angle: 5.0,
        }
    }

    fn frontal_frame(knee_width: f32, ankle_width: f32) -> PoseFrame {
        let half_k = knee_width / 2.0;
        let half_a = ankle_width / 2.0;
        PoseFrame::empty(0, 0)
            .with_joint(Joint::LeftShoulder, Landmark::new(0.45, 0.28))
            .with_joint(Joint::RightShoulder, Landmark::new(0.55, 0.28))
            .with_joint(Joint::LeftHip, Landmark::new(0.46, 0.45))
            .with_joint(Joint::RightHip, Landmark::new(0.54, 0.45))
            .with_joint(Joint::LeftKnee, Landmark::new(0.5 - half_k, 0.62))
            .with_joint(Joint::RightKnee, Landmark::new(0.5 + half_k, 0.62))
            .with_joint(Joint::LeftAnkle, Landmark::new(0.5 - half_a, 0.80))
            .with_joint(Joint::RightAnkle, Landmark::new(0.5 + half_a, 0.80))
            .with_joint(Joint::LeftFootIndex, Landmark::new(0.5 - half_a + 0.05, 0.82))
            .with_joint(Joint::RightFootIndex, Landmark::new(0.5 + half_a + 0.05, 0.82))
    }

    #[test]
    fn test_valgus_collapse_is_high_severity() {
        let config = SafetyConfig::for_mode(ExerciseMode::Beginner);
        // Knee width 0.12 over ankle width 0.20: ratio 0.6
        let frame = frontal_frame(0.12, 0.20);

        let (violations, risk) = evaluate(&config, &frame, &angles(50.0), ExercisePhase::DeepSquat);

        let valgus = violations
            .iter()
            .find(|v| v.kind == ViolationKind::KneeValgus)
            .expect("valgus violation");
        assert_eq!(valgus.severity, Severity::High);
        assert!(risk > RiskLevel::Safe);
    }

    #[test]
    fn test_valgus_abstains_in_side_view() {
        let config = SafetyConfig::for_mode(ExerciseMode::Beginner);
        // Overlapping ankles: the ratio is undefined, not a collapse
        let frame = frontal_frame(0.0, 0.01);

        let (violations, _) = evaluate(&config, &frame, &angles(100.0), ExercisePhase::Transition);
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::KneeValgus));
    }

    #[test]
    fn test_knee_over_toe_escalates_with_displacement() {
        let config = SafetyConfig::for_mode(ExerciseMode::Beginner);

        let drift = frontal_frame(0.2, 0.2)
            .with_joint(Joint::RightKnee, Landmark::new(0.70, 0.62))
            .with_joint(Joint::LeftKnee, Landmark::new(0.70, 0.62));
        let (violations, risk) = evaluate(&config, &drift, &angles(100.0), ExercisePhase::Transition);
        let kot = violations
            .iter()
            .find(|v| v.kind == ViolationKind::KneeOverToe)
            .expect("knee-over-toe violation");
        assert_eq!(kot.severity, Severity::High);
        assert!(risk >= RiskLevel::Warning);
    }

    #[test]
    fn test_low_visibility_knee_abstains() {
        let config = SafetyConfig::for_mode(ExerciseMode::Beginner);
        let mut frame = frontal_frame(0.12, 0.20);
        frame.landmarks[Joint::LeftKnee.index()].visibility = 0.5;
        frame.landmarks[Joint::RightKnee.index()].visibility = 0.5;

        let (violations, _) = evaluate(&config, &frame, &angles(100.0), ExercisePhase::Transition);
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::KneeValgus));
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::KneeOverToe));
    }

    #[test]
    fn test_depth_bands_differ_by_mode() {
        let frame = frontal_frame(0.2, 0.2);

        // 52 degrees at the bottom: too deep for pro (cutoff 55), fine for
        // beginner (cutoff 45)
        let beginner = SafetyConfig::for_mode(ExerciseMode::Beginner);
        let (violations, _) = evaluate(&beginner, &frame, &angles(52.0), ExercisePhase::DeepSquat);
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::ExcessiveDepth));

        let pro = SafetyConfig::for_mode(ExerciseMode::Pro);
        let (violations, _) = evaluate(&pro, &frame, &angles(52.0), ExercisePhase::DeepSquat);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::ExcessiveDepth));
    }

    #[test]
    fn test_insufficient_depth_flagged_at_bottom_only() {
        let config = SafetyConfig::for_mode(ExerciseMode::Beginner);
        let frame = frontal_frame(0.2, 0.2);

        let (violations, _) = evaluate(&config, &frame, &angles(74.0), ExercisePhase::DeepSquat);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::InsufficientDepth));

        let (violations, _) = evaluate(&config, &frame, &angles(74.0), ExercisePhase::Transition);
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::InsufficientDepth));
    }

    #[test]
    fn test_lean_tolerance_is_asymmetric() {
        let config = SafetyConfig::for_mode(ExerciseMode::Beginner);

        // Shoulders 0.1 behind the hips over a 0.2 rise: ~27 degrees.
        // Backward limit is 15, so this flags.
        let backward = frontal_frame(0.2, 0.2)
            .with_joint(Joint::LeftShoulder, Landmark::new(0.36, 0.25))
            .with_joint(Joint::RightShoulder, Landmark::new(0.44, 0.25));
        let (violations, _) = evaluate(&config, &backward, &angles(120.0), ExercisePhase::Transition);
        assert!(violations.iter().any(|v| v.kind == ViolationKind::BackwardLean));

        // The same magnitude forward stays inside the 45 degree allowance
        let forward = frontal_frame(0.2, 0.2)
            .with_joint(Joint::LeftShoulder, Landmark::new(0.56, 0.25))
            .with_joint(Joint::RightShoulder, Landmark::new(0.64, 0.25));
        let (violations, _) = evaluate(&config, &forward, &angles(120.0), ExercisePhase::Transition);
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::ForwardLean));
        assert!(!violations.iter().any(|v| v.kind == ViolationKind::BackwardLean));
    }
}
