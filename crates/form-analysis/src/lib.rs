//! Biomechanical Form Analyzer
//!
//! Two deterministic, side-effect-free analysis tiers per frame: a generic
//! declarative rule engine (alignment, range of motion, posture) and a
//! squat-specific safety tier that escalates an aggregate injury-risk level.

mod report;
mod rules;
mod safety;

pub use report::{FormReport, FormViolation, RiskLevel, Severity, ViolationKind};
pub use rules::{AlignmentRelation, AlignmentRule, AngleKind, PostureRule, RomRule, RuleSet};
pub use safety::SafetyConfig;

use exercise_config::{ExerciseMode, ExerciseType};
use exercise_state::ExercisePhase;
use kinematics::ExerciseAngles;
use pose_frame::PoseFrame;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Per-frame form analyzer for one exercise session
pub struct FormAnalyzer {
    exercise: ExerciseType,
    mode: ExerciseMode,
    rules: RuleSet,
    safety: SafetyConfig,
}

impl FormAnalyzer {
    /// Create an analyzer with the built-in rule table for the exercise
    pub fn new(exercise: ExerciseType, mode: ExerciseMode) -> Self {
        Self {
            exercise,
            mode,
            rules: RuleSet::for_exercise(exercise),
            safety: SafetyConfig::for_mode(mode),
        }
    }

    /// Create an analyzer with a custom rule set
    pub fn with_rules(exercise: ExerciseType, mode: ExerciseMode, rules: RuleSet) -> Self {
        Self {
            exercise,
            mode,
            rules,
            safety: SafetyConfig::for_mode(mode),
        }
    }

    pub fn set_mode(&mut self, mode: ExerciseMode) {
        self.mode = mode;
        self.safety = SafetyConfig::for_mode(mode);
    }

    pub fn set_exercise(&mut self, exercise: ExerciseType) {
        self.exercise = exercise;
        self.rules = RuleSet::for_exercise(exercise);
    }

    pub fn mode(&self) -> ExerciseMode {
        self.mode
    }

    /// Analyze one frame
    ///
    /// Never fails: an unexpected internal panic is converted into a single
    /// synthetic High violation with a Warning risk level, so callers always
    /// receive a well-formed report.
    pub fn analyze(
        &self,
        frame: &PoseFrame,
        angles: &ExerciseAngles,
        phase: ExercisePhase,
    ) -> FormReport {
        catch_unwind(AssertUnwindSafe(|| self.analyze_inner(frame, angles, phase)))
            .unwrap_or_else(|_| {
                warn!(exercise = self.exercise.as_str(), "form analysis panicked; returning fault report");
                FormReport::analysis_fault()
            })
    }

    fn analyze_inner(
        &self,
        frame: &PoseFrame,
        angles: &ExerciseAngles,
        phase: ExercisePhase,
    ) -> FormReport {
        let (mut violations, correctness_score) = self.rules.evaluate(frame, angles, phase);

        let mut risk = RiskLevel::Safe;
        if self.exercise == ExerciseType::Squat {
            let (safety_violations, safety_risk) =
                safety::evaluate(&self.safety, frame, angles, phase);
            violations.extend(safety_violations);
            risk.escalate(safety_risk);
        }

        let recommendations = self.recommendations(&violations);

        FormReport {
            violations,
            risk,
            correctness_score,
            recommendations,
        }
    }

    /// Recommendations derive from the set of violation kinds present, not
    /// from individual violations, so repeated findings do not repeat advice
    fn recommendations(&self, violations: &[FormViolation]) -> Vec<String> {
        let kinds: BTreeSet<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        let mut out: Vec<String> = kinds.iter().map(|k| k.recommendation().to_string()).collect();

        if !out.is_empty() {
            match self.mode {
                ExerciseMode::Beginner => {
                    out.push("Keep at it, these adjustments will come with practice".to_string());
                }
                ExerciseMode::Pro => {
                    out.push("Tighten these up to keep the set within standard".to_string());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pose_frame::{Joint, Landmark};

    fn usable_frame() -> PoseFrame {
        PoseFrame::empty(0, 0)
            .with_joint(Joint::Nose, Landmark::new(0.54, 0.22))
            .with_joint(Joint::LeftShoulder, Landmark::new(0.50, 0.28))
            .with_joint(Joint::RightShoulder, Landmark::new(0.51, 0.28))
            .with_joint(Joint::LeftHip, Landmark::new(0.50, 0.40))
            .with_joint(Joint::RightHip, Landmark::new(0.51, 0.40))
            .with_joint(Joint::LeftKnee, Landmark::new(0.52, 0.55))
            .with_joint(Joint::RightKnee, Landmark::new(0.53, 0.55))
            .with_joint(Joint::LeftAnkle, Landmark::new(0.50, 0.72))
            .with_joint(Joint::RightAnkle, Landmark::new(0.51, 0.72))
            .with_joint(Joint::LeftFootIndex, Landmark::new(0.57, 0.73))
            .with_joint(Joint::RightFootIndex, Landmark::new(0.58, 0.73))
    }

    fn standing_angles() -> ExerciseAngles {
        ExerciseAngles {
            knee_angle: 172.0,
            hip_angle: 170.0,
            ankle_angle: 100.0,
            offset_angle: 6.0,
        }
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let analyzer = FormAnalyzer::new(ExerciseType::Squat, ExerciseMode::Beginner);
        let frame = usable_frame();
        let angles = standing_angles();

        let first = analyzer.analyze(&frame, &angles, ExercisePhase::Standing);
        let second = analyzer.analyze(&frame, &angles, ExercisePhase::Standing);

        assert_eq!(first.violations.len(), second.violations.len());
        assert_eq!(first.risk, second.risk);
        assert!((first.correctness_score - second.correctness_score).abs() < 1e-6);
    }

    #[test]
    fn test_clean_standing_frame_is_safe() {
        let analyzer = FormAnalyzer::new(ExerciseType::Squat, ExerciseMode::Beginner);
        let report = analyzer.analyze(&usable_frame(), &standing_angles(), ExercisePhase::Standing);

        assert_eq!(report.risk, RiskLevel::Safe);
        assert!(report.correctness_score > 0.99);
    }

    #[test]
    fn test_panicking_rule_becomes_fault_report() {
        fn broken(_: &PoseFrame, _: &ExerciseAngles) -> Option<bool> {
            panic!("rule blew up");
        }

        let rules = RuleSet::custom(
            Vec::new(),
            Vec::new(),
            vec![PostureRule {
                name: "broken",
                severity: Severity::Low,
                hint: "",
                check: broken,
            }],
        );
        let analyzer = FormAnalyzer::with_rules(ExerciseType::Squat, ExerciseMode::Beginner, rules);

        let report = analyzer.analyze(&usable_frame(), &standing_angles(), ExercisePhase::Standing);
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].severity, Severity::High);
        assert_eq!(report.violations[0].kind, ViolationKind::AnalysisFault);
        assert_eq!(report.risk, RiskLevel::Warning);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("camera") || r.contains("lighting")));
    }

    #[test]
    fn test_recommendations_dedupe_by_kind() {
        let analyzer = FormAnalyzer::new(ExerciseType::Squat, ExerciseMode::Beginner);

        // Knees collapsing inward relative to the ankles (ratio 0.4) plus a
        // deep-squat knee angle produces several violations but one
        // recommendation per kind.
        let frame = usable_frame()
            .with_joint(Joint::LeftKnee, Landmark::new(0.47, 0.55))
            .with_joint(Joint::RightKnee, Landmark::new(0.53, 0.55))
            .with_joint(Joint::LeftAnkle, Landmark::new(0.40, 0.72))
            .with_joint(Joint::RightAnkle, Landmark::new(0.60, 0.72));
        let angles = ExerciseAngles {
            knee_angle: 50.0,
            ..standing_angles()
        };

        let report = analyzer.analyze(&frame, &angles, ExercisePhase::DeepSquat);
        let kinds: BTreeSet<ViolationKind> = report.violations.iter().map(|v| v.kind).collect();
        // One recommendation per kind plus the mode-framing line
        assert_eq!(report.recommendations.len(), kinds.len() + 1);
    }
}
