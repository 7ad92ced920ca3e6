//! Violations, risk levels, and the per-frame report

use serde::{Deserialize, Serialize};

/// Violation severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Aggregate injury-risk classification
///
/// Within one analysis call the level only escalates (max reduction), never
/// downgrades, so the order violations are processed in cannot matter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum RiskLevel {
    #[default]
    Safe,
    Caution,
    Warning,
    Danger,
}

impl RiskLevel {
    /// Raise to `other` if it is higher; never lowers
    pub fn escalate(&mut self, other: RiskLevel) {
        *self = (*self).max(other);
    }
}

/// What kind of deviation a violation describes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ViolationKind {
    Alignment,
    RangeOfMotion,
    Posture,
    KneeOverToe,
    InsufficientDepth,
    ExcessiveDepth,
    ForwardLean,
    BackwardLean,
    KneeValgus,
    /// Synthetic violation produced when analysis itself failed
    AnalysisFault,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Alignment => "alignment",
            ViolationKind::RangeOfMotion => "range-of-motion",
            ViolationKind::Posture => "posture",
            ViolationKind::KneeOverToe => "knee-over-toe",
            ViolationKind::InsufficientDepth => "insufficient-depth",
            ViolationKind::ExcessiveDepth => "excessive-depth",
            ViolationKind::ForwardLean => "forward-lean",
            ViolationKind::BackwardLean => "backward-lean",
            ViolationKind::KneeValgus => "knee-valgus",
            ViolationKind::AnalysisFault => "analysis-fault",
        }
    }

    /// Recommendation text for this kind of violation
    pub fn recommendation(&self) -> &'static str {
        match self {
            ViolationKind::Alignment => "Square your shoulders and hips to the same line",
            ViolationKind::RangeOfMotion => "Work within the target range for each phase",
            ViolationKind::Posture => "Reset your posture before the next rep",
            ViolationKind::KneeOverToe => "Sit back into your hips so the knee stays behind the toes",
            ViolationKind::InsufficientDepth => "Lower further until you reach full depth",
            ViolationKind::ExcessiveDepth => "Stop the descent at your target depth",
            ViolationKind::ForwardLean => "Lift your chest and keep the torso more upright",
            ViolationKind::BackwardLean => "Shift your weight forward over mid-foot",
            ViolationKind::KneeValgus => "Push your knees outward in line with your toes",
            ViolationKind::AnalysisFault => "Check camera positioning and lighting",
        }
    }
}

/// A detected deviation from correct or safe form; produced fresh each
/// analysis call, never persisted by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormViolation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    pub correction_hint: String,
}

/// Complete result of one analysis call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormReport {
    pub violations: Vec<FormViolation>,
    pub risk: RiskLevel,
    /// Rule-engine correctness score, always within [0, 1]
    pub correctness_score: f32,
    pub recommendations: Vec<String>,
}

impl FormReport {
    /// Report returned when analysis itself failed
    pub fn analysis_fault() -> Self {
        Self {
            violations: vec![FormViolation {
                kind: ViolationKind::AnalysisFault,
                severity: Severity::High,
                description: "Internal analysis error".to_string(),
                correction_hint: "Check camera and lighting, then continue".to_string(),
            }],
            risk: RiskLevel::Warning,
            correctness_score: 0.0,
            recommendations: vec![ViolationKind::AnalysisFault.recommendation().to_string()],
        }
    }

    /// Highest severity present, if any violation was found
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }

    pub fn has_high_severity(&self) -> bool {
        self.max_severity() == Some(Severity::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_risk() -> impl Strategy<Value = RiskLevel> {
        prop_oneof![
            Just(RiskLevel::Safe),
            Just(RiskLevel::Caution),
            Just(RiskLevel::Warning),
            Just(RiskLevel::Danger),
        ]
    }

    #[test]
    fn test_escalation_never_downgrades() {
        let mut risk = RiskLevel::Warning;
        risk.escalate(RiskLevel::Caution);
        assert_eq!(risk, RiskLevel::Warning);
        risk.escalate(RiskLevel::Danger);
        assert_eq!(risk, RiskLevel::Danger);
    }

    proptest! {
        /// Feeding escalations in any order yields the same maximal level
        #[test]
        fn prop_escalation_is_order_independent(mut levels in proptest::collection::vec(any_risk(), 1..8)) {
            let mut forward = RiskLevel::Safe;
            for l in &levels {
                forward.escalate(*l);
            }

            levels.reverse();
            let mut backward = RiskLevel::Safe;
            for l in &levels {
                backward.escalate(*l);
            }

            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward, levels.iter().copied().max().unwrap_or(RiskLevel::Safe));
        }
    }
}
