//! Per-mode threshold tables and validation

use crate::mode::{ExerciseMode, ExerciseType};
use serde::{Deserialize, Serialize};

/// Phase-boundary thresholds for one angle, in degrees
///
/// `s1_threshold` bounds the standing/top phase, `s3_threshold` the deep
/// phase, `s2_range` the transition corridor between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleThresholds {
    pub s1_threshold: f32,
    pub s2_range: (f32, f32),
    pub s3_threshold: f32,
    pub warning_tolerance: f32,
}

impl AngleThresholds {
    const fn new(s1: f32, s2: (f32, f32), s3: f32, tolerance: f32) -> Self {
        Self {
            s1_threshold: s1,
            s2_range: s2,
            s3_threshold: s3,
            warning_tolerance: tolerance,
        }
    }
}

/// Complete threshold table for one (mode, exercise) pair
///
/// The `knee`/`hip` slots carry the exercise's primary and secondary joint
/// angles; for upper-body exercises those are the elbow and torso chains.
/// The numeric values are domain-tuned parameters carried over from the
/// reference tables, not derived biomechanical facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeThresholds {
    pub knee: AngleThresholds,
    pub hip: AngleThresholds,
    pub offset: AngleThresholds,
    /// How eagerly feedback is surfaced, in [0, 1]
    pub feedback_sensitivity: f32,
    /// Seconds without an accepted phase transition before the session is
    /// considered inactive
    pub inactivity_timeout_secs: f32,
}

const BEGINNER_OFFSET: AngleThresholds = AngleThresholds::new(45.0, (20.0, 40.0), 15.0, 10.0);
const PRO_OFFSET: AngleThresholds = AngleThresholds::new(50.0, (18.0, 35.0), 12.0, 6.0);

impl ModeThresholds {
    /// Built-in table for a (mode, exercise) pair
    ///
    /// Pro is never more forgiving than beginner on any field: higher
    /// sensitivity, shorter inactivity timeout, tighter tolerances.
    pub fn builtin(mode: ExerciseMode, exercise: ExerciseType) -> Self {
        use ExerciseMode::*;
        use ExerciseType::*;

        let (knee, hip) = match (mode, exercise) {
            (Beginner, Squat) => (
                AngleThresholds::new(150.0, (90.0, 150.0), 75.0, 15.0),
                AngleThresholds::new(160.0, (100.0, 160.0), 80.0, 20.0),
            ),
            (Pro, Squat) => (
                AngleThresholds::new(160.0, (85.0, 160.0), 70.0, 10.0),
                AngleThresholds::new(170.0, (95.0, 170.0), 75.0, 12.0),
            ),
            (Beginner, Pushup) => (
                AngleThresholds::new(160.0, (95.0, 160.0), 90.0, 15.0),
                AngleThresholds::new(165.0, (120.0, 165.0), 100.0, 20.0),
            ),
            (Pro, Pushup) => (
                AngleThresholds::new(165.0, (90.0, 165.0), 85.0, 10.0),
                AngleThresholds::new(170.0, (115.0, 170.0), 95.0, 12.0),
            ),
            (Beginner, Plank) => (
                AngleThresholds::new(175.0, (150.0, 175.0), 140.0, 15.0),
                AngleThresholds::new(170.0, (150.0, 170.0), 145.0, 15.0),
            ),
            (Pro, Plank) => (
                AngleThresholds::new(178.0, (155.0, 178.0), 150.0, 10.0),
                AngleThresholds::new(175.0, (155.0, 175.0), 150.0, 10.0),
            ),
            (Beginner, Deadlift) => (
                AngleThresholds::new(165.0, (110.0, 165.0), 95.0, 15.0),
                AngleThresholds::new(165.0, (95.0, 165.0), 70.0, 18.0),
            ),
            (Pro, Deadlift) => (
                AngleThresholds::new(170.0, (105.0, 170.0), 90.0, 10.0),
                AngleThresholds::new(172.0, (90.0, 172.0), 65.0, 12.0),
            ),
            (Beginner, BicepCurl) => (
                AngleThresholds::new(160.0, (55.0, 160.0), 50.0, 15.0),
                AngleThresholds::new(170.0, (140.0, 170.0), 120.0, 20.0),
            ),
            (Pro, BicepCurl) => (
                AngleThresholds::new(165.0, (50.0, 165.0), 45.0, 10.0),
                AngleThresholds::new(175.0, (145.0, 175.0), 125.0, 12.0),
            ),
        };

        match mode {
            Beginner => Self {
                knee,
                hip,
                offset: BEGINNER_OFFSET,
                feedback_sensitivity: 0.7,
                inactivity_timeout_secs: 30.0,
            },
            Pro => Self {
                knee,
                hip,
                offset: PRO_OFFSET,
                feedback_sensitivity: 0.9,
                inactivity_timeout_secs: 15.0,
            },
        }
    }
}

/// Result of threshold validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether every invariant holds
    pub valid: bool,
    /// One entry per violated invariant
    pub errors: Vec<String>,
}

/// Check every table invariant, collecting all violations
pub fn validate(thresholds: &ModeThresholds) -> ValidationReport {
    let mut errors = Vec::new();

    for (name, at) in [
        ("knee", &thresholds.knee),
        ("hip", &thresholds.hip),
        ("offset", &thresholds.offset),
    ] {
        if at.s1_threshold <= at.s3_threshold {
            errors.push(format!(
                "{name}: s1_threshold ({}) must exceed s3_threshold ({})",
                at.s1_threshold, at.s3_threshold
            ));
        }
        if at.s2_range.0 >= at.s2_range.1 {
            errors.push(format!(
                "{name}: s2_range lower bound ({}) must be below upper bound ({})",
                at.s2_range.0, at.s2_range.1
            ));
        }
        if at.warning_tolerance < 0.0 {
            errors.push(format!(
                "{name}: warning_tolerance ({}) must not be negative",
                at.warning_tolerance
            ));
        }
    }

    if !(0.0..=1.0).contains(&thresholds.feedback_sensitivity) {
        errors.push(format!(
            "feedback_sensitivity ({}) must be within [0, 1]",
            thresholds.feedback_sensitivity
        ));
    }
    if thresholds.inactivity_timeout_secs < 5.0 {
        errors.push(format!(
            "inactivity_timeout_secs ({}) must be at least 5",
            thresholds.inactivity_timeout_secs
        ));
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}
