//! Skill modes, exercise types, and priority levels

use serde::{Deserialize, Serialize};

/// Skill mode selecting a threshold table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseMode {
    /// Lenient thresholds, encouraging feedback
    #[default]
    Beginner,
    /// Strict thresholds, precision feedback, faster state response
    Pro,
}

impl ExerciseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseMode::Beginner => "beginner",
            ExerciseMode::Pro => "pro",
        }
    }

    fn strictness_rank(&self) -> u8 {
        match self {
            ExerciseMode::Beginner => 0,
            ExerciseMode::Pro => 1,
        }
    }
}

/// Strict total order over modes; reflexive comparisons are false
pub fn is_mode_more_strict(a: ExerciseMode, b: ExerciseMode) -> bool {
    a.strictness_rank() > b.strictness_rank()
}

/// Supported exercise types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseType {
    #[default]
    Squat,
    Pushup,
    Plank,
    Deadlift,
    BicepCurl,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::Pushup => "pushup",
            ExerciseType::Plank => "plank",
            ExerciseType::Deadlift => "deadlift",
            ExerciseType::BicepCurl => "bicep-curl",
        }
    }
}

/// Feedback priority, ordered from least to most urgent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}
