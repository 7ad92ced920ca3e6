//! Exercise phases and transition records

use kinematics::ExerciseAngles;
use serde::{Deserialize, Serialize};

/// Discrete stage of an exercise repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExercisePhase {
    /// Upright / top position
    #[default]
    Standing,
    /// Between the top and bottom thresholds
    Transition,
    /// Bottom position, full depth reached
    DeepSquat,
}

impl ExercisePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExercisePhase::Standing => "standing",
            ExercisePhase::Transition => "transition",
            ExercisePhase::DeepSquat => "deep-squat",
        }
    }
}

/// One accepted phase transition
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub previous: ExercisePhase,
    pub current: ExercisePhase,
    /// Frame timestamp at which the transition was accepted (ms)
    pub timestamp_ms: u64,
    /// Angles that triggered the transition
    pub trigger_angles: ExerciseAngles,
}
