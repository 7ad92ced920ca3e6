//! Exercise Configuration Service
//!
//! Owns the active (mode, exercise type) pair and the threshold table it
//! implies, validates updates against the table invariants, and fans out
//! change events to registered listeners.

mod mode;
mod overrides;
mod service;
mod thresholds;

pub use mode::{is_mode_more_strict, ExerciseMode, ExerciseType, PriorityLevel};
pub use overrides::{OverrideFile, ThresholdOverrides};
pub use service::{
    ActiveConfig, AnalysisConfig, ConfigChanges, ConfigService, FeedbackConfig, ListenerId,
    ModeChangeEvent,
};
pub use thresholds::{validate, AngleThresholds, ModeThresholds, ValidationReport};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Threshold update violated one or more table invariants; every
    /// violation is listed, not just the first
    #[error("invalid thresholds: {}", .0.join("; "))]
    InvalidThresholds(Vec<String>),

    /// Override file could not be read or parsed
    #[error("configuration file error: {0}")]
    File(#[from] config::ConfigError),
}
