//! Partial threshold overrides, optionally loaded from a file

use crate::mode::ExerciseMode;
use crate::service::ConfigService;
use crate::thresholds::{AngleThresholds, ModeThresholds};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Partial update merged field-by-field into an existing table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdOverrides {
    pub knee: Option<AngleThresholds>,
    pub hip: Option<AngleThresholds>,
    pub offset: Option<AngleThresholds>,
    pub feedback_sensitivity: Option<f32>,
    pub inactivity_timeout_secs: Option<f32>,
}

impl ThresholdOverrides {
    /// Merge this partial update over a base table
    pub fn apply_to(&self, base: &ModeThresholds) -> ModeThresholds {
        ModeThresholds {
            knee: self.knee.unwrap_or(base.knee),
            hip: self.hip.unwrap_or(base.hip),
            offset: self.offset.unwrap_or(base.offset),
            feedback_sensitivity: self
                .feedback_sensitivity
                .unwrap_or(base.feedback_sensitivity),
            inactivity_timeout_secs: self
                .inactivity_timeout_secs
                .unwrap_or(base.inactivity_timeout_secs),
        }
    }
}

/// On-disk override layout: one optional section per mode
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideFile {
    pub beginner: Option<ThresholdOverrides>,
    pub pro: Option<ThresholdOverrides>,
}

impl OverrideFile {
    /// Load overrides from a TOML/YAML/JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl ConfigService {
    /// Apply an override file to the service
    ///
    /// Each mode section is validated independently; the first invalid
    /// section rejects with its full error list and leaves the active
    /// configuration in effect.
    pub fn apply_override_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let file = OverrideFile::load(path)?;
        info!(path = %path.display(), "applying threshold override file");

        if let Some(overrides) = &file.beginner {
            self.update_thresholds(ExerciseMode::Beginner, overrides)?;
        }
        if let Some(overrides) = &file.pro {
            self.update_thresholds(ExerciseMode::Pro, overrides)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ExerciseType;

    #[test]
    fn test_apply_to_merges_only_present_fields() {
        let base = ModeThresholds::builtin(ExerciseMode::Beginner, ExerciseType::Squat);
        let partial = ThresholdOverrides {
            feedback_sensitivity: Some(0.8),
            ..Default::default()
        };

        let merged = partial.apply_to(&base);
        assert!((merged.feedback_sensitivity - 0.8).abs() < 1e-6);
        assert_eq!(merged.knee, base.knee);
        assert_eq!(merged.hip, base.hip);
    }

    #[test]
    fn test_override_file_deserializes_from_json() {
        let raw = r#"{
            "pro": {
                "feedback_sensitivity": 0.95,
                "knee": {
                    "s1_threshold": 162.0,
                    "s2_range": [85.0, 162.0],
                    "s3_threshold": 68.0,
                    "warning_tolerance": 8.0
                }
            }
        }"#;

        let file: OverrideFile = serde_json::from_str(raw).unwrap();
        let pro = file.pro.unwrap();
        assert!((pro.feedback_sensitivity.unwrap() - 0.95).abs() < 1e-6);
        assert!((pro.knee.unwrap().s3_threshold - 68.0).abs() < 1e-6);
        assert!(file.beginner.is_none());
    }
}
