//! Rep counting and deterministic quality grading

use exercise_config::ExerciseMode;
use exercise_state::StateMachine;
use form_analysis::{FormViolation, Severity};
use kinematics::ExerciseAngles;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Quality grade of one completed repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepQuality {
    Excellent,
    Good,
    NeedsImprovement,
    Poor,
}

impl RepQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepQuality::Excellent => "excellent",
            RepQuality::Good => "good",
            RepQuality::NeedsImprovement => "needs-improvement",
            RepQuality::Poor => "poor",
        }
    }
}

/// Emitted each time a full phase cycle closes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepCountResult {
    pub rep_completed: bool,
    pub rep_quality: RepQuality,
    pub feedback: String,
    /// Signals the caller to clear transient rep-in-progress UI state
    pub should_reset: bool,
}

/// Grading parameters for one mode
#[derive(Debug, Clone, Copy)]
pub struct RepCounterConfig {
    /// Bottom knee-angle band graded as full, controlled depth
    pub optimal_bottom_range: (f32, f32),
}

impl RepCounterConfig {
    pub fn for_mode(mode: ExerciseMode) -> Self {
        match mode {
            ExerciseMode::Beginner => Self {
                optimal_bottom_range: (70.0, 90.0),
            },
            ExerciseMode::Pro => Self {
                optimal_bottom_range: (65.0, 85.0),
            },
        }
    }
}

/// Per-quality totals for the session summary
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityTally {
    pub excellent: u32,
    pub good: u32,
    pub needs_improvement: u32,
    pub poor: u32,
}

/// Repetition counter for one exercise session
pub struct RepCounter {
    config: RepCounterConfig,
    total: u32,
    tally: QualityTally,
    // Observations accumulated over the current rep window
    window_min_knee: Option<f32>,
    medium_violation_seen: bool,
    high_violation_seen: bool,
}

impl RepCounter {
    pub fn new(config: RepCounterConfig) -> Self {
        Self {
            config,
            total: 0,
            tally: QualityTally::default(),
            window_min_knee: None,
            medium_violation_seen: false,
            high_violation_seen: false,
        }
    }

    pub fn for_mode(mode: ExerciseMode) -> Self {
        Self::new(RepCounterConfig::for_mode(mode))
    }

    /// Re-derive grading parameters after a mode switch
    pub fn set_mode(&mut self, mode: ExerciseMode) {
        self.config = RepCounterConfig::for_mode(mode);
    }

    /// Record one frame's angles and violations into the rep window
    pub fn observe(&mut self, angles: &ExerciseAngles, violations: &[FormViolation]) {
        self.window_min_knee = Some(match self.window_min_knee {
            Some(min) => min.min(angles.knee_angle),
            None => angles.knee_angle,
        });
        for v in violations {
            match v.severity {
                Severity::High => self.high_violation_seen = true,
                Severity::Medium => self.medium_violation_seen = true,
                Severity::Low => {}
            }
        }
    }

    /// Check the machine for a completed repetition and grade it
    ///
    /// The matched phase window is consumed from the machine, so overlapping
    /// matches of the same physical rep are never counted twice.
    pub fn evaluate(&mut self, machine: &mut StateMachine) -> Option<RepCountResult> {
        if !machine.is_valid_repetition() {
            return None;
        }
        machine.consume_repetition();

        let noise = machine.take_noise_count();
        let quality = self.grade(noise);

        self.total += 1;
        match quality {
            RepQuality::Excellent => self.tally.excellent += 1,
            RepQuality::Good => self.tally.good += 1,
            RepQuality::NeedsImprovement => self.tally.needs_improvement += 1,
            RepQuality::Poor => self.tally.poor += 1,
        }
        info!(rep = self.total, quality = quality.as_str(), noise, "repetition completed");

        let feedback = self.feedback_message(quality);
        self.clear_window();

        Some(RepCountResult {
            rep_completed: true,
            rep_quality: quality,
            feedback,
            should_reset: true,
        })
    }

    /// Deterministic grade from the rep window observations
    fn grade(&self, noise: u32) -> RepQuality {
        if self.high_violation_seen {
            return RepQuality::Poor;
        }

        let depth_ok = self
            .window_min_knee
            .map(|min| {
                let (lo, hi) = self.config.optimal_bottom_range;
                (lo..=hi).contains(&min)
            })
            .unwrap_or(false);

        if !depth_ok || noise > 3 {
            RepQuality::NeedsImprovement
        } else if self.medium_violation_seen || noise > 1 {
            RepQuality::Good
        } else {
            RepQuality::Excellent
        }
    }

    /// Quality message, with milestone phrasing on reps 1, 5, 10, and every
    /// fifth rep after that
    fn feedback_message(&self, quality: RepQuality) -> String {
        let n = self.total;
        if matches!(quality, RepQuality::Excellent | RepQuality::Good) {
            match n {
                1 => return "First quality rep in the bank!".to_string(),
                5 => return "Five quality reps, great pace!".to_string(),
                10 => return "Ten reps, you're crushing it!".to_string(),
                n if n % 5 == 0 => return format!("{n} reps completed, keep the rhythm!"),
                _ => {}
            }
        }
        match quality {
            RepQuality::Excellent => format!("Excellent rep {n}! Great depth and control"),
            RepQuality::Good => format!("Good rep {n}, keep it up"),
            RepQuality::NeedsImprovement => format!("Rep {n} counted, tighten up the movement"),
            RepQuality::Poor => format!("Rep {n} had form issues, slow down and reset"),
        }
    }

    fn clear_window(&mut self) {
        debug!("clearing rep observation window");
        self.window_min_knee = None;
        self.medium_violation_seen = false;
        self.high_violation_seen = false;
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn quality_tally(&self) -> QualityTally {
        self.tally
    }

    /// Reset counts for a fresh session
    pub fn reset(&mut self) {
        self.total = 0;
        self.tally = QualityTally::default();
        self.clear_window();
    }
}
