//! Feedback generation, prioritization, and audio throttling

use crate::{CueKind, CuePosition, FeedbackResponse, VisualCue};
use exercise_config::{ExerciseMode, FeedbackConfig, PriorityLevel};
use exercise_state::ExercisePhase;
use form_analysis::{FormViolation, Severity};
use kinematics::ExerciseAngles;
use pose_frame::CameraView;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use rep_counter::RepCountResult;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Chance per call of emitting phase guidance, to avoid chatter
const GUIDANCE_PROBABILITY: f32 = 0.3;

const COLOR_WHITE: &str = "#FFFFFF";
const COLOR_GREEN: &str = "#2ECC71";
const COLOR_BLUE: &str = "#3498DB";
const COLOR_AMBER: &str = "#F39C12";
const COLOR_RED: &str = "#E74C3C";

const REPOSITION_MESSAGE: &str =
    "Turn side-on to the camera so your whole body is visible";

/// Everything one feedback decision needs
pub struct FeedbackInput<'a> {
    pub violations: &'a [FormViolation],
    pub phase: ExercisePhase,
    pub angles: Option<&'a ExerciseAngles>,
    pub camera_view: CameraView,
    pub rep_result: Option<&'a RepCountResult>,
    pub rep_total: u32,
}

/// Adaptive feedback engine for one session
///
/// Re-derives its frequency and priority floor whenever the configuration
/// service announces a mode change; it never polls.
pub struct FeedbackEngine {
    mode: ExerciseMode,
    config: FeedbackConfig,
    last_audio: Option<Instant>,
    rng: Box<dyn RngCore + Send>,
}

impl FeedbackEngine {
    pub fn new(mode: ExerciseMode, config: FeedbackConfig) -> Self {
        Self::with_rng(mode, config, Box::new(SmallRng::from_entropy()))
    }

    /// Deterministic engine for tests: inject the RNG driving the
    /// probabilistic guidance branch
    pub fn with_rng(mode: ExerciseMode, config: FeedbackConfig, rng: Box<dyn RngCore + Send>) -> Self {
        info!(mode = mode.as_str(), frequency_ms = config.frequency_ms, "creating feedback engine");
        Self {
            mode,
            config,
            last_audio: None,
            rng,
        }
    }

    /// Mode-change subscription target
    pub fn apply_mode_change(&mut self, mode: ExerciseMode, config: FeedbackConfig) {
        debug!(mode = mode.as_str(), frequency_ms = config.frequency_ms, "feedback engine reconfigured");
        self.mode = mode;
        self.config = config;
    }

    pub fn config(&self) -> FeedbackConfig {
        self.config
    }

    /// Produce one feedback payload for the current cycle
    pub fn generate(&mut self, input: &FeedbackInput) -> FeedbackResponse {
        // Hard gate: an unusable camera view suppresses everything else and
        // repeats a single repositioning instruction.
        if !input.camera_view.is_usable() {
            self.last_audio = Some(Instant::now());
            return FeedbackResponse {
                audio_messages: vec![REPOSITION_MESSAGE.to_string()],
                visual_cues: vec![VisualCue {
                    kind: CueKind::PositioningGuide,
                    position: CuePosition { x: 50.0, y: 50.0 },
                    color: COLOR_AMBER.to_string(),
                    message: REPOSITION_MESSAGE.to_string(),
                    duration_ms: 2000,
                }],
                priority: PriorityLevel::High,
                should_speak: true,
            };
        }

        let (audio, priority) = self.pick_audio(input);
        let should_speak = !audio.is_empty() && self.pass_throttle(priority);

        FeedbackResponse {
            audio_messages: audio,
            visual_cues: self.visual_cues(input),
            priority,
            should_speak,
        }
    }

    /// Walk the precedence ladder and pick at most one audio message
    fn pick_audio(&mut self, input: &FeedbackInput) -> (Vec<String>, PriorityLevel) {
        // Rep completion is always worth announcing
        if let Some(rep) = input.rep_result {
            if rep.rep_completed {
                return (vec![rep.feedback.clone()], PriorityLevel::High);
            }
        }

        // Any High-severity violation is a safety call-out
        if let Some(v) = input.violations.iter().find(|v| v.severity == Severity::High) {
            return (vec![v.correction_hint.clone()], PriorityLevel::Critical);
        }

        // Occasional phase guidance, gated on the RNG to avoid chatter
        if self.rng.gen::<f32>() < GUIDANCE_PROBABILITY {
            return (vec![phase_guidance(input.phase).to_string()], PriorityLevel::Low);
        }

        // General correction from the worst remaining violation; Low-severity
        // issues stay silent for beginners to avoid overwhelming them
        if let Some(v) = input.violations.iter().max_by_key(|v| v.severity) {
            let priority = match v.severity {
                Severity::Medium | Severity::High => PriorityLevel::Medium,
                Severity::Low => PriorityLevel::Low,
            };
            if v.severity == Severity::Low && self.mode == ExerciseMode::Beginner {
                return (Vec::new(), PriorityLevel::Low);
            }
            return (vec![v.correction_hint.clone()], priority);
        }

        (Vec::new(), PriorityLevel::Low)
    }

    /// Critical and High bypass the time throttle entirely; lower priorities
    /// are rate limited and gated on the configured priority floor
    fn pass_throttle(&mut self, priority: PriorityLevel) -> bool {
        let now = Instant::now();
        if priority >= PriorityLevel::High {
            self.last_audio = Some(now);
            return true;
        }

        if priority < self.config.min_priority {
            debug!(?priority, "audio below priority floor");
            return false;
        }

        let window = Duration::from_millis(self.config.frequency_ms);
        let elapsed_ok = self
            .last_audio
            .map(|t| now.duration_since(t) >= window)
            .unwrap_or(true);
        if elapsed_ok {
            self.last_audio = Some(now);
            true
        } else {
            debug!(?priority, "audio throttled");
            false
        }
    }

    /// Visual cues are produced every call, independent of audio throttling
    fn visual_cues(&self, input: &FeedbackInput) -> Vec<VisualCue> {
        let mut cues = vec![VisualCue {
            kind: CueKind::RepCounter,
            position: CuePosition { x: 5.0, y: 5.0 },
            color: COLOR_WHITE.to_string(),
            message: format!("Reps: {}", input.rep_total),
            duration_ms: 1000,
        }];

        if let Some(angles) = input.angles {
            cues.push(VisualCue {
                kind: CueKind::AngleReadout,
                position: CuePosition { x: 5.0, y: 15.0 },
                color: COLOR_BLUE.to_string(),
                message: format!("Knee {:.0} deg", angles.knee_angle),
                duration_ms: 500,
            });
        }

        cues.push(VisualCue {
            kind: CueKind::PhaseIndicator,
            position: CuePosition { x: 5.0, y: 25.0 },
            color: COLOR_GREEN.to_string(),
            message: input.phase.as_str().to_string(),
            duration_ms: 500,
        });

        for v in input.violations.iter().filter(|v| v.severity >= Severity::Medium) {
            let color = if v.severity == Severity::High {
                COLOR_RED
            } else {
                COLOR_AMBER
            };
            cues.push(VisualCue {
                kind: CueKind::WarningMarker,
                position: CuePosition { x: 50.0, y: 20.0 },
                color: color.to_string(),
                message: v.description.clone(),
                duration_ms: 1500,
            });
        }

        cues
    }
}

fn phase_guidance(phase: ExercisePhase) -> &'static str {
    match phase {
        ExercisePhase::Standing => "Set your stance and brace before the next rep",
        ExercisePhase::Transition => "Control the movement, steady tempo",
        ExercisePhase::DeepSquat => "Strong position, drive up through the heels",
    }
}
