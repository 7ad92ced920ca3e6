//! Adaptive Feedback Engine
//!
//! Turns the per-frame analysis results into one prioritized feedback
//! payload: a throttled audio channel and an always-on visual channel. The
//! two channels are decoupled; only audio is rate limited.

mod engine;

pub use engine::{FeedbackEngine, FeedbackInput};

use exercise_config::PriorityLevel;
use serde::{Deserialize, Serialize};

/// What a visual cue renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueKind {
    /// Persistent rep-count overlay
    RepCounter,
    /// Live angle readout
    AngleReadout,
    /// Form-violation marker
    WarningMarker,
    /// Camera repositioning guide
    PositioningGuide,
    /// Current exercise phase
    PhaseIndicator,
}

/// Screen position in percent of screen space (0 to 100 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CuePosition {
    pub x: f32,
    pub y: f32,
}

/// One on-screen cue; the renderer contract is positions in screen percent,
/// colors as six-digit hex strings, durations in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualCue {
    pub kind: CueKind,
    pub position: CuePosition,
    pub color: String,
    pub message: String,
    pub duration_ms: u64,
}

/// One feedback payload per pipeline cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub audio_messages: Vec<String>,
    pub visual_cues: Vec<VisualCue>,
    pub priority: PriorityLevel,
    pub should_speak: bool,
}
