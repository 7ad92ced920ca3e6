//! Phase state machine with smoothing and debouncing

use crate::phase::{ExercisePhase, PhaseTransition};
use exercise_config::{AnalysisConfig, AngleThresholds};
use kinematics::ExerciseAngles;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Transition-history ring capacity
const HISTORY_CAPACITY: usize = 50;

/// Raw phase sequence cap; trimmed to [`SEQUENCE_TRIMMED`] past this
const SEQUENCE_CAPACITY: usize = 20;
const SEQUENCE_TRIMMED: usize = 10;

/// Smoothing window over raw angle samples
const WINDOW_CAPACITY: usize = 3;

/// Overshoot past the opposite threshold that bypasses the dwell guard
const SIGNIFICANT_JUMP_DEGREES: f32 = 20.0;

/// The canonical phase pattern of one full repetition
pub const REP_PATTERN: [ExercisePhase; 5] = [
    ExercisePhase::Standing,
    ExercisePhase::Transition,
    ExercisePhase::DeepSquat,
    ExercisePhase::Transition,
    ExercisePhase::Standing,
];

const DESCENT: [ExercisePhase; 3] = [
    ExercisePhase::Standing,
    ExercisePhase::Transition,
    ExercisePhase::DeepSquat,
];

const ASCENT: [ExercisePhase; 3] = [
    ExercisePhase::DeepSquat,
    ExercisePhase::Transition,
    ExercisePhase::Standing,
];

/// Threshold-driven phase machine for one active exercise session
///
/// Owns its histories exclusively; never shared across sessions. Timing is
/// driven by frame timestamps, so replayed sessions behave identically.
pub struct StateMachine {
    current: ExercisePhase,
    previous: ExercisePhase,
    thresholds: AngleThresholds,
    analysis: AnalysisConfig,
    /// Raw primary-angle samples, oldest first
    window: VecDeque<f32>,
    last_angles: Option<ExerciseAngles>,
    phase_entered_ms: u64,
    last_transition_ms: u64,
    last_update_ms: u64,
    history: VecDeque<PhaseTransition>,
    sequence: Vec<ExercisePhase>,
    noisy_rejections: u32,
    started: bool,
}

impl StateMachine {
    /// Create a machine from the active mode's primary-angle thresholds and
    /// timing config
    pub fn new(thresholds: AngleThresholds, analysis: AnalysisConfig) -> Self {
        Self {
            current: ExercisePhase::Standing,
            previous: ExercisePhase::Standing,
            thresholds,
            analysis,
            window: VecDeque::with_capacity(WINDOW_CAPACITY),
            last_angles: None,
            phase_entered_ms: 0,
            last_transition_ms: 0,
            last_update_ms: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            sequence: Vec::with_capacity(SEQUENCE_CAPACITY),
            noisy_rejections: 0,
            started: false,
        }
    }

    /// Feed one frame's angles; returns the transition if one was accepted
    pub fn update(
        &mut self,
        angles: &ExerciseAngles,
        timestamp_ms: u64,
    ) -> Option<PhaseTransition> {
        if self.window.len() >= WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back(angles.knee_angle);
        self.last_angles = Some(*angles);

        if !self.started {
            self.started = true;
            self.phase_entered_ms = timestamp_ms;
            self.last_transition_ms = timestamp_ms;
            self.sequence.push(self.current);
        }
        self.last_update_ms = timestamp_ms;

        let smoothed = self.smoothed_angle().unwrap_or(angles.knee_angle);
        self.apply(smoothed, *angles, timestamp_ms)
    }

    /// Weighted moving average over the window, weight rising with recency
    pub fn smoothed_angle(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (i, sample) in self.window.iter().enumerate() {
            let weight = (i + 1) as f32;
            weighted += sample * weight;
            total += weight;
        }
        Some(weighted / total)
    }

    fn classify(&self, angle: f32) -> ExercisePhase {
        if angle > self.thresholds.s1_threshold {
            ExercisePhase::Standing
        } else if angle < self.thresholds.s3_threshold {
            ExercisePhase::DeepSquat
        } else {
            ExercisePhase::Transition
        }
    }

    /// A direct top-to-bottom (or reverse) jump far past the opposite
    /// threshold; bypasses the dwell guard so fast reps are not missed
    fn is_significant_change(&self, candidate: ExercisePhase, smoothed: f32) -> bool {
        match (self.current, candidate) {
            (ExercisePhase::Standing, ExercisePhase::DeepSquat) => {
                smoothed < self.thresholds.s3_threshold - SIGNIFICANT_JUMP_DEGREES
            }
            (ExercisePhase::DeepSquat, ExercisePhase::Standing) => {
                smoothed > self.thresholds.s1_threshold + SIGNIFICANT_JUMP_DEGREES
            }
            _ => false,
        }
    }

    fn apply(
        &mut self,
        smoothed: f32,
        trigger_angles: ExerciseAngles,
        timestamp_ms: u64,
    ) -> Option<PhaseTransition> {
        let candidate = self.classify(smoothed);
        if candidate == self.current {
            return None;
        }

        let dwell_ms = timestamp_ms.saturating_sub(self.phase_entered_ms);
        let dwell_met = dwell_ms >= self.analysis.min_phase_duration_ms;
        if !dwell_met && !self.is_significant_change(candidate, smoothed) {
            trace!(
                from = self.current.as_str(),
                to = candidate.as_str(),
                dwell_ms,
                "transition rejected by dwell guard"
            );
            self.noisy_rejections += 1;
            return None;
        }

        let transition = PhaseTransition {
            previous: self.current,
            current: candidate,
            timestamp_ms,
            trigger_angles,
        };
        debug!(from = self.current.as_str(), to = candidate.as_str(), smoothed, "phase transition");

        self.previous = self.current;
        self.current = candidate;
        self.phase_entered_ms = timestamp_ms;
        self.last_transition_ms = timestamp_ms;

        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(transition);

        self.sequence.push(candidate);
        if self.sequence.len() > SEQUENCE_CAPACITY {
            let cut = self.sequence.len() - SEQUENCE_TRIMMED;
            self.sequence.drain(..cut);
        }

        Some(transition)
    }

    /// Swap in a new threshold/timing config and re-evaluate the latest
    /// sample against it immediately, so a mode switch never leaves a stale
    /// phase standing
    pub fn set_config(&mut self, thresholds: AngleThresholds, analysis: AnalysisConfig) {
        self.thresholds = thresholds;
        self.analysis = analysis;

        if let (Some(smoothed), Some(angles)) = (self.smoothed_angle(), self.last_angles) {
            self.apply(smoothed, angles, self.last_update_ms);
        }
    }

    /// Whether the raw phase sequence contains one full repetition pattern
    pub fn is_valid_repetition(&self) -> bool {
        self.sequence.windows(REP_PATTERN.len()).any(|w| w == REP_PATTERN)
    }

    /// Whether a pure descent or pure ascent is in progress (for progress
    /// feedback before the rep closes)
    pub fn has_valid_partial_sequence(&self) -> bool {
        self.sequence
            .windows(DESCENT.len())
            .any(|w| w == DESCENT || w == ASCENT)
    }

    /// Consume the earliest matched repetition so overlapping matches of the
    /// same physical rep are never counted twice; the closing Standing phase
    /// is kept as the head of the next rep
    pub fn consume_repetition(&mut self) -> bool {
        let Some(start) = self
            .sequence
            .windows(REP_PATTERN.len())
            .position(|w| w == REP_PATTERN)
        else {
            return false;
        };
        self.sequence.drain(..start + REP_PATTERN.len() - 1);
        true
    }

    /// No accepted transition for longer than the configured timeout
    pub fn is_inactive(&self, now_ms: u64) -> bool {
        self.is_inactive_for(now_ms, self.analysis.inactivity_timeout_secs)
    }

    /// Inactivity check against an explicit timeout in seconds
    pub fn is_inactive_for(&self, now_ms: u64, timeout_secs: f32) -> bool {
        if !self.started {
            return false;
        }
        let elapsed_ms = now_ms.saturating_sub(self.last_transition_ms);
        elapsed_ms as f32 / 1000.0 > timeout_secs
    }

    /// Rejected-transition count since last taken (smoothness input for rep
    /// grading)
    pub fn take_noise_count(&mut self) -> u32 {
        std::mem::take(&mut self.noisy_rejections)
    }

    pub fn current_phase(&self) -> ExercisePhase {
        self.current
    }

    pub fn previous_phase(&self) -> ExercisePhase {
        self.previous
    }

    /// Bounded transition history, oldest first
    pub fn history(&self) -> Vec<PhaseTransition> {
        self.history.iter().copied().collect()
    }

    /// Raw accepted-phase sequence used for repetition matching
    pub fn raw_sequence(&self) -> &[ExercisePhase] {
        &self.sequence
    }

    /// Clear all state for a fresh session segment
    pub fn reset(&mut self) {
        self.current = ExercisePhase::Standing;
        self.previous = ExercisePhase::Standing;
        self.window.clear();
        self.last_angles = None;
        self.history.clear();
        self.sequence.clear();
        self.noisy_rejections = 0;
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exercise_config::{ExerciseMode, ExerciseType, ModeThresholds};

    fn beginner_machine() -> StateMachine {
        let table = ModeThresholds::builtin(ExerciseMode::Beginner, ExerciseType::Squat);
        let analysis = AnalysisConfig::for_mode(ExerciseMode::Beginner, &table);
        StateMachine::new(table.knee, analysis)
    }

    fn angles(knee: f32) -> ExerciseAngles {
        ExerciseAngles {
            knee_angle: knee,
            hip_angle: 170.0,
            ankle_angle: 100.0,
            offset_angle: 5.0,
        }
    }

    /// Feed a sustained angle level, one frame per `step_ms`
    fn feed(machine: &mut StateMachine, knee: f32, start_ms: u64, frames: u64, step_ms: u64) -> u64 {
        let mut t = start_ms;
        for _ in 0..frames {
            machine.update(&angles(knee), t);
            t += step_ms;
        }
        t
    }

    #[test]
    fn test_full_repetition_is_recognized() {
        let mut machine = beginner_machine();
        let mut t = feed(&mut machine, 170.0, 0, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        t = feed(&mut machine, 70.0, t, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        feed(&mut machine, 170.0, t, 4, 100);

        assert!(machine.is_valid_repetition());
    }

    #[test]
    fn test_no_depth_is_not_a_repetition() {
        let mut machine = beginner_machine();
        let mut t = feed(&mut machine, 170.0, 0, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        feed(&mut machine, 170.0, t, 4, 100);

        // Standing -> Transition -> Standing: no deep phase reached
        assert!(!machine.is_valid_repetition());
    }

    #[test]
    fn test_partial_descent_is_recognized() {
        let mut machine = beginner_machine();
        let mut t = feed(&mut machine, 170.0, 0, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        feed(&mut machine, 70.0, t, 4, 100);

        assert!(machine.has_valid_partial_sequence());
        assert!(!machine.is_valid_repetition());
    }

    #[test]
    fn test_dwell_guard_rejects_rapid_flicker() {
        let mut machine = beginner_machine();
        feed(&mut machine, 170.0, 0, 4, 100);
        machine.update(&angles(110.0), 400);
        assert_eq!(machine.current_phase(), ExercisePhase::Transition);

        // Samples snapping back above s1 within the dwell window must not
        // flip the phase; they are recorded as noise instead.
        machine.update(&angles(170.0), 450);
        machine.update(&angles(170.0), 460);
        assert_eq!(machine.current_phase(), ExercisePhase::Transition);
        assert!(machine.take_noise_count() > 0);
    }

    #[test]
    fn test_significant_jump_bypasses_dwell() {
        let mut machine = beginner_machine();
        machine.update(&angles(170.0), 0);
        assert_eq!(machine.current_phase(), ExercisePhase::Standing);

        // Sustained extreme samples push the smoothed angle more than 20
        // degrees past s3 within the dwell window.
        machine.update(&angles(30.0), 30);
        machine.update(&angles(30.0), 60);
        machine.update(&angles(30.0), 90);
        assert_eq!(machine.current_phase(), ExercisePhase::DeepSquat);
    }

    #[test]
    fn test_consume_repetition_prevents_double_count() {
        let mut machine = beginner_machine();
        let mut t = feed(&mut machine, 170.0, 0, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        t = feed(&mut machine, 70.0, t, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        feed(&mut machine, 170.0, t, 4, 100);

        assert!(machine.consume_repetition());
        assert!(!machine.is_valid_repetition());
        // The closing Standing phase seeds the next repetition
        assert_eq!(machine.raw_sequence(), [ExercisePhase::Standing]);
    }

    #[test]
    fn test_sequence_is_trimmed_past_capacity() {
        let mut machine = beginner_machine();
        let mut t = 0;
        for _ in 0..15 {
            t = feed(&mut machine, 170.0, t, 3, 150);
            t = feed(&mut machine, 110.0, t, 3, 150);
        }
        assert!(machine.raw_sequence().len() <= SEQUENCE_CAPACITY);
    }

    #[test]
    fn test_history_ring_is_bounded() {
        let mut machine = beginner_machine();
        let mut t = 0;
        for _ in 0..60 {
            t = feed(&mut machine, 170.0, t, 3, 150);
            t = feed(&mut machine, 110.0, t, 3, 150);
        }
        assert!(machine.history().len() <= HISTORY_CAPACITY);
    }

    #[test]
    fn test_inactivity() {
        let mut machine = beginner_machine();
        let t = feed(&mut machine, 170.0, 0, 4, 100);

        assert!(!machine.is_inactive(t));
        // Beginner inactivity timeout is 30s
        assert!(machine.is_inactive(t + 31_000));
        assert!(machine.is_inactive_for(t + 6_000, 5.0));
    }

    #[test]
    fn test_mode_switch_reevaluates_immediately() {
        let mut machine = beginner_machine();
        let mut t = feed(&mut machine, 170.0, 0, 4, 100);
        t = feed(&mut machine, 110.0, t, 4, 100);
        feed(&mut machine, 72.0, t, 6, 100);
        // 72 is below the beginner s3 of 75
        assert_eq!(machine.current_phase(), ExercisePhase::DeepSquat);

        // Pro s3 is 70: the same angle is no longer deep enough, and the
        // machine must notice without waiting for the next frame.
        let pro = ModeThresholds::builtin(ExerciseMode::Pro, ExerciseType::Squat);
        machine.set_config(pro.knee, AnalysisConfig::for_mode(ExerciseMode::Pro, &pro));
        assert_eq!(machine.current_phase(), ExercisePhase::Transition);
    }

    #[test]
    fn test_smoothing_weights_favor_recent_samples() {
        let mut machine = beginner_machine();
        machine.update(&angles(170.0), 0);
        machine.update(&angles(170.0), 100);
        machine.update(&angles(80.0), 200);

        // (170*1 + 170*2 + 80*3) / 6 = 125
        let smoothed = machine.smoothed_angle().unwrap();
        assert!((smoothed - 125.0).abs() < 0.5);
    }
}
