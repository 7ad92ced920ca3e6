//! Workout Session
//!
//! Composes the pipeline: angle extraction, phase machine, form analysis,
//! rep counting, feedback, and performance monitoring, wired by explicit
//! dependency injection and owned by one session object with a defined
//! lifecycle. One frame flows synchronously through the whole cycle before
//! the next is accepted.

mod offload;
pub mod synthetic;

pub use offload::{AngleWorker, OffloadError, DEFAULT_OFFLOAD_TIMEOUT};

use chrono::{DateTime, Utc};
use exercise_config::{
    ConfigError, ConfigService, ExerciseMode, ExerciseType, ModeChangeEvent, ThresholdOverrides,
};
use exercise_state::{ExercisePhase, PhaseTransition, StateMachine};
use feedback::{FeedbackEngine, FeedbackInput, FeedbackResponse};
use form_analysis::{FormAnalyzer, FormReport};
use kinematics::{classify_camera_view, extract_angles, ExerciseAngles};
use perf_monitor::{MonitorConfig, PerformanceMetrics, PerformanceMonitor, PerformanceVerdict};
use pose_frame::{CameraView, Joint, PoseFrame};
use rep_counter::{QualityTally, RepCountResult, RepCounter};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Completed-rep records retained for the telemetry snapshot
const REP_LOG_CAPACITY: usize = 50;

/// Joints whose mean visibility feeds the confidence metric
const CONFIDENCE_JOINTS: [Joint; 8] = [
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftKnee,
    Joint::RightKnee,
    Joint::LeftAnkle,
    Joint::RightAnkle,
];

/// Everything one frame cycle produced
#[derive(Debug)]
pub struct FrameOutcome {
    pub phase: ExercisePhase,
    pub angles: Option<ExerciseAngles>,
    pub camera_view: CameraView,
    pub report: Option<FormReport>,
    pub rep: Option<RepCountResult>,
    pub feedback: FeedbackResponse,
    /// Offload failed and extraction fell back to the in-process path
    pub used_offload_fallback: bool,
}

/// Read-only snapshot for an external session recorder; the pipeline itself
/// performs no I/O
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub exercise: ExerciseType,
    pub mode: ExerciseMode,
    pub current_phase: ExercisePhase,
    pub total_reps: u32,
    pub quality: QualityTally,
    pub started_at: DateTime<Utc>,
    pub metrics: PerformanceMetrics,
    pub mode_changes: Vec<ModeChangeEvent>,
    pub recent_reps: Vec<RepCountResult>,
}

/// One workout session's pipeline instance
///
/// Created when a session starts and dropped when it ends; no component is a
/// process-wide singleton.
pub struct WorkoutSession {
    config: ConfigService,
    machine: StateMachine,
    counter: RepCounter,
    analyzer: FormAnalyzer,
    feedback: Arc<Mutex<FeedbackEngine>>,
    monitor: PerformanceMonitor,
    worker: Option<AngleWorker>,
    started_at: DateTime<Utc>,
    rep_log: Vec<RepCountResult>,
}

impl WorkoutSession {
    pub fn new(mode: ExerciseMode, exercise: ExerciseType) -> Self {
        Self::with_monitor(mode, exercise, MonitorConfig::default())
    }

    pub fn with_monitor(
        mode: ExerciseMode,
        exercise: ExerciseType,
        monitor_config: MonitorConfig,
    ) -> Self {
        info!(mode = mode.as_str(), exercise = exercise.as_str(), "starting workout session");
        let mut config = ConfigService::new(mode, exercise);
        let active = config.active();

        let engine = Arc::new(Mutex::new(FeedbackEngine::new(mode, active.feedback)));
        let subscriber = Arc::clone(&engine);
        config.add_mode_change_listener(move |event| {
            lock_engine(&subscriber).apply_mode_change(event.new_mode, event.feedback);
        });

        Self {
            machine: StateMachine::new(active.thresholds.knee, active.analysis),
            counter: RepCounter::for_mode(mode),
            analyzer: FormAnalyzer::new(exercise, mode),
            feedback: engine,
            monitor: PerformanceMonitor::new(monitor_config),
            worker: None,
            config,
            started_at: Utc::now(),
            rep_log: Vec::new(),
        }
    }

    /// Offload angle extraction to a worker task (requires a tokio runtime)
    pub fn enable_offload(&mut self) {
        self.worker = Some(AngleWorker::spawn());
    }

    /// Install a specific worker; tests use this to simulate failures
    pub fn set_worker(&mut self, worker: AngleWorker) {
        self.worker = Some(worker);
    }

    /// Run one frame through the whole pipeline cycle
    pub async fn process_frame(&mut self, frame: &PoseFrame) -> FrameOutcome {
        let start = self.monitor.start_frame();
        let camera_view = classify_camera_view(frame);

        let (angles, used_offload_fallback) = match &self.worker {
            Some(worker) => match worker.extract(frame).await {
                Ok(angles) => (angles, false),
                Err(err) => {
                    warn!(error = %err, "offload failed; extracting in process");
                    (extract_angles(frame), true)
                }
            },
            None => (extract_angles(frame), false),
        };

        let mut report = None;
        let mut rep = None;
        if let Some(a) = &angles {
            self.machine.update(a, frame.timestamp_ms);
            let r = self.analyzer.analyze(frame, a, self.machine.current_phase());
            self.counter.observe(a, &r.violations);
            rep = self.counter.evaluate(&mut self.machine);
            report = Some(r);
        }

        if let Some(r) = &rep {
            if self.rep_log.len() >= REP_LOG_CAPACITY {
                self.rep_log.remove(0);
            }
            self.rep_log.push(r.clone());
        }

        let empty = [];
        let violations = report
            .as_ref()
            .map(|r| r.violations.as_slice())
            .unwrap_or(&empty);
        let response = lock_engine(&self.feedback).generate(&FeedbackInput {
            violations,
            phase: self.machine.current_phase(),
            angles: angles.as_ref(),
            camera_view,
            rep_result: rep.as_ref(),
            rep_total: self.counter.total(),
        });

        let confidence = frame.mean_visibility(&CONFIDENCE_JOINTS) as f64;
        self.monitor.end_frame(start, Some(confidence));

        FrameOutcome {
            phase: self.machine.current_phase(),
            angles,
            camera_view,
            report,
            rep,
            feedback: response,
            used_offload_fallback,
        }
    }

    /// Switch skill mode; listeners fire synchronously and the machine
    /// re-evaluates against the new thresholds before this returns
    pub fn switch_mode(&mut self, mode: ExerciseMode) -> ModeChangeEvent {
        let event = self.config.switch_mode(mode);
        self.sync_components();
        event
    }

    /// Switch exercise type, preserving the mode
    pub fn switch_exercise_type(&mut self, exercise: ExerciseType) -> ModeChangeEvent {
        let event = self.config.switch_exercise_type(exercise);
        self.sync_components();
        event
    }

    /// Apply partial threshold overrides to a mode's table
    pub fn update_thresholds(
        &mut self,
        mode: ExerciseMode,
        overrides: &ThresholdOverrides,
    ) -> Result<(), ConfigError> {
        self.config.update_thresholds(mode, overrides)?;
        self.sync_components();
        Ok(())
    }

    /// Layer threshold overrides from a configuration file
    pub fn apply_override_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        self.config.apply_override_file(path)?;
        self.sync_components();
        Ok(())
    }

    fn sync_components(&mut self) {
        let active = self.config.active();
        self.machine.set_config(active.thresholds.knee, active.analysis);
        self.analyzer.set_exercise(active.exercise_type);
        self.analyzer.set_mode(active.mode);
        self.counter.set_mode(active.mode);
    }

    pub fn mode(&self) -> ExerciseMode {
        self.config.mode()
    }

    pub fn exercise(&self) -> ExerciseType {
        self.config.exercise_type()
    }

    pub fn current_phase(&self) -> ExercisePhase {
        self.machine.current_phase()
    }

    pub fn rep_total(&self) -> u32 {
        self.counter.total()
    }

    /// Transition history of the active machine
    pub fn phase_history(&self) -> Vec<PhaseTransition> {
        self.machine.history()
    }

    /// No accepted phase transition for longer than the mode's timeout
    pub fn is_inactive(&self, now_ms: u64) -> bool {
        self.machine.is_inactive(now_ms)
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.monitor.metrics()
    }

    pub fn is_performance_acceptable(&self) -> PerformanceVerdict {
        self.monitor.is_performance_acceptable()
    }

    pub fn performance_recommendations(&self) -> Vec<String> {
        self.monitor.recommendations()
    }

    /// Feedback settings currently in effect (kept fresh by subscription)
    pub fn feedback_config(&self) -> exercise_config::FeedbackConfig {
        lock_engine(&self.feedback).config()
    }

    /// Read-only telemetry snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            exercise: self.config.exercise_type(),
            mode: self.config.mode(),
            current_phase: self.machine.current_phase(),
            total_reps: self.counter.total(),
            quality: self.counter.quality_tally(),
            started_at: self.started_at,
            metrics: self.monitor.metrics(),
            mode_changes: self.config.mode_change_history(),
            recent_reps: self.rep_log.clone(),
        }
    }

    /// Reset transient state for a fresh session segment; configuration and
    /// listeners survive
    pub fn reset(&mut self) {
        info!("resetting session state");
        self.machine.reset();
        self.counter.reset();
        self.monitor.reset();
        self.rep_log.clear();
        self.started_at = Utc::now();
    }
}

/// Lock the shared feedback engine, recovering from a poisoned lock
fn lock_engine(engine: &Arc<Mutex<FeedbackEngine>>) -> MutexGuard<'_, FeedbackEngine> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{squat_frame, SquatSimulator};
    use exercise_config::PriorityLevel;
    use pose_frame::Landmark;
    use rep_counter::RepQuality;
    use std::time::Duration;

    /// Feed one sustained angle level through the session
    async fn feed(
        session: &mut WorkoutSession,
        knee: f32,
        start_ms: u64,
        frames: u64,
    ) -> (u64, Vec<RepCountResult>) {
        let mut reps = Vec::new();
        let mut t = start_ms;
        for _ in 0..frames {
            let frame = squat_frame(knee, t, 0);
            let outcome = session.process_frame(&frame).await;
            if let Some(rep) = outcome.rep {
                reps.push(rep);
            }
            t += 33;
        }
        (t, reps)
    }

    #[tokio::test]
    async fn test_full_beginner_squat_rep_end_to_end() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);

        let mut all_reps = Vec::new();
        let mut t = 0;
        for &level in &[170.0, 110.0, 70.0, 110.0, 170.0] {
            let (next_t, reps) = feed(&mut session, level, t, 8).await;
            t = next_t;
            all_reps.extend(reps);
        }

        assert_eq!(all_reps.len(), 1, "exactly one rep for one full cycle");
        let rep = &all_reps[0];
        assert!(rep.rep_completed);
        assert!(rep.should_reset);
        assert_ne!(rep.rep_quality, RepQuality::Poor);
        assert_eq!(session.rep_total(), 1);
    }

    #[tokio::test]
    async fn test_shallow_movement_counts_no_rep() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);

        let mut t = 0;
        for &level in &[170.0, 110.0, 170.0] {
            let (next_t, reps) = feed(&mut session, level, t, 8).await;
            t = next_t;
            assert!(reps.is_empty());
        }
        assert_eq!(session.rep_total(), 0);
    }

    #[tokio::test]
    async fn test_simulator_session_counts_reps() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);
        let mut sim = SquatSimulator::new();

        for i in 0..400u64 {
            let frame = sim.next_frame(i * 33);
            session.process_frame(&frame).await;
        }

        assert!(session.rep_total() >= 3, "got {}", session.rep_total());
        assert_eq!(session.snapshot().quality.poor, 0);
    }

    #[tokio::test]
    async fn test_frontal_view_gates_feedback() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);

        let frontal = squat_frame(110.0, 0, 0)
            .with_joint(Joint::Nose, Landmark::new(0.50, 0.20))
            .with_joint(Joint::LeftShoulder, Landmark::new(0.35, 0.30))
            .with_joint(Joint::RightShoulder, Landmark::new(0.65, 0.30));

        let outcome = session.process_frame(&frontal).await;
        assert_eq!(outcome.camera_view, CameraView::Frontal);
        assert_eq!(outcome.feedback.audio_messages.len(), 1);
        assert!(outcome.feedback.audio_messages[0].contains("camera"));
    }

    #[tokio::test]
    async fn test_missing_landmarks_degrade_gracefully() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);

        let outcome = session.process_frame(&PoseFrame::empty(0, 0)).await;
        assert!(outcome.angles.is_none());
        assert!(outcome.report.is_none());
        assert!(outcome.rep.is_none());
        assert_eq!(outcome.camera_view, CameraView::Unknown);
        assert_eq!(session.metrics().total_frames, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_offload_timeout_falls_back_to_sync() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);
        session.set_worker(AngleWorker::spawn_with(Duration::from_millis(10), |frame| {
            std::thread::sleep(Duration::from_millis(100));
            extract_angles(&frame)
        }));

        let outcome = session.process_frame(&squat_frame(120.0, 0, 0)).await;
        assert!(outcome.used_offload_fallback);
        assert!(outcome.angles.is_some(), "fallback still yields angles");
    }

    #[tokio::test]
    async fn test_mode_switch_rederives_feedback_via_subscription() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);
        assert_eq!(session.feedback_config().frequency_ms, 2000);

        let event = session.switch_mode(ExerciseMode::Pro);
        assert!(event.changes.any());
        assert_eq!(session.feedback_config().frequency_ms, 3000);
        assert_eq!(session.feedback_config().min_priority, PriorityLevel::Medium);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);
        session.switch_mode(ExerciseMode::Pro);
        session.process_frame(&squat_frame(170.0, 0, 0)).await;

        let value = serde_json::to_value(session.snapshot()).expect("snapshot serializes");
        assert_eq!(value["mode"], "pro");
        assert_eq!(value["total_reps"], 0);
        assert!(value["mode_changes"].as_array().is_some());
    }

    #[tokio::test]
    async fn test_inactivity_surfaces_through_session() {
        let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);
        let (t, _) = feed(&mut session, 170.0, 0, 4).await;

        assert!(!session.is_inactive(t));
        assert!(session.is_inactive(t + 31_000));
    }
}
