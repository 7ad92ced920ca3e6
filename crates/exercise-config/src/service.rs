//! Configuration service with synchronous change fan-out

use crate::mode::{ExerciseMode, ExerciseType, PriorityLevel};
use crate::overrides::ThresholdOverrides;
use crate::thresholds::{validate, ModeThresholds};
use crate::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum retained mode-change events
const HISTORY_CAPACITY: usize = 50;

/// Feedback-engine settings derived from the active mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Minimum spacing between throttled audio deliveries (ms)
    pub frequency_ms: u64,
    /// Lowest priority eligible for audio delivery
    pub min_priority: PriorityLevel,
    /// How eagerly feedback is surfaced, in [0, 1]
    pub sensitivity: f32,
}

impl FeedbackConfig {
    /// Derive from a mode and its threshold table
    ///
    /// Pro trades frequency for signal: fewer, higher-priority messages.
    pub fn for_mode(mode: ExerciseMode, thresholds: &ModeThresholds) -> Self {
        match mode {
            ExerciseMode::Beginner => Self {
                frequency_ms: 2000,
                min_priority: PriorityLevel::Low,
                sensitivity: thresholds.feedback_sensitivity,
            },
            ExerciseMode::Pro => Self {
                frequency_ms: 3000,
                min_priority: PriorityLevel::Medium,
                sensitivity: thresholds.feedback_sensitivity,
            },
        }
    }
}

/// State-machine timing settings derived from the active mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Minimum dwell time in a phase before a transition is accepted (ms)
    pub min_phase_duration_ms: u64,
    /// Seconds without a transition before the session counts as inactive
    pub inactivity_timeout_secs: f32,
}

impl AnalysisConfig {
    /// Derive from a mode and its threshold table; pro responds faster
    pub fn for_mode(mode: ExerciseMode, thresholds: &ModeThresholds) -> Self {
        let min_phase_duration_ms = match mode {
            ExerciseMode::Beginner => 200,
            ExerciseMode::Pro => 150,
        };
        Self {
            min_phase_duration_ms,
            inactivity_timeout_secs: thresholds.inactivity_timeout_secs,
        }
    }
}

/// The whole active configuration, replaced atomically on every change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveConfig {
    pub mode: ExerciseMode,
    pub exercise_type: ExerciseType,
    pub thresholds: ModeThresholds,
    pub feedback: FeedbackConfig,
    pub analysis: AnalysisConfig,
}

impl ActiveConfig {
    fn build(mode: ExerciseMode, exercise_type: ExerciseType, thresholds: ModeThresholds) -> Self {
        let feedback = FeedbackConfig::for_mode(mode, &thresholds);
        let analysis = AnalysisConfig::for_mode(mode, &thresholds);
        Self {
            mode,
            exercise_type,
            thresholds,
            feedback,
            analysis,
        }
    }
}

/// Which parts of the configuration a change event touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChanges {
    pub thresholds: bool,
    pub feedback: bool,
    pub analysis: bool,
}

impl ConfigChanges {
    fn all() -> Self {
        Self {
            thresholds: true,
            feedback: true,
            analysis: true,
        }
    }

    pub fn any(&self) -> bool {
        self.thresholds || self.feedback || self.analysis
    }
}

/// A recorded configuration change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeChangeEvent {
    pub previous_mode: ExerciseMode,
    pub new_mode: ExerciseMode,
    pub exercise_type: ExerciseType,
    pub changes: ConfigChanges,
    /// Feedback settings now in effect, so subscribers re-derive without
    /// reading the service back
    pub feedback: FeedbackConfig,
    pub timestamp: DateTime<Utc>,
}

/// Handle for removing a registered listener
pub type ListenerId = u64;

type Listener = Box<dyn Fn(&ModeChangeEvent) + Send>;

/// Configuration service
///
/// Owns the active config and per-mode threshold overrides. Every change
/// replaces the whole [`ActiveConfig`] (readers holding an `Arc` never see a
/// partially updated table) and synchronously notifies every listener before
/// the triggering call returns.
pub struct ConfigService {
    active: Arc<ActiveConfig>,
    overrides: HashMap<(ExerciseMode, ExerciseType), ModeThresholds>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
    history: VecDeque<ModeChangeEvent>,
}

impl ConfigService {
    /// Create a service with built-in tables for the given selection
    pub fn new(mode: ExerciseMode, exercise_type: ExerciseType) -> Self {
        info!(mode = mode.as_str(), exercise = exercise_type.as_str(), "creating config service");
        let thresholds = ModeThresholds::builtin(mode, exercise_type);
        Self {
            active: Arc::new(ActiveConfig::build(mode, exercise_type, thresholds)),
            overrides: HashMap::new(),
            listeners: Vec::new(),
            next_listener_id: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Snapshot of the active configuration
    pub fn active(&self) -> Arc<ActiveConfig> {
        Arc::clone(&self.active)
    }

    pub fn mode(&self) -> ExerciseMode {
        self.active.mode
    }

    pub fn exercise_type(&self) -> ExerciseType {
        self.active.exercise_type
    }

    /// Switch skill mode
    ///
    /// Switching to the current mode is a no-op event (all change flags
    /// false); listeners are still notified so subscribers observe every
    /// call. Otherwise the whole configuration is swapped and listeners run
    /// before this returns.
    pub fn switch_mode(&mut self, new_mode: ExerciseMode) -> ModeChangeEvent {
        let previous_mode = self.active.mode;
        let changes = if new_mode == previous_mode {
            debug!(mode = new_mode.as_str(), "redundant mode switch");
            ConfigChanges::default()
        } else {
            info!(from = previous_mode.as_str(), to = new_mode.as_str(), "switching mode");
            self.swap_active(new_mode, self.active.exercise_type);
            ConfigChanges::all()
        };

        let event = ModeChangeEvent {
            previous_mode,
            new_mode,
            exercise_type: self.active.exercise_type,
            changes,
            feedback: self.active.feedback,
            timestamp: Utc::now(),
        };
        self.record_and_notify(event.clone());
        event
    }

    /// Switch exercise type, preserving the mode
    pub fn switch_exercise_type(&mut self, new_type: ExerciseType) -> ModeChangeEvent {
        let mode = self.active.mode;
        let changes = if new_type == self.active.exercise_type {
            debug!(exercise = new_type.as_str(), "redundant exercise switch");
            ConfigChanges::default()
        } else {
            info!(exercise = new_type.as_str(), "switching exercise type");
            self.swap_active(mode, new_type);
            ConfigChanges::all()
        };

        let event = ModeChangeEvent {
            previous_mode: mode,
            new_mode: mode,
            exercise_type: new_type,
            changes,
            feedback: self.active.feedback,
            timestamp: Utc::now(),
        };
        self.record_and_notify(event.clone());
        event
    }

    /// Merge partial threshold overrides into a mode's table
    ///
    /// The merged table is validated before acceptance; on rejection the
    /// previously active configuration stays in effect and every violated
    /// invariant is listed. When the target mode is active, derived
    /// feedback/analysis settings cascade immediately and a change event
    /// fires.
    pub fn update_thresholds(
        &mut self,
        mode: ExerciseMode,
        partial: &ThresholdOverrides,
    ) -> Result<(), ConfigError> {
        let exercise_type = self.active.exercise_type;
        let base = self.table_for(mode, exercise_type);
        let merged = partial.apply_to(&base);

        let report = validate(&merged);
        if !report.valid {
            warn!(mode = mode.as_str(), errors = report.errors.len(), "rejecting threshold update");
            return Err(ConfigError::InvalidThresholds(report.errors));
        }

        self.overrides.insert((mode, exercise_type), merged);

        if mode == self.active.mode {
            self.swap_active(mode, exercise_type);
            let event = ModeChangeEvent {
                previous_mode: mode,
                new_mode: mode,
                exercise_type,
                changes: ConfigChanges::all(),
                feedback: self.active.feedback,
                timestamp: Utc::now(),
            };
            self.record_and_notify(event);
        }
        Ok(())
    }

    /// Register a mode-change listener; returns a handle for removal
    pub fn add_mode_change_listener(
        &mut self,
        listener: impl Fn(&ModeChangeEvent) + Send + 'static,
    ) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_mode_change_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Bounded change-event log, oldest first
    pub fn mode_change_history(&self) -> Vec<ModeChangeEvent> {
        self.history.iter().cloned().collect()
    }

    fn table_for(&self, mode: ExerciseMode, exercise_type: ExerciseType) -> ModeThresholds {
        self.overrides
            .get(&(mode, exercise_type))
            .cloned()
            .unwrap_or_else(|| ModeThresholds::builtin(mode, exercise_type))
    }

    fn swap_active(&mut self, mode: ExerciseMode, exercise_type: ExerciseType) {
        let thresholds = self.table_for(mode, exercise_type);
        self.active = Arc::new(ActiveConfig::build(mode, exercise_type, thresholds));
    }

    fn record_and_notify(&mut self, event: ModeChangeEvent) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());

        // A panicking listener must not block delivery to the others.
        for (id, listener) in &self.listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(listener = id, "mode-change listener panicked; skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> ConfigService {
        ConfigService::new(ExerciseMode::Beginner, ExerciseType::Squat)
    }

    #[test]
    fn test_redundant_switch_is_noop_event() {
        let mut svc = service();
        let event = svc.switch_mode(ExerciseMode::Beginner);
        assert!(!event.changes.any());
        assert_eq!(svc.mode(), ExerciseMode::Beginner);
    }

    #[test]
    fn test_listeners_fire_even_on_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut svc = service();
        svc.add_mode_change_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        svc.switch_mode(ExerciseMode::Beginner);
        svc.switch_mode(ExerciseMode::Pro);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_switch_replaces_derived_configs() {
        let mut svc = service();
        assert_eq!(svc.active().feedback.frequency_ms, 2000);
        assert_eq!(svc.active().feedback.min_priority, PriorityLevel::Low);
        assert_eq!(svc.active().analysis.min_phase_duration_ms, 200);

        svc.switch_mode(ExerciseMode::Pro);
        assert_eq!(svc.active().feedback.frequency_ms, 3000);
        assert_eq!(svc.active().feedback.min_priority, PriorityLevel::Medium);
        assert_eq!(svc.active().analysis.min_phase_duration_ms, 150);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut svc = service();
        svc.add_mode_change_listener(|_| panic!("broken subscriber"));
        svc.add_mode_change_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        svc.switch_mode(ExerciseMode::Pro);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_listener_stops_firing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut svc = service();
        let id = svc.add_mode_change_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(svc.remove_mode_change_listener(id));
        assert!(!svc.remove_mode_change_listener(id));

        svc.switch_mode(ExerciseMode::Pro);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_update_leaves_active_config_untouched() {
        let mut svc = service();
        let before = svc.active();

        let bad = ThresholdOverrides {
            knee: Some(crate::AngleThresholds {
                s1_threshold: 80.0,
                s2_range: (90.0, 150.0),
                s3_threshold: 160.0,
                warning_tolerance: 15.0,
            }),
            ..Default::default()
        };
        let err = svc.update_thresholds(ExerciseMode::Beginner, &bad).unwrap_err();
        match err {
            ConfigError::InvalidThresholds(errors) => {
                assert!(errors.iter().any(|e| e.contains("must exceed s3_threshold")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*svc.active(), *before);
    }

    #[test]
    fn test_valid_update_cascades_into_derived_fields() {
        let mut svc = service();
        let update = ThresholdOverrides {
            feedback_sensitivity: Some(0.95),
            inactivity_timeout_secs: Some(12.0),
            ..Default::default()
        };
        svc.update_thresholds(ExerciseMode::Beginner, &update).unwrap();

        let active = svc.active();
        assert!((active.feedback.sensitivity - 0.95).abs() < 1e-6);
        assert!((active.analysis.inactivity_timeout_secs - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut svc = service();
        for i in 0..60 {
            let mode = if i % 2 == 0 {
                ExerciseMode::Pro
            } else {
                ExerciseMode::Beginner
            };
            svc.switch_mode(mode);
        }
        assert_eq!(svc.mode_change_history().len(), HISTORY_CAPACITY);
    }
}
