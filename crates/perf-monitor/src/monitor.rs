//! Frame-cycle monitoring implementation

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inter-frame gap beyond this multiple of the expected interval counts the
/// frame as dropped
const DROP_GAP_FACTOR: f64 = 1.5;

/// Fraction of dropped frames above which the verdict fails
const MAX_DROP_RATE: f64 = 0.10;

/// Mean landmark confidence below this earns a lighting recommendation
const LOW_CONFIDENCE: f64 = 0.5;

/// Monitor configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Target processing frame rate (fps)
    pub target_fps: f64,
    /// Maximum acceptable mean processing latency (ms)
    pub max_latency_ms: f64,
    /// Memory budget for the whole pipeline (MB)
    pub memory_threshold_mb: f64,
    /// Sliding-window capacity for every sample series
    pub sample_window: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            max_latency_ms: 50.0,
            memory_threshold_mb: 500.0,
            sample_window: 30,
        }
    }
}

/// Snapshot of derived metrics, recomputed on demand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub frame_rate: f64,
    pub processing_latency_ms: f64,
    pub memory_usage_mb: f64,
    /// Mean landmark confidence in [0, 1]
    pub landmark_confidence: f64,
    /// Blend of confidence and frame-rate ratio, capped at 100
    pub analysis_accuracy: f64,
    pub dropped_frames: u64,
    pub total_frames: u64,
}

/// Acceptability verdict; every failing condition is flagged, not just the
/// first
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PerformanceVerdict {
    pub acceptable: bool,
    pub low_frame_rate: bool,
    pub high_latency: bool,
    pub high_memory: bool,
    pub high_drop_rate: bool,
}

/// Per-session performance monitor
///
/// Owned exclusively by one session; safe to query at any cadence with no
/// side effects on the pipeline.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    frame_starts: VecDeque<Instant>,
    latencies_ms: VecDeque<f64>,
    confidences: VecDeque<f64>,
    total_frames: u64,
    dropped_frames: u64,
    memory_mb: Option<f64>,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        info!(target_fps = config.target_fps, window = config.sample_window, "creating performance monitor");
        Self {
            config,
            frame_starts: VecDeque::with_capacity(config.sample_window),
            latencies_ms: VecDeque::with_capacity(config.sample_window),
            confidences: VecDeque::with_capacity(config.sample_window),
            total_frames: 0,
            dropped_frames: 0,
            memory_mb: None,
        }
    }

    /// Mark the start of a frame cycle; returns the start timestamp to pass
    /// back to [`end_frame`](Self::end_frame)
    pub fn start_frame(&mut self) -> Instant {
        self.start_frame_at(Instant::now())
    }

    /// Timestamped variant used by replays and tests
    pub fn start_frame_at(&mut self, now: Instant) -> Instant {
        if let Some(&prev) = self.frame_starts.back() {
            let gap_ms = now.duration_since(prev).as_secs_f64() * 1000.0;
            let expected_ms = 1000.0 / self.config.target_fps;
            if gap_ms > expected_ms * DROP_GAP_FACTOR {
                self.dropped_frames += 1;
                debug!(gap_ms, expected_ms, "dropped frame detected");
            }
        }

        if self.frame_starts.len() >= self.config.sample_window {
            self.frame_starts.pop_front();
        }
        self.frame_starts.push_back(now);
        self.total_frames += 1;
        now
    }

    /// Mark the end of a frame cycle, recording latency and, if available, a
    /// landmark-confidence sample
    pub fn end_frame(&mut self, start: Instant, confidence: Option<f64>) {
        self.end_frame_at(start, Instant::now(), confidence);
    }

    /// Timestamped variant used by replays and tests
    pub fn end_frame_at(&mut self, start: Instant, now: Instant, confidence: Option<f64>) {
        let latency_ms = now.duration_since(start).as_secs_f64() * 1000.0;
        if self.latencies_ms.len() >= self.config.sample_window {
            self.latencies_ms.pop_front();
        }
        self.latencies_ms.push_back(latency_ms);

        if let Some(c) = confidence {
            if self.confidences.len() >= self.config.sample_window {
                self.confidences.pop_front();
            }
            self.confidences.push_back(c);
        }
    }

    /// Record an externally measured memory sample; the pipeline itself does
    /// no process introspection
    pub fn record_memory_sample(&mut self, mb: f64) {
        self.memory_mb = Some(mb);
    }

    /// Frame rate over the timestamp window
    pub fn frame_rate(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_starts.front(), self.frame_starts.back())
        else {
            return 0.0;
        };
        if self.frame_starts.len() < 2 {
            return 0.0;
        }
        let span_ms = last.duration_since(*first).as_secs_f64() * 1000.0;
        if span_ms <= 0.0 {
            return 0.0;
        }
        (self.frame_starts.len() - 1) as f64 / span_ms * 1000.0
    }

    fn mean_latency_ms(&self) -> f64 {
        mean(&self.latencies_ms)
    }

    fn mean_confidence(&self) -> f64 {
        mean(&self.confidences)
    }

    /// Current metrics snapshot
    pub fn metrics(&self) -> PerformanceMetrics {
        let frame_rate = self.frame_rate();
        let confidence = self.mean_confidence();
        let rate_ratio = if self.config.target_fps > 0.0 {
            (frame_rate / self.config.target_fps).min(1.0)
        } else {
            0.0
        };
        let accuracy = ((confidence * 0.7 + rate_ratio * 0.3) * 100.0).min(100.0);

        PerformanceMetrics {
            frame_rate,
            processing_latency_ms: self.mean_latency_ms(),
            memory_usage_mb: self.memory_mb.unwrap_or(0.0),
            landmark_confidence: confidence,
            analysis_accuracy: accuracy,
            dropped_frames: self.dropped_frames,
            total_frames: self.total_frames,
        }
    }

    /// Check every acceptability condition independently
    pub fn is_performance_acceptable(&self) -> PerformanceVerdict {
        let low_frame_rate =
            self.frame_starts.len() >= 2 && self.frame_rate() < self.config.target_fps / 2.0;
        let high_latency =
            !self.latencies_ms.is_empty() && self.mean_latency_ms() > self.config.max_latency_ms;
        let high_memory = self
            .memory_mb
            .map(|mb| mb > self.config.memory_threshold_mb)
            .unwrap_or(false);
        let high_drop_rate = self.total_frames > 0
            && self.dropped_frames as f64 / self.total_frames as f64 > MAX_DROP_RATE;

        let acceptable = !(low_frame_rate || high_latency || high_memory || high_drop_rate);
        if !acceptable {
            warn!(
                low_frame_rate,
                high_latency, high_memory, high_drop_rate, "performance below target"
            );
        }

        PerformanceVerdict {
            acceptable,
            low_frame_rate,
            high_latency,
            high_memory,
            high_drop_rate,
        }
    }

    /// Human-readable mitigation per failing condition; advisory only
    pub fn recommendations(&self) -> Vec<String> {
        let verdict = self.is_performance_acceptable();
        let mut out = Vec::new();

        if verdict.low_frame_rate {
            out.push("Reduce the camera resolution to raise the frame rate".to_string());
        }
        if verdict.high_latency {
            out.push("Offload angle extraction to a background worker".to_string());
        }
        if verdict.high_drop_rate {
            out.push("Skip incoming frames until the pipeline catches up".to_string());
        }
        if verdict.high_memory {
            out.push("Shrink the metrics sample window".to_string());
        }
        if !self.confidences.is_empty() && self.mean_confidence() < LOW_CONFIDENCE {
            out.push("Improve lighting so landmarks are detected more reliably".to_string());
        }
        out
    }

    /// Zero every counter and window, including dropped frames
    pub fn reset(&mut self) {
        self.frame_starts.clear();
        self.latencies_ms.clear();
        self.confidences.clear();
        self.total_frames = 0;
        self.dropped_frames = 0;
        self.memory_mb = None;
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

fn mean(values: &VecDeque<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
