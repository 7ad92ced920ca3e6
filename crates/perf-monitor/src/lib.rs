//! Performance Monitor
//!
//! Brackets each frame cycle, keeps bounded sliding windows of timing and
//! confidence samples, and turns them into acceptability verdicts and
//! degradation recommendations. Purely advisory: nothing is auto-applied.

mod monitor;

pub use monitor::{MonitorConfig, PerformanceMetrics, PerformanceMonitor, PerformanceVerdict};
