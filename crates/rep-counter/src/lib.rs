//! Repetition Counter
//!
//! Watches the state machine's phase sequence for completed repetitions and
//! grades each one from the violations, depth, and smoothness observed over
//! the rep window.

mod counter;

pub use counter::{QualityTally, RepCountResult, RepCounter, RepCounterConfig, RepQuality};
