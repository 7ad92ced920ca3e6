//! Exercise State Machine
//!
//! Converts the smoothed primary joint angle into discrete exercise phases,
//! debounced against sensor noise, and keeps the bounded phase histories the
//! repetition counter matches against.

mod machine;
mod phase;

pub use machine::{StateMachine, REP_PATTERN};
pub use phase::{ExercisePhase, PhaseTransition};
