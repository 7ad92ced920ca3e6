//! Synthetic workout demo
//!
//! Replays a generated squat session through the full pipeline at ~30fps,
//! switching to pro mode halfway, and prints the telemetry snapshot at the
//! end. Set `THRESHOLD_OVERRIDES` to a config file path to layer custom
//! thresholds over the built-in tables.

use anyhow::Result;
use exercise_config::{ExerciseMode, ExerciseType};
use session::synthetic::SquatSimulator;
use session::WorkoutSession;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Frames to replay (~30 seconds at 30fps)
const TOTAL_FRAMES: u64 = 900;

/// Frame cadence in milliseconds
const FRAME_INTERVAL_MS: u64 = 33;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut session = WorkoutSession::new(ExerciseMode::Beginner, ExerciseType::Squat);
    if let Ok(path) = std::env::var("THRESHOLD_OVERRIDES") {
        session.apply_override_file(Path::new(&path))?;
        info!(path = %path, "applied threshold overrides");
    }
    session.enable_offload();

    let mut sim = SquatSimulator::new();
    for i in 0..TOTAL_FRAMES {
        if i == TOTAL_FRAMES / 2 {
            info!("switching to pro mode mid-session");
            session.switch_mode(ExerciseMode::Pro);
        }

        let frame = sim.next_frame(i * FRAME_INTERVAL_MS);
        let outcome = session.process_frame(&frame).await;

        if let Some(rep) = &outcome.rep {
            info!(
                rep = session.rep_total(),
                quality = rep.rep_quality.as_str(),
                feedback = %rep.feedback,
                "rep completed"
            );
        }
        if outcome.feedback.should_speak {
            info!(audio = %outcome.feedback.audio_messages.join(" | "), "speak");
        }

        // Pace the replay like a live camera feed
        tokio::time::sleep(Duration::from_millis(FRAME_INTERVAL_MS)).await;
    }

    let verdict = session.is_performance_acceptable();
    if !verdict.acceptable {
        for rec in session.performance_recommendations() {
            info!(recommendation = %rec, "performance advice");
        }
    }

    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    Ok(())
}
