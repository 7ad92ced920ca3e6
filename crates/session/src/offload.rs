//! Angle-extraction offload worker
//!
//! Extraction is pure, so it may run on a worker task without changing
//! semantics. Requests carry a correlation id and a hard timeout; a timed-out
//! or crashed worker fails the request explicitly and the caller falls back
//! to synchronous in-process extraction instead of stalling the pipeline.

use kinematics::{extract_angles, ExerciseAngles};
use pose_frame::PoseFrame;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

/// Hard ceiling on one offloaded extraction
pub const DEFAULT_OFFLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Request queue depth
const CHANNEL_CAPACITY: usize = 32;

/// Offload failures; both are recoverable by synchronous fallback
#[derive(Debug, Error)]
pub enum OffloadError {
    #[error("angle request {0} timed out after {1:?}")]
    Timeout(Uuid, Duration),

    #[error("angle worker stopped; request {0} failed")]
    WorkerGone(Uuid),
}

struct WorkRequest {
    id: Uuid,
    frame: PoseFrame,
    reply: oneshot::Sender<Option<ExerciseAngles>>,
}

/// Handle to a spawned extraction worker
pub struct AngleWorker {
    tx: mpsc::Sender<WorkRequest>,
    timeout: Duration,
}

impl AngleWorker {
    /// Spawn a worker running the standard extractor
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn() -> Self {
        Self::spawn_with(DEFAULT_OFFLOAD_TIMEOUT, |frame| extract_angles(&frame))
    }

    /// Spawn a worker with a custom handler and timeout (tests use this to
    /// simulate slow or crashing workers)
    pub fn spawn_with(
        timeout: Duration,
        handler: impl Fn(PoseFrame) -> Option<ExerciseAngles> + Send + 'static,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<WorkRequest>(CHANNEL_CAPACITY);
        info!(?timeout, "spawning angle extraction worker");

        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let result = handler(req.frame);
                // Receiver may have timed out already; that is its problem
                let _ = req.reply.send(result);
            }
            debug!("angle worker channel closed");
        });

        Self { tx, timeout }
    }

    /// Submit one frame for extraction
    pub async fn extract(&self, frame: &PoseFrame) -> Result<Option<ExerciseAngles>, OffloadError> {
        let id = Uuid::new_v4();
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = WorkRequest {
            id,
            frame: frame.clone(),
            reply: reply_tx,
        };

        if self.tx.send(request).await.is_err() {
            return Err(OffloadError::WorkerGone(id));
        }

        match timeout(self.timeout, reply_rx).await {
            Ok(Ok(angles)) => Ok(angles),
            // Reply sender dropped: the worker died mid-request
            Ok(Err(_)) => Err(OffloadError::WorkerGone(id)),
            Err(_) => Err(OffloadError::Timeout(id, self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::squat_frame;

    #[tokio::test]
    async fn test_worker_matches_sync_extraction() {
        let worker = AngleWorker::spawn();
        let frame = squat_frame(120.0, 0, 0);

        let offloaded = worker.extract(&frame).await.unwrap().unwrap();
        let sync = extract_angles(&frame).unwrap();
        assert!((offloaded.knee_angle - sync.knee_angle).abs() < 1e-6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_worker_times_out() {
        let worker = AngleWorker::spawn_with(Duration::from_millis(20), |frame| {
            std::thread::sleep(Duration::from_millis(200));
            extract_angles(&frame)
        });

        let err = worker.extract(&squat_frame(120.0, 0, 0)).await.unwrap_err();
        assert!(matches!(err, OffloadError::Timeout(_, _)));
    }

    #[tokio::test]
    async fn test_crashed_worker_fails_requests_explicitly() {
        let worker = AngleWorker::spawn_with(Duration::from_secs(1), |_| {
            panic!("worker crashed");
        });

        // The in-flight request fails rather than hanging
        let err = worker.extract(&squat_frame(120.0, 0, 0)).await.unwrap_err();
        assert!(matches!(err, OffloadError::WorkerGone(_)));

        // Later requests fail too; nothing is left pending silently
        let err = worker.extract(&squat_frame(120.0, 0, 1)).await.unwrap_err();
        assert!(matches!(err, OffloadError::WorkerGone(_)));
    }
}
