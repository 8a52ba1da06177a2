use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::applications::domain::ApplicationId;
use crate::applications::repository::ApplicationRepository;

use super::orchestrator::VerificationOrchestrator;
use super::pipeline::VerificationPipeline;

/// Unit of work enqueued at submission time, exactly once per application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub application_id: ApplicationId,
    pub owner_contact: String,
}

/// Raised when a run cannot be enqueued.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("verification queue is closed")]
    QueueClosed,
}

/// Hands a verification run to the background workers without blocking the
/// submitting caller. Tests inject a recording implementation.
pub trait VerificationScheduler: Send + Sync {
    fn schedule(&self, request: VerificationRequest) -> Result<(), ScheduleError>;
}

/// Scheduler backed by the worker pool's queue.
#[derive(Clone)]
pub struct QueuedScheduler {
    sender: mpsc::UnboundedSender<VerificationRequest>,
}

impl VerificationScheduler for QueuedScheduler {
    fn schedule(&self, request: VerificationRequest) -> Result<(), ScheduleError> {
        self.sender
            .send(request)
            .map_err(|_| ScheduleError::QueueClosed)
    }
}

/// Pool of detached worker tasks draining the verification queue.
///
/// Each application is enqueued exactly once, so no two runs for the same id
/// ever execute concurrently, while runs for distinct ids proceed in parallel
/// up to the pool size.
pub struct VerificationWorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl VerificationWorkerPool {
    /// Starts `workers` tasks (at least one) sharing a single queue and
    /// returns the scheduler feeding them.
    pub fn spawn<R, P>(
        workers: usize,
        orchestrator: Arc<VerificationOrchestrator<R, P>>,
    ) -> (QueuedScheduler, Self)
    where
        R: ApplicationRepository + 'static,
        P: VerificationPipeline + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel::<VerificationRequest>();
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    loop {
                        let request = { receiver.lock().await.recv().await };
                        match request {
                            Some(request) => orchestrator.run(request).await,
                            None => break,
                        }
                    }
                    debug!(worker, "verification worker stopped");
                })
            })
            .collect();

        (QueuedScheduler { sender }, Self { handles })
    }

    /// Waits for every worker to drain and stop. Only meaningful once all
    /// scheduler clones have been dropped.
    pub async fn join(self) {
        for handle in self.handles {
            // A worker task has no panicking paths of its own; a join error
            // here means the runtime aborted it during shutdown.
            if handle.await.is_err() {
                debug!("verification worker aborted before joining");
            }
        }
    }
}
