use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{handlers::TaskMux, queue::TaskQueue, types::TaskEnvelope};
use crate::config::WorkerConfig;

/// How a single job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Requeued,
    Discarded,
}

/// Long-lived consumer of one named queue.
///
/// Pulls jobs while fewer than `concurrency` are in flight and hands each to the
/// [`TaskMux`]. Retryable failures go back on the queue until `max_retry`
/// retries have been spent; everything else is logged and dropped.
#[derive(Clone)]
pub struct TaskWorker {
    queue: Arc<dyn TaskQueue + Send + Sync>,
    mux: Arc<TaskMux>,
    config: WorkerConfig,
}

impl TaskWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue + Send + Sync>,
        mux: Arc<TaskMux>,
        config: WorkerConfig,
    ) -> Self {
        Self { queue, mux, config }
    }

    /// Runs until `shutdown` flips to true (or its sender is dropped), then waits for in-flight jobs
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            queue = self.queue.name(),
            concurrency = self.config.concurrency,
            max_retry = self.config.max_retry,
            "Starting task worker"
        );

        let slots = Arc::new(Semaphore::new(self.config.concurrency));
        let mut in_flight = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = slots.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            match self.queue.dequeue().await {
                Ok(Some(envelope)) => {
                    let worker = self.clone();
                    in_flight.spawn(async move {
                        let _permit = permit;
                        worker.process(envelope).await
                    });
                }
                Ok(None) => {
                    drop(permit);
                    if !self.idle(&mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    drop(permit);
                    error!(error = %e, queue = self.queue.name(), "Failed to dequeue task");
                    if !self.idle(&mut shutdown).await {
                        break;
                    }
                }
            }

            while let Some(finished) = in_flight.try_join_next() {
                if let Err(e) = finished {
                    error!(error = %e, "Task panicked");
                }
            }
        }

        info!(in_flight = in_flight.len(), "Task worker draining");
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "Task panicked");
            }
        }
        info!(queue = self.queue.name(), "Task worker stopped");
    }

    /// Runs one job through the mux and settles it
    pub async fn process(&self, envelope: TaskEnvelope) -> JobOutcome {
        let job_id = envelope.id;
        let kind = envelope.kind.clone();
        let attempt = envelope.attempt;

        match self.mux.dispatch(&envelope).await {
            Ok(()) => {
                debug!(%job_id, %kind, attempt, "Task completed");
                JobOutcome::Completed
            }
            Err(e) if e.is_retryable() && attempt < self.config.max_retry => {
                warn!(%job_id, %kind, attempt, error = %e, "Task failed, will retry");
                match self.queue.requeue(envelope).await {
                    Ok(()) => JobOutcome::Requeued,
                    Err(requeue_error) => {
                        error!(%job_id, error = %requeue_error, "Failed to requeue task");
                        JobOutcome::Discarded
                    }
                }
            }
            Err(e) => {
                error!(%job_id, %kind, attempt, error = %e, "Task failed permanently");
                JobOutcome::Discarded
            }
        }
    }

    /// Sleeps one poll interval; false when shutdown was requested meanwhile
    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = sleep(self.config.poll_interval) => true,
            changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
        }
    }
}
