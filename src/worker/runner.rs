use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::scheduler::buffer::JobBuffer;
use crate::scheduler::{Job, JobStatus};
use crate::worker::events::{EventSink, JobEvent};
use crate::worker::executor::JobExecutor;

/// A single execution unit of the pool.
///
/// Pulls jobs from the shared buffer until the buffer is closed and drained,
/// or until the queue-wide cancellation token fires. Cancellation is
/// cooperative: an in-flight job is expected to notice the same token and
/// return on its own.
pub struct Worker {
    id: u64,
    buffer: Arc<JobBuffer>,
    cancel: CancellationToken,
    executor: JobExecutor,
    events: EventSink,
}

impl Worker {
    pub(crate) fn new(
        id: u64,
        buffer: Arc<JobBuffer>,
        cancel: CancellationToken,
        events: EventSink,
    ) -> Self {
        Self {
            id,
            buffer,
            cancel,
            executor: JobExecutor::new(),
            events,
        }
    }

    /// Run until the buffer is exhausted or the queue is cancelled.
    pub async fn run(self) {
        tracing::info!(worker_id = self.id, "Worker started");

        loop {
            // Cancellation is checked first so a cancelled worker never takes
            // another job, even if one is already waiting.
            let job = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    tracing::info!(worker_id = self.id, "Worker stopping due to cancellation");
                    return;
                }
                job = self.buffer.pop() => match job {
                    Some(job) => job,
                    None => {
                        tracing::info!(worker_id = self.id, "Job buffer closed, worker stopping");
                        return;
                    }
                },
            };

            self.process(job).await;
        }
    }

    async fn process(&self, job: Job) {
        tracing::debug!(worker_id = self.id, job_id = job.id(), "Worker received job");
        self.events.emit(JobEvent::started(self.id, &job));

        let result = self.executor.execute(&job, self.cancel.clone()).await;

        match result.status {
            JobStatus::Completed => {
                tracing::info!(
                    worker_id = self.id,
                    job_id = result.job_id,
                    "Worker finished job"
                );
            }
            JobStatus::Cancelled | JobStatus::Failed => {
                tracing::warn!(
                    worker_id = self.id,
                    job_id = result.job_id,
                    status = %result.status,
                    error = ?result.error,
                    "Job cancelled or failed"
                );
            }
        }

        self.events.emit(JobEvent::finished(self.id, &job, &result));
    }
}
