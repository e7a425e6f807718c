use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::scheduler::{Job, JobStatus};

/// Result of job execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub job_id: u64,
    pub status: JobStatus,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Runs a job's processing routine and turns whatever it does into an
/// [`ExecutionResult`].
///
/// A panic inside the routine is caught and reported as `Failed` so that it
/// cannot take down the worker that hosts it.
#[derive(Debug, Clone, Default)]
pub struct JobExecutor;

impl JobExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a job, letting it observe `cancel`
    pub async fn execute(&self, job: &Job, cancel: CancellationToken) -> ExecutionResult {
        tracing::debug!(job_id = job.id(), job_name = %job.name(), "Executing job");

        let started = Instant::now();
        let result = AssertUnwindSafe(job.process(cancel)).catch_unwind().await;

        Self::process_outcome(job.id(), started.elapsed(), result)
    }

    fn process_outcome(
        job_id: u64,
        elapsed: Duration,
        result: std::thread::Result<Result<(), JobError>>,
    ) -> ExecutionResult {
        let (status, error) = match result {
            Ok(Ok(())) => (JobStatus::Completed, None),
            Ok(Err(e @ JobError::Cancelled)) => (JobStatus::Cancelled, Some(e.to_string())),
            Ok(Err(e @ JobError::Failed(_))) => (JobStatus::Failed, Some(e.to_string())),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(job_id, panic = %message, "Job panicked");
                (JobStatus::Failed, Some(format!("job panicked: {}", message)))
            }
        };

        tracing::debug!(
            job_id,
            status = %status,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Job execution finished"
        );

        ExecutionResult {
            job_id,
            status,
            error,
            elapsed,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
