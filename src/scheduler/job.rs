use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Length of the single simulated work step of a default job.
pub const DEFAULT_WORK_DURATION: Duration = Duration::from_millis(500);

/// How a job's processing routine ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The view of a job handed to its processing routine.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub id: u64,
    pub name: String,
    pub payload: String,
    pub cancel: CancellationToken,
}

impl JobContext {
    /// Sleep for `duration` unless the queue is cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), JobError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(JobError::Cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

type Routine = Arc<dyn Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// An immutable unit of work: identity, payload and the routine that processes it.
///
/// Cloning is cheap; the routine is shared.
#[derive(Clone)]
pub struct Job {
    id: u64,
    name: String,
    payload: String,
    created_at: DateTime<Utc>,
    routine: Routine,
}

impl Job {
    /// A job whose routine simulates [`DEFAULT_WORK_DURATION`] of work.
    pub fn new(id: u64, name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::simulated(id, name, payload, DEFAULT_WORK_DURATION)
    }

    /// A job whose routine performs one simulated work step of `work`,
    /// racing it against cancellation.
    pub fn simulated(
        id: u64,
        name: impl Into<String>,
        payload: impl Into<String>,
        work: Duration,
    ) -> Self {
        Self::with_routine(id, name, payload, move |ctx| simulate_work(ctx, work))
    }

    /// A job with a caller-supplied processing routine.
    ///
    /// The routine should observe `ctx.cancel` during any wait so that a
    /// shutdown can interrupt it.
    pub fn with_routine<F, Fut>(
        id: u64,
        name: impl Into<String>,
        payload: impl Into<String>,
        routine: F,
    ) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        let routine: Routine = Arc::new(move |ctx| routine(ctx).boxed());
        Self {
            id,
            name: name.into(),
            payload: payload.into(),
            created_at: Utc::now(),
            routine,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Run the processing routine against the given cancellation signal.
    pub async fn process(&self, cancel: CancellationToken) -> Result<(), JobError> {
        let ctx = JobContext {
            id: self.id,
            name: self.name.clone(),
            payload: self.payload.clone(),
            cancel,
        };
        (self.routine)(ctx).await
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("payload", &self.payload)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

async fn simulate_work(ctx: JobContext, work: Duration) -> Result<(), JobError> {
    tracing::info!(job_id = ctx.id, job_name = %ctx.name, "Processing job");

    match ctx.sleep(work).await {
        Ok(()) => {
            tracing::info!(job_id = ctx.id, payload = %ctx.payload, "Job completed");
            Ok(())
        }
        Err(e) => {
            tracing::info!(
                job_id = ctx.id,
                job_name = %ctx.name,
                "Job cancelled during processing"
            );
            Err(e)
        }
    }
}
