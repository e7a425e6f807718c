use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::scheduler::buffer::{Closed, JobBuffer};
use crate::scheduler::job::Job;
use crate::scheduler::stats::{Counters, QueueStats};
use crate::worker::events::{EventSink, JobEvent};
use crate::worker::Worker;

/// Lifecycle of a [`JobQueue`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueueState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueState::NotStarted => write!(f, "not_started"),
            QueueState::Running => write!(f, "running"),
            QueueState::ShuttingDown => write!(f, "shutting_down"),
            QueueState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Returned by a graceful shutdown that finished inside its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    pub elapsed: Duration,
}

/// A bounded, multi-worker job queue.
///
/// Owns the shared buffer, the worker tasks and the cancellation token they
/// all observe. Every piece of state is per instance, so independent queues
/// can coexist in one process.
pub struct JobQueue {
    config: QueueConfig,
    state: RwLock<QueueState>,
    buffer: Arc<JobBuffer>,
    cancel: CancellationToken,
    workers: TaskTracker,
    events: EventSink,
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("config", &self.config)
            .field("pending", &self.buffer.len())
            .field("live_workers", &self.workers.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Result<Self> {
        config.validate()?;

        let counters = Arc::new(Counters::default());
        Ok(Self {
            buffer: Arc::new(JobBuffer::new(config.buffer_capacity)),
            events: EventSink::new(config.event_capacity, counters),
            state: RwLock::new(QueueState::NotStarted),
            cancel: CancellationToken::new(),
            workers: TaskTracker::new(),
            config,
        })
    }

    pub fn with_workers(worker_count: usize, buffer_capacity: usize) -> Result<Self> {
        Self::new(QueueConfig::new(worker_count, buffer_capacity))
    }

    /// Spawn the worker pool. May only be called once per queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != QueueState::NotStarted {
            return Err(QueueError::AlreadyStarted);
        }

        tracing::info!(
            workers = self.config.worker_count,
            buffer_capacity = self.config.buffer_capacity,
            "Starting job queue"
        );

        for id in 1..=self.config.worker_count as u64 {
            let worker = Worker::new(
                id,
                self.buffer.clone(),
                self.cancel.clone(),
                self.events.clone(),
            );
            self.workers.spawn(worker.run());
        }
        // The pool is fixed from here on
        self.workers.close();

        *state = QueueState::Running;
        Ok(())
    }

    /// Enqueue a job, waiting while the buffer is full.
    ///
    /// Fails with [`QueueError::QueueClosed`] if the queue is not running, or
    /// if shutdown begins before the job could be placed.
    pub async fn submit(&self, job: Job) -> Result<()> {
        let job_id = job.id();

        {
            let state = *self.state.read().await;
            if state != QueueState::Running {
                self.events.counters().record_rejected();
                tracing::debug!(job_id, state = %state, "Rejecting job, queue is not running");
                return Err(QueueError::QueueClosed(job_id));
            }
        }

        // The buffer re-checks its closed flag atomically with insertion, so a
        // shutdown that starts after the check above still wins.
        match self.buffer.push(job).await {
            Ok(()) => {
                self.events.counters().record_submitted();
                tracing::debug!(job_id, "Job added to queue");
                Ok(())
            }
            Err(Closed(job)) => {
                self.events.counters().record_rejected();
                tracing::warn!(
                    job_id = job.id(),
                    job_name = %job.name(),
                    "Queue closed while submitting job"
                );
                Err(QueueError::QueueClosed(job_id))
            }
        }
    }

    /// Graceful shutdown.
    ///
    /// Stops intake and lets workers drain the buffer for up to `timeout`. If
    /// they do not finish in time the cancellation token is fired and this
    /// waits, without a further bound, for every worker to exit before
    /// returning [`QueueError::ShutdownTimedOut`].
    pub async fn shutdown(&self, timeout: Duration) -> Result<Drained> {
        {
            let mut state = self.state.write().await;
            if *state != QueueState::Running {
                return Err(QueueError::NotRunning);
            }
            *state = QueueState::ShuttingDown;
        }

        tracing::info!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            pending = self.buffer.len(),
            "Initiating graceful shutdown"
        );
        self.buffer.close();

        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, self.workers.wait()).await {
            Ok(()) => {
                tracing::info!("All workers finished gracefully");
                Ok(Drained {
                    elapsed: started.elapsed(),
                })
            }
            Err(_) => {
                tracing::warn!(
                    live_workers = self.workers.len(),
                    "Shutdown timeout reached, forcing cancellation"
                );
                self.cancel.cancel();
                self.workers.wait().await;
                Err(QueueError::ShutdownTimedOut(timeout))
            }
        };

        self.mark_stopped().await;
        result
    }

    /// Immediate shutdown: cancel every worker and in-flight job, then wait
    /// for the pool to exit. Jobs still in the buffer are never run.
    ///
    /// Valid in any state, and safe to call more than once.
    pub async fn force_shutdown(&self) {
        {
            let mut state = self.state.write().await;
            if *state != QueueState::Stopped {
                *state = QueueState::ShuttingDown;
            }
        }

        tracing::warn!(live_workers = self.workers.len(), "Force shutdown initiated");
        self.cancel.cancel();
        self.buffer.close();
        // Covers a queue that was never started
        self.workers.close();
        self.workers.wait().await;

        let abandoned = self.buffer.len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "Buffered jobs abandoned by force shutdown");
        }

        self.mark_stopped().await;
        tracing::info!("Force shutdown completed");
    }

    async fn mark_stopped(&self) {
        *self.state.write().await = QueueState::Stopped;
    }

    pub async fn state(&self) -> QueueState {
        *self.state.read().await
    }

    /// Number of worker tasks that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Jobs sitting in the buffer, not yet taken by a worker
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn stats(&self) -> QueueStats {
        self.events.counters().snapshot()
    }

    /// Receive started/finished events for every job processed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        // Let detached workers wind down if the owner never shut the queue down
        self.cancel.cancel();
        self.buffer.close();
    }
}
