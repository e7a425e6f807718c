use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::scheduler::stats::Counters;
use crate::scheduler::{Job, JobStatus};
use crate::worker::executor::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventKind {
    Started,
    Completed,
    Cancelled,
    Failed,
}

impl From<JobStatus> for JobEventKind {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Completed => JobEventKind::Completed,
            JobStatus::Cancelled => JobEventKind::Cancelled,
            JobStatus::Failed => JobEventKind::Failed,
        }
    }
}

/// One observation of a job passing through a worker.
///
/// Every dequeued job yields exactly one `Started` event followed by exactly
/// one terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub worker_id: u64,
    pub job_id: u64,
    pub job_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl JobEvent {
    pub fn started(worker_id: u64, job: &Job) -> Self {
        Self {
            kind: JobEventKind::Started,
            worker_id,
            job_id: job.id(),
            job_name: job.name().to_string(),
            elapsed_ms: None,
            error: None,
            at: Utc::now(),
        }
    }

    pub fn finished(worker_id: u64, job: &Job, result: &ExecutionResult) -> Self {
        Self {
            kind: result.status.into(),
            worker_id,
            job_id: job.id(),
            job_name: job.name().to_string(),
            elapsed_ms: Some(u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX)),
            error: result.error.clone(),
            at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind != JobEventKind::Started
    }
}

/// Fan-out point for job events. Updates the queue counters and broadcasts
/// to any subscribers; having no subscribers is fine.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: broadcast::Sender<JobEvent>,
    counters: Arc<Counters>,
}

impl EventSink {
    pub(crate) fn new(capacity: usize, counters: Arc<Counters>) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, counters }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }

    pub(crate) fn emit(&self, event: JobEvent) {
        match event.kind {
            JobEventKind::Started => self.counters.record_started(),
            JobEventKind::Completed => self.counters.record_completed(),
            JobEventKind::Cancelled => self.counters.record_cancelled(),
            JobEventKind::Failed => self.counters.record_failed(),
        }
        // Err only means nobody is listening
        let _ = self.tx.send(event);
    }
}
