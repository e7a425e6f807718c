use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Running totals shared by the queue and its workers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> QueueStats {
        QueueStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a queue's job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Jobs accepted into the buffer
    pub submitted: u64,
    /// Submissions refused with `QueueClosed`
    pub rejected: u64,
    /// Jobs a worker began processing
    pub started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Jobs whose routine has returned, whatever the outcome.
    pub fn finished(&self) -> u64 {
        self.completed + self.cancelled + self.failed
    }

    /// Accepted jobs that no worker ever picked up.
    pub fn abandoned(&self) -> u64 {
        self.submitted.saturating_sub(self.started)
    }
}
