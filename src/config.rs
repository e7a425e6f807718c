use std::time::Duration;

use crate::error::{QueueError, Result};

/// Sizing for a [`JobQueue`](crate::scheduler::JobQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Number of workers spawned by `start`. Must be positive.
    pub worker_count: usize,
    /// Jobs that may wait in the buffer before `submit` blocks.
    /// Zero makes every submission a direct hand-off to an idle worker.
    pub buffer_capacity: usize,
    /// Capacity of the job event broadcast channel.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: 3,
            buffer_capacity: 10,
            event_capacity: 1024,
        }
    }
}

impl QueueConfig {
    pub fn new(worker_count: usize, buffer_capacity: usize) -> Self {
        Self {
            worker_count,
            buffer_capacity,
            ..Default::default()
        }
    }

    pub fn with_event_capacity(mut self, event_capacity: usize) -> Self {
        self.event_capacity = event_capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(QueueError::InvalidConfig(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(QueueError::InvalidConfig(
                "event_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the demo host program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    pub queue: QueueConfig,
    /// How many of the canned jobs to submit
    pub job_count: usize,
    /// Simulated work per job
    pub work_duration: Duration,
    /// Delay between two submissions
    pub submit_interval: Duration,
    /// Run time before the demo shuts itself down
    pub run_for: Duration,
    /// Graceful timeout used when the demo time expires
    pub shutdown_timeout: Duration,
    /// Graceful timeout used after SIGINT/SIGTERM
    pub signal_shutdown_timeout: Duration,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            job_count: 10,
            work_duration: Duration::from_millis(500),
            submit_interval: Duration::from_millis(200),
            run_for: Duration::from_secs(8),
            shutdown_timeout: Duration::from_secs(3),
            signal_shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl DemoConfig {
    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_job_count(mut self, job_count: usize) -> Self {
        self.job_count = job_count;
        self
    }

    pub fn with_work_duration(mut self, work_duration: Duration) -> Self {
        self.work_duration = work_duration;
        self
    }

    pub fn with_submit_interval(mut self, submit_interval: Duration) -> Self {
        self.submit_interval = submit_interval;
        self
    }

    pub fn with_run_for(mut self, run_for: Duration) -> Self {
        self.run_for = run_for;
        self
    }

    /// Graceful timeouts for demo expiry and for a termination signal.
    pub fn with_shutdown_timeouts(mut self, on_expiry: Duration, on_signal: Duration) -> Self {
        self.shutdown_timeout = on_expiry;
        self.signal_shutdown_timeout = on_signal;
        self
    }
}
