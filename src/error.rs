use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is closed, job {0} rejected")]
    QueueClosed(u64),

    #[error("Shutdown timed out after {0:?}, workers were cancelled")]
    ShutdownTimedOut(Duration),

    #[error("Queue is not running")]
    NotRunning,

    #[error("Queue has already been started")]
    AlreadyStarted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reason a job's processing routine did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job cancelled")]
    Cancelled,

    #[error("job failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
