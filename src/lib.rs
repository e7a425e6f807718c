pub mod config;
pub mod error;
pub mod scheduler;
pub mod shutdown;
pub mod worker;

pub use config::{DemoConfig, QueueConfig};
pub use error::{JobError, QueueError, Result};
pub use scheduler::{Drained, Job, JobContext, JobQueue, JobStatus, QueueState, QueueStats};
pub use worker::{JobEvent, JobEventKind};
