pub mod buffer;
pub mod job;
pub mod queue;
pub mod stats;

pub use job::{Job, JobContext, JobStatus};
pub use queue::{Drained, JobQueue, QueueState};
pub use stats::QueueStats;
