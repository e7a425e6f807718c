//! Worker side of the queue.
//!
//! - **Worker loop** ([`Worker`]): pulls jobs from the shared buffer and runs them
//! - **Execution** ([`JobExecutor`]): runs one job's routine, containing panics
//! - **Events** ([`JobEvent`]): started/finished observations for each job
//!
//! # Execution Flow
//!
//! 1. Worker waits on the buffer, racing the wait against the queue's cancellation token
//! 2. A dequeued job is announced with a `Started` event
//! 3. [`JobExecutor::execute`] runs the routine with the same token
//! 4. The outcome is published as a `Completed`, `Cancelled` or `Failed` event
//!
//! The loop ends when the buffer is closed and empty, or when the token fires.

pub mod events;
pub mod executor;
pub mod runner;

pub use events::{JobEvent, JobEventKind};
pub use executor::{ExecutionResult, JobExecutor};
pub use runner::Worker;
