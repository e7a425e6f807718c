use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use jobqueue_lite::config::{DemoConfig, QueueConfig};
use jobqueue_lite::shutdown::{wait_for_termination, TerminationSignal};
use jobqueue_lite::{Job, JobQueue, QueueStats};

#[derive(Parser, Debug)]
#[command(name = "jobqueue-lite")]
#[command(version)]
#[command(about = "Run a demo workload through a bounded multi-worker job queue")]
struct Args {
    /// Number of workers in the pool
    #[arg(long, default_value = "3")]
    workers: usize,

    /// Jobs that may wait in the buffer before submission blocks
    #[arg(long, default_value = "10")]
    buffer: usize,

    /// Number of jobs to submit
    #[arg(long, default_value = "10")]
    jobs: usize,

    /// Simulated work per job, in milliseconds
    #[arg(long, default_value = "500")]
    work_ms: u64,

    /// Delay between submissions, in milliseconds
    #[arg(long, default_value = "200")]
    submit_interval_ms: u64,

    /// Seconds to run before shutting down on our own
    #[arg(long, default_value = "8")]
    run_secs: u64,

    /// Graceful shutdown timeout when the demo time expires, in milliseconds
    #[arg(long, default_value = "3000")]
    shutdown_timeout_ms: u64,

    /// Graceful shutdown timeout after SIGINT/SIGTERM, in milliseconds
    #[arg(long, default_value = "5000")]
    signal_shutdown_timeout_ms: u64,

    /// Output format for the final summary
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl Args {
    fn demo_config(&self) -> DemoConfig {
        DemoConfig::default()
            .with_queue(QueueConfig::new(self.workers, self.buffer))
            .with_job_count(self.jobs)
            .with_work_duration(Duration::from_millis(self.work_ms))
            .with_submit_interval(Duration::from_millis(self.submit_interval_ms))
            .with_run_for(Duration::from_secs(self.run_secs))
            .with_shutdown_timeouts(
                Duration::from_millis(self.shutdown_timeout_ms),
                Duration::from_millis(self.signal_shutdown_timeout_ms),
            )
    }
}

// =============================================================================
// Demo Workload
// =============================================================================

const CANNED_JOBS: [(&str, &str); 10] = [
    ("Send Email", "Welcome email to user@example.com"),
    ("Process Payment", "Payment of $100 for order #123"),
    ("Generate Report", "Monthly sales report"),
    ("Backup Data", "Database backup to cloud storage"),
    ("Send SMS", "Order confirmation SMS"),
    ("Update Inventory", "Update stock for product #456"),
    ("Send Newsletter", "Weekly newsletter to subscribers"),
    ("Clean Logs", "Remove old log files"),
    ("Process Image", "Resize user profile image"),
    ("Send Push Notification", "New message notification"),
];

fn demo_jobs(count: usize, work: Duration) -> Vec<Job> {
    CANNED_JOBS
        .iter()
        .cycle()
        .take(count)
        .enumerate()
        .map(|(i, (name, payload))| Job::simulated(i as u64 + 1, *name, *payload, work))
        .collect()
}

/// Submit jobs one by one, stopping at the first rejection.
async fn submit_jobs(queue: Arc<JobQueue>, jobs: Vec<Job>, interval: Duration) -> usize {
    let mut accepted = 0;
    for job in jobs {
        let job_id = job.id();
        if let Err(e) = queue.submit(job).await {
            tracing::warn!(job_id, error = %e, "Failed to add job");
            break;
        }
        tracing::info!(job_id, "Added job to queue");
        accepted += 1;
        tokio::time::sleep(interval).await;
    }
    accepted
}

// =============================================================================
// Shutdown Trigger
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Signal(TerminationSignal),
    DemoExpired,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Signal(signal) => write!(f, "{}", signal),
            Trigger::DemoExpired => write!(f, "demo_expired"),
        }
    }
}

/// Wait for a termination signal or for `run_for` to elapse.
///
/// If the signal handlers cannot be installed the demo timer alone decides.
async fn wait_for_trigger<F>(termination: F, run_for: Duration) -> Trigger
where
    F: Future<Output = io::Result<TerminationSignal>>,
{
    let signal = async {
        match termination.await {
            Ok(signal) => signal,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to install signal handlers, waiting for demo timeout"
                );
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        signal = signal => Trigger::Signal(signal),
        _ = tokio::time::sleep(run_for) => {
            tracing::info!("Demo time expired, shutting down");
            Trigger::DemoExpired
        }
    }
}

// =============================================================================
// Summary Output
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ShutdownOutcome {
    Drained,
    Forced,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    trigger: String,
    outcome: ShutdownOutcome,
    accepted: usize,
    abandoned: u64,
    stats: QueueStats,
}

fn print_summary(summary: &RunSummary, format: &OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Table => {
            let outcome = match summary.outcome {
                ShutdownOutcome::Drained => "drained",
                ShutdownOutcome::Forced => "forced",
            };
            println!("Run Summary");
            println!("{}", "=".repeat(30));
            println!("Trigger:    {}", summary.trigger);
            println!("Shutdown:   {}", outcome);
            println!("Accepted:   {}", summary.accepted);
            println!("Started:    {}", summary.stats.started);
            println!("Completed:  {}", summary.stats.completed);
            println!("Cancelled:  {}", summary.stats.cancelled);
            println!("Failed:     {}", summary.stats.failed);
            println!("Rejected:   {}", summary.stats.rejected);
            println!("Abandoned:  {}", summary.abandoned);
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = args.demo_config();
    let queue = Arc::new(JobQueue::new(config.queue.clone())?);
    queue.start().await?;

    let producer = tokio::spawn(submit_jobs(
        queue.clone(),
        demo_jobs(config.job_count, config.work_duration),
        config.submit_interval,
    ));

    let trigger = wait_for_trigger(wait_for_termination(), config.run_for).await;
    let timeout = match trigger {
        Trigger::Signal(_) => config.signal_shutdown_timeout,
        Trigger::DemoExpired => config.shutdown_timeout,
    };

    let outcome = match queue.shutdown(timeout).await {
        Ok(drained) => {
            tracing::info!(
                elapsed_ms = u64::try_from(drained.elapsed.as_millis()).unwrap_or(u64::MAX),
                "Queue drained"
            );
            ShutdownOutcome::Drained
        }
        Err(e) => {
            tracing::warn!(error = %e, "Graceful shutdown failed, performing force shutdown");
            queue.force_shutdown().await;
            ShutdownOutcome::Forced
        }
    };

    let accepted = match producer.await {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::error!(error = %e, "Producer task failed");
            0
        }
    };

    let stats = queue.stats();
    let summary = RunSummary {
        trigger: trigger.to_string(),
        outcome,
        accepted,
        abandoned: stats.abandoned(),
        stats,
    };
    print_summary(&summary, &args.output)?;

    tracing::info!("Program finished");
    Ok(())
}
