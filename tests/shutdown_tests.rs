//! Graceful and forced shutdown behavior.
//!
//! These tests validate that:
//! - A graceful shutdown drains everything accepted before it began
//! - A graceful shutdown that runs out of time escalates to cancellation and
//!   still joins every worker before returning
//! - A forced shutdown never runs buffered jobs and always returns
//! - No submission is accepted once either shutdown has begun


use std::sync::Arc;
use std::time::{Duration, Instant};

use jobqueue_lite::{Job, JobEventKind, JobQueue, QueueError, QueueState};
use test_harness::{
    assert_eventually, count_kind, drain_events, gated_job, recording_job, stubborn_job, Ledger,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

async fn started_queue(workers: usize, capacity: usize) -> JobQueue {
    let queue = JobQueue::with_workers(workers, capacity).unwrap();
    queue.start().await.unwrap();
    queue
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_shutdown_drains_all_jobs() {
    let queue = JobQueue::with_workers(3, 10).unwrap();
    let mut events = queue.subscribe();
    queue.start().await.unwrap();
    let ledger = Ledger::new();

    for id in 1..=8 {
        queue
            .submit(recording_job(id, Duration::from_millis(100), &ledger))
            .await
            .unwrap();
    }

    let drained = queue
        .shutdown(Duration::from_secs(5))
        .await
        .expect("shutdown should drain in time");
    assert!(drained.elapsed < Duration::from_secs(5));

    assert_eq!(ledger.completed_sorted(), (1..=8).collect::<Vec<u64>>());
    let events = drain_events(&mut events);
    assert_eq!(count_kind(&events, JobEventKind::Completed), 8);
    assert_eq!(count_kind(&events, JobEventKind::Cancelled), 0);

    assert_eq!(queue.state().await, QueueState::Stopped);
    assert_eq!(queue.live_workers(), 0);
    assert!(!queue.is_cancelled());
}

#[tokio::test]
async fn test_graceful_shutdown_drains_buffered_backlog() {
    let queue = started_queue(1, 10).await;
    let ledger = Ledger::new();

    for id in 1..=5 {
        queue
            .submit(recording_job(id, Duration::from_millis(20), &ledger))
            .await
            .unwrap();
    }

    queue.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(ledger.completed(), vec![1, 2, 3, 4, 5]);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_shutdown_times_out_and_escalates() {
    let queue = started_queue(3, 10).await;
    let ledger = Ledger::new();

    for id in 1..=5 {
        queue
            .submit(recording_job(id, Duration::from_secs(2), &ledger))
            .await
            .unwrap();
    }
    assert_eventually(
        || {
            let queue = &queue;
            async move { queue.stats().started == 3 }
        },
        Duration::from_secs(2),
        "each worker should pick up a job",
    )
    .await;

    let start = Instant::now();
    let result = queue.shutdown(Duration::from_millis(200)).await;
    let elapsed = start.elapsed();

    assert_eq!(
        result,
        Err(QueueError::ShutdownTimedOut(Duration::from_millis(200)))
    );
    assert!(
        elapsed < Duration::from_millis(1500),
        "cancelled jobs should return promptly (took {:?})",
        elapsed
    );

    // Every worker is joined before the error is returned
    assert_eq!(queue.live_workers(), 0);
    assert_eq!(queue.state().await, QueueState::Stopped);
    assert!(queue.is_cancelled());

    assert!(ledger.completed().is_empty());
    let stats = queue.stats();
    assert_eq!(stats.started, 3);
    assert_eq!(stats.cancelled, 3);
    assert_eq!(queue.pending(), 2, "cancelled workers take no further jobs");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_escalation_waits_for_jobs_that_ignore_cancellation() {
    let queue = started_queue(2, 10).await;
    let ledger = Ledger::new();

    queue
        .submit(stubborn_job(1, Duration::from_millis(500), &ledger))
        .await
        .unwrap();
    queue
        .submit(stubborn_job(2, Duration::from_millis(500), &ledger))
        .await
        .unwrap();

    let start = Instant::now();
    let result = queue.shutdown(Duration::from_millis(50)).await;

    assert!(matches!(result, Err(QueueError::ShutdownTimedOut(_))));
    assert!(
        start.elapsed() >= Duration::from_millis(400),
        "escalated shutdown must wait for in-flight jobs to return"
    );
    assert_eq!(ledger.completed_sorted(), vec![1, 2]);
    assert_eq!(queue.live_workers(), 0);
}

#[tokio::test]
async fn test_shutdown_requires_running_queue() {
    let queue = JobQueue::with_workers(2, 10).unwrap();
    assert_eq!(
        queue.shutdown(Duration::from_secs(1)).await,
        Err(QueueError::NotRunning)
    );

    queue.start().await.unwrap();
    queue.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(
        queue.shutdown(Duration::from_secs(1)).await,
        Err(QueueError::NotRunning)
    );
}

// ---------------------------------------------------------------------------
// Forced shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_force_shutdown_abandons_buffered_jobs() {
    let queue = JobQueue::with_workers(1, 5).unwrap();
    let mut events = queue.subscribe();
    queue.start().await.unwrap();
    let ledger = Ledger::new();
    let gate = CancellationToken::new();

    queue.submit(gated_job(1, gate, &ledger)).await.unwrap();
    assert_eventually(
        || {
            let ledger = &ledger;
            async move { ledger.started() == vec![1] }
        },
        Duration::from_secs(2),
        "worker should pick up the gated job",
    )
    .await;
    for id in 2..=6 {
        queue
            .submit(recording_job(id, Duration::from_millis(1), &ledger))
            .await
            .unwrap();
    }
    assert_eq!(queue.pending(), 5);

    timeout(Duration::from_secs(2), queue.force_shutdown())
        .await
        .expect("force shutdown must not hang");

    assert_eq!(ledger.started(), vec![1], "buffered jobs are never processed");
    assert!(ledger.completed().is_empty());
    assert_eq!(queue.pending(), 5);
    assert_eq!(queue.live_workers(), 0);
    assert_eq!(queue.state().await, QueueState::Stopped);

    let stats = queue.stats();
    assert_eq!(stats.started, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.abandoned(), 5);

    let events = drain_events(&mut events);
    assert_eq!(count_kind(&events, JobEventKind::Started), 1);
    assert_eq!(count_kind(&events, JobEventKind::Cancelled), 1);
}

#[tokio::test]
async fn test_force_shutdown_before_start() {
    let queue = JobQueue::with_workers(2, 10).unwrap();

    timeout(Duration::from_secs(1), queue.force_shutdown())
        .await
        .expect("nothing to wait for");
    assert_eq!(queue.state().await, QueueState::Stopped);

    // Stopped is terminal
    assert_eq!(queue.start().await, Err(QueueError::AlreadyStarted));
    assert_eq!(
        queue.submit(Job::new(1, "Send SMS", "hi")).await,
        Err(QueueError::QueueClosed(1))
    );
}

#[tokio::test]
async fn test_force_shutdown_after_timed_out_shutdown() {
    let queue = started_queue(1, 10).await;
    let ledger = Ledger::new();
    queue
        .submit(recording_job(1, Duration::from_secs(5), &ledger))
        .await
        .unwrap();

    let result = queue.shutdown(Duration::from_millis(20)).await;
    assert!(matches!(result, Err(QueueError::ShutdownTimedOut(_))));

    timeout(Duration::from_secs(1), queue.force_shutdown())
        .await
        .expect("second shutdown should return immediately");
    assert_eq!(queue.state().await, QueueState::Stopped);
    assert_eq!(queue.live_workers(), 0);
}

// ---------------------------------------------------------------------------
// Shutdown racing live producers
// ---------------------------------------------------------------------------

const RACE_ROUNDS: usize = 10;
const RACE_PRODUCERS: u64 = 4;
const RACE_SUBMITS: u64 = 50;

/// Spawn producers that submit until rejected, each reporting the ids that
/// were accepted.
fn spawn_producers(
    queue: &Arc<JobQueue>,
    ledger: &Ledger,
) -> Vec<tokio::task::JoinHandle<Vec<u64>>> {
    (0..RACE_PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let mut accepted = Vec::new();
                for i in 0..RACE_SUBMITS {
                    let id = p * RACE_SUBMITS + i + 1;
                    let job = recording_job(id, Duration::from_millis(1), &ledger);
                    match queue.submit(job).await {
                        Ok(()) => accepted.push(id),
                        Err(e) => {
                            assert_eq!(e, QueueError::QueueClosed(id));
                            break;
                        }
                    }
                }
                accepted
            })
        })
        .collect()
}

async fn collect_accepted(producers: Vec<tokio::task::JoinHandle<Vec<u64>>>) -> Vec<u64> {
    let mut accepted = Vec::new();
    for result in futures::future::join_all(producers).await {
        accepted.extend(result.unwrap());
    }
    accepted.sort_unstable();
    accepted
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_shutdown_racing_producers_runs_accepted_jobs_once() {
    for round in 0..RACE_ROUNDS {
        let queue = Arc::new(started_queue(3, 2).await);
        let ledger = Ledger::new();
        let producers = spawn_producers(&queue, &ledger);

        tokio::time::sleep(Duration::from_millis(3)).await;
        queue.shutdown(Duration::from_secs(5)).await.unwrap();
        let accepted = collect_accepted(producers).await;

        assert_eq!(
            ledger.completed_sorted(),
            accepted,
            "round {}: every accepted job runs exactly once",
            round
        );
        assert_eq!(queue.live_workers(), 0);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.stats().submitted, accepted.len() as u64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_force_shutdown_racing_producers_accounts_for_every_job() {
    for round in 0..RACE_ROUNDS {
        let queue = Arc::new(started_queue(3, 2).await);
        let ledger = Ledger::new();
        let producers = spawn_producers(&queue, &ledger);

        tokio::time::sleep(Duration::from_millis(3)).await;
        queue.force_shutdown().await;
        let accepted = collect_accepted(producers).await;

        let mut started = ledger.started();
        started.sort_unstable();
        started.dedup();
        assert_eq!(started.len(), ledger.started().len(), "no job starts twice");
        assert!(started.iter().all(|id| accepted.binary_search(id).is_ok()));

        let stats = queue.stats();
        assert_eq!(stats.submitted, accepted.len() as u64);
        assert_eq!(
            stats.started as usize + queue.pending(),
            accepted.len(),
            "round {}: accepted jobs either ran or stayed buffered",
            round
        );
        assert_eq!(stats.abandoned() as usize, queue.pending());
        assert_eq!(queue.live_workers(), 0);
    }
}

// ---------------------------------------------------------------------------
// Intake after shutdown begins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_after_shutdown_is_rejected() {
    let queue = started_queue(2, 10).await;
    queue.shutdown(Duration::from_secs(1)).await.unwrap();

    let result = queue.submit(Job::new(7, "Clean Logs", "old files")).await;
    assert_eq!(result, Err(QueueError::QueueClosed(7)));
    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.stats().rejected, 1);
}

#[tokio::test]
async fn test_submit_after_force_shutdown_is_rejected() {
    let queue = started_queue(2, 10).await;
    queue.force_shutdown().await;

    let result = queue.submit(Job::new(8, "Send Newsletter", "weekly")).await;
    assert_eq!(result, Err(QueueError::QueueClosed(8)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submit_during_graceful_shutdown_is_rejected() {
    let queue = Arc::new(started_queue(1, 10).await);
    let ledger = Ledger::new();
    let gate = CancellationToken::new();

    queue.submit(gated_job(1, gate.clone(), &ledger)).await.unwrap();

    let shutdown = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.shutdown(Duration::from_secs(5)).await })
    };
    assert_eventually(
        || {
            let queue = &queue;
            async move { queue.state().await == QueueState::ShuttingDown }
        },
        Duration::from_secs(2),
        "queue should enter shutting down",
    )
    .await;

    // The buffer has plenty of room, but intake is closed
    let result = queue
        .submit(recording_job(2, Duration::from_millis(1), &ledger))
        .await;
    assert_eq!(result, Err(QueueError::QueueClosed(2)));

    gate.cancel();
    let drained = timeout(Duration::from_secs(5), shutdown)
        .await
        .unwrap()
        .unwrap();
    assert!(drained.is_ok());
    assert_eq!(ledger.completed(), vec![1]);
}

#[tokio::test]
async fn test_blocked_submitter_released_by_force_shutdown() {
    let queue = Arc::new(started_queue(1, 1).await);
    let ledger = Ledger::new();
    let gate = CancellationToken::new();

    queue.submit(gated_job(1, gate, &ledger)).await.unwrap();
    assert_eventually(
        || {
            let ledger = &ledger;
            async move { ledger.started() == vec![1] }
        },
        Duration::from_secs(2),
        "worker should pick up the gated job",
    )
    .await;
    queue
        .submit(recording_job(2, Duration::from_millis(1), &ledger))
        .await
        .unwrap();

    let submitter = {
        let queue = queue.clone();
        let job = recording_job(3, Duration::from_millis(1), &ledger);
        tokio::spawn(async move { queue.submit(job).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!submitter.is_finished());

    queue.force_shutdown().await;

    let result = timeout(Duration::from_secs(2), submitter).await.unwrap().unwrap();
    assert_eq!(result, Err(QueueError::QueueClosed(3)));
    assert_eq!(ledger.started(), vec![1]);
}
