use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use uuid::Uuid;
use vesting_sim::config::{
    AbmConfig, PricingConfig, SimulationRequest, TokenConfig, VestingBucket,
};
use vesting_sim::jobs::{JobQueue, JobStatus, QueueConfig};

fn request(horizon: u32, agents: u32, seed: u64) -> SimulationRequest {
    SimulationRequest {
        token: TokenConfig {
            total_supply: 1_000_000,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            horizon_months: horizon,
        },
        buckets: vec![VestingBucket {
            name: "community".to_string(),
            allocation_percent: 100.0,
            tge_percent: 0.0,
            cliff_months: 0,
            vesting_months: horizon,
            cohort: None,
        }],
        abm: AbmConfig {
            total_holders: agents as u64,
            agents_per_cohort: Some(agents),
            pricing: PricingConfig::Constant,
            staking: None,
            treasury: None,
            cohorts: Vec::new(),
            initial_price: 1.0,
            seed: Some(seed),
            store_cohort_details: false,
        },
        monte_carlo: None,
    }
}

fn quick_request(seed: u64) -> SimulationRequest {
    request(6, 10, seed)
}

/// Big enough to keep a worker busy while the test pokes at the queue.
fn slow_request(seed: u64) -> SimulationRequest {
    request(240, 5000, seed)
}

async fn wait_terminal(queue: &JobQueue, id: Uuid) -> JobStatus {
    tokio::time::timeout(Duration::from_secs(60), async {
        let mut subscription = queue.subscribe(id).unwrap();
        let mut outcome = None;
        while let Some(event) = subscription.next().await {
            if event.done {
                outcome = event.outcome;
                break;
            }
        }
        match outcome.as_deref() {
            Some("completed") => JobStatus::Completed,
            Some("failed") => JobStatus::Failed,
            Some("cancelled") => JobStatus::Cancelled,
            _ => queue.status(id).unwrap().status,
        }
    })
    .await
    .expect("job did not reach a terminal state in time")
}

// ─── Test 1: submit → run → result ──────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submit_and_complete() {
    let queue = JobQueue::new(QueueConfig::default());
    let receipt = queue.submit(quick_request(42), false).unwrap();
    assert!(!receipt.cached);

    let status = wait_terminal(&queue, receipt.job_id).await;
    assert_eq!(status, JobStatus::Completed);

    let output = queue.result(receipt.job_id).unwrap();
    let result = output.as_single().unwrap();
    // TGE month plus the 6-month horizon.
    assert_eq!(result.months.len(), 7);
    assert_eq!(result.seed, 42);

    let report = queue.status(receipt.job_id).unwrap();
    assert_eq!(report.current, 7);
    assert_eq!(report.total, 7);
    assert!(report.started_at.is_some());
    assert!(report.finished_at.is_some());
}

// ─── Test 2: cache round-trip ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_round_trip() {
    let queue = JobQueue::new(QueueConfig::default());

    let first = queue.submit(quick_request(42), false).unwrap();
    wait_terminal(&queue, first.job_id).await;
    let first_result = queue.result(first.job_id).unwrap();

    // Same payload inside the TTL: instant completion on the same result.
    let second = queue.submit(quick_request(42), false).unwrap();
    assert!(second.cached);
    assert_eq!(second.status, JobStatus::Completed);
    assert_ne!(second.job_id, first.job_id);
    let second_result = queue.result(second.job_id).unwrap();
    assert!(Arc::ptr_eq(&first_result, &second_result));

    // A changed seed changes the fingerprint.
    let reseeded = queue.submit(quick_request(43), false).unwrap();
    assert!(!reseeded.cached);
    wait_terminal(&queue, reseeded.job_id).await;

    // Cache bypass always runs a worker.
    let bypassed = queue.submit(quick_request(42), true).unwrap();
    assert!(!bypassed.cached);
    wait_terminal(&queue, bypassed.job_id).await;
}

// ─── Test 3: failed and cancelled runs never hit the cache ──────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_run_not_cached() {
    let queue = JobQueue::new(QueueConfig::default());

    let receipt = queue.submit(slow_request(7), false).unwrap();
    // Let it start, then cancel mid-run.
    let mut subscription = queue.subscribe(receipt.job_id).unwrap();
    tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = subscription.next().await {
            if event.current >= 1 && !event.done {
                break;
            }
        }
    })
    .await
    .unwrap();
    queue.cancel(receipt.job_id).unwrap();
    let status = wait_terminal(&queue, receipt.job_id).await;
    assert_eq!(status, JobStatus::Cancelled);
    assert!(queue.result(receipt.job_id).is_err());

    // The same payload runs fresh: nothing was cached.
    let again = queue.submit(slow_request(7), false).unwrap();
    assert!(!again.cached);
    queue.cancel(again.job_id).unwrap();
    wait_terminal(&queue, again.job_id).await;
}

// ─── Test 4: pending jobs cancel immediately ────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_pending_job() {
    let config = QueueConfig {
        max_concurrent: 1,
        ..QueueConfig::default()
    };
    let queue = JobQueue::new(config);

    // Occupy the only worker slot.
    let blocker = queue.submit(slow_request(1), false).unwrap();
    let waiting = queue.submit(quick_request(2), false).unwrap();

    queue.cancel(waiting.job_id).unwrap();
    let report = queue.status(waiting.job_id).unwrap();
    assert_eq!(report.status, JobStatus::Cancelled);

    // Cancelling a terminal job is an error.
    assert!(queue.cancel(waiting.job_id).is_err());

    queue.cancel(blocker.job_id).unwrap();
    wait_terminal(&queue, blocker.job_id).await;
}

// ─── Test 5: lookups on unknown jobs fail ───────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unknown_job_errors() {
    let queue = JobQueue::new(QueueConfig::default());
    let id = Uuid::new_v4();
    assert!(queue.status(id).is_err());
    assert!(queue.result(id).is_err());
    assert!(queue.cancel(id).is_err());
    assert!(queue.subscribe(id).is_err());
}

// ─── Test 6: invalid requests create no job ─────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_validation_creates_no_job() {
    let queue = JobQueue::new(QueueConfig::default());

    let mut bad = quick_request(1);
    bad.token.horizon_months = 0;
    assert!(queue.submit(bad, false).is_err());
    assert_eq!(queue.job_count(), 0);

    // Monte-Carlo submission requires the block.
    assert!(queue.submit_monte_carlo(quick_request(1), false).is_err());
    assert_eq!(queue.job_count(), 0);
}

// ─── Test 7: progress stream contract ───────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_progress_stream() {
    let queue = JobQueue::new(QueueConfig::default());
    let receipt = queue.submit(request(24, 50, 9), false).unwrap();

    let mut subscription = queue.subscribe(receipt.job_id).unwrap();
    let mut last_percent = -1.0;
    let mut saw_done = false;
    tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = subscription.next().await {
            assert!(event.percent >= last_percent);
            last_percent = event.percent;
            if event.done {
                saw_done = true;
                assert_eq!(event.outcome.as_deref(), Some("completed"));
            }
        }
    })
    .await
    .unwrap();
    assert!(saw_done);

    // Late subscribers get exactly the done event, then the end of stream.
    let mut late = queue.subscribe(receipt.job_id).unwrap();
    let event = late.next().await.unwrap();
    assert!(event.done);
    assert!(late.next().await.is_none());
}

// ─── Test 8: Monte-Carlo jobs through the queue ─────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_monte_carlo_job() {
    let queue = JobQueue::new(QueueConfig::default());

    let mut mc_request = quick_request(5);
    mc_request.monte_carlo = Some(vesting_sim::config::MonteCarloConfig {
        num_trials: 6,
        confidence_levels: vec![10.0, 50.0, 90.0],
        seed: Some(99),
    });

    let receipt = queue.submit_monte_carlo(mc_request, false).unwrap();
    let status = wait_terminal(&queue, receipt.job_id).await;
    assert_eq!(status, JobStatus::Completed);

    let output = queue.result(receipt.job_id).unwrap();
    let result = output.as_monte_carlo().unwrap();
    assert_eq!(result.num_trials, 6);
    assert_eq!(result.master_seed, 99);
    assert_eq!(result.metrics.len(), 5);
}

// ─── Test 9: terminal jobs and stale cache entries get swept ────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ttl_sweep() {
    let config = QueueConfig {
        max_concurrent: 2,
        cache_ttl: Duration::ZERO,
        job_ttl: Duration::ZERO,
        sweep_interval: Duration::from_millis(50),
    };
    let queue = JobQueue::new(config);

    let receipt = queue.submit(quick_request(42), false).unwrap();
    wait_terminal(&queue, receipt.job_id).await;

    // An expired cache entry never serves a hit.
    let second = queue.submit(quick_request(42), false).unwrap();
    assert!(!second.cached);
    wait_terminal(&queue, second.job_id).await;

    // The sweeper eventually drops the terminal jobs.
    tokio::time::timeout(Duration::from_secs(10), async {
        while queue.job_count() > 0 {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .expect("terminal jobs were not swept");

    assert!(queue.status(receipt.job_id).is_err());
}
