use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::SimulationRequest;
use crate::error::{EngineError, EngineResult};
use crate::fingerprint::fingerprint;
use crate::montecarlo::{run_monte_carlo, MonteCarloOutcome, MonteCarloResult};
use crate::progress::{ProgressChannel, ProgressSubscription};
use crate::simulation::{RunControl, RunOutcome, Simulation, SimulationResult};

// ═══════════════════════════════════════════════════════════════════════
// Job model
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Single,
    MonteCarlo,
}

impl JobKind {
    /// Tag mixed into the fingerprint so the two submission kinds of the
    /// same payload never share a cache slot.
    fn cache_tag(&self) -> &'static str {
        match self {
            JobKind::Single => "single",
            JobKind::MonteCarlo => "monte_carlo",
        }
    }
}

/// pending → running → {completed, failed, cancelled}; terminal states
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutput {
    Single(SimulationResult),
    MonteCarlo(MonteCarloResult),
}

impl JobOutput {
    pub fn as_single(&self) -> Option<&SimulationResult> {
        match self {
            JobOutput::Single(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_monte_carlo(&self) -> Option<&MonteCarloResult> {
        match self {
            JobOutput::MonteCarlo(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: JobStatus,
    pub percent: f64,
    pub current: u32,
    pub total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    kind: JobKind,
    status: JobStatus,
    request: Arc<SimulationRequest>,
    fingerprint: String,
    submitted_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    error: Option<String>,
    result: Option<Arc<JobOutput>>,
    cancel: Arc<AtomicBool>,
    progress: Arc<ProgressChannel>,
}

struct CacheEntry {
    result: Arc<JobOutput>,
    stored_at: Instant,
}

// ═══════════════════════════════════════════════════════════════════════
// Queue
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs allowed in `running` at once.
    pub max_concurrent: usize,
    pub cache_ttl: Duration,
    /// Terminal jobs older than this are swept from the table.
    pub job_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_concurrent: 5,
            cache_ttl: Duration::from_secs(2 * 60 * 60),
            job_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Async job queue over the simulation core: bounded concurrency, FIFO
/// admission, per-job progress channels, cancellation and a
/// fingerprint-keyed result cache.
///
/// Must be created inside a tokio runtime; workers and the TTL sweeper
/// run as tasks on it. State is process-local.
#[derive(Clone)]
pub struct JobQueue {
    shared: Arc<QueueShared>,
}

struct QueueShared {
    jobs: Mutex<HashMap<Uuid, JobEntry>>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    /// FIFO-fair semaphore: pending jobs start in submission order.
    permits: Arc<Semaphore>,
    config: QueueConfig,
}

enum Execution {
    Done(JobOutput),
    Cancelled,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        let shared = Arc::new(QueueShared {
            jobs: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            config,
        });

        let weak = Arc::downgrade(&shared);
        tokio::spawn(sweeper(weak));

        JobQueue { shared }
    }

    /// Submit a single simulation. Validation failures surface here and
    /// create no job; a fresh or cached job id is returned otherwise.
    pub fn submit(
        &self,
        request: SimulationRequest,
        bypass_cache: bool,
    ) -> EngineResult<SubmitReceipt> {
        self.submit_inner(request, JobKind::Single, bypass_cache)
    }

    /// Submit a Monte-Carlo replication; the request must carry a
    /// `monte_carlo` block.
    pub fn submit_monte_carlo(
        &self,
        request: SimulationRequest,
        bypass_cache: bool,
    ) -> EngineResult<SubmitReceipt> {
        if request.monte_carlo.is_none() {
            return Err(EngineError::validation(
                "monte_carlo submission requires a monte_carlo block",
            ));
        }
        self.submit_inner(request, JobKind::MonteCarlo, bypass_cache)
    }

    fn submit_inner(
        &self,
        request: SimulationRequest,
        kind: JobKind,
        bypass_cache: bool,
    ) -> EngineResult<SubmitReceipt> {
        request.validate()?;
        let print = fingerprint(&request, kind.cache_tag())?;
        let id = Uuid::new_v4();

        if !bypass_cache {
            if let Some(result) = self.shared.cache_lookup(&print) {
                let progress = Arc::new(ProgressChannel::new());
                progress.finish(JobStatus::Completed.label());
                let now = Utc::now();
                self.shared.jobs.lock().unwrap().insert(
                    id,
                    JobEntry {
                        kind,
                        status: JobStatus::Completed,
                        request: Arc::new(request),
                        fingerprint: print,
                        submitted_at: now,
                        started_at: None,
                        finished_at: Some(now),
                        error: None,
                        result: Some(result),
                        cancel: Arc::new(AtomicBool::new(false)),
                        progress,
                    },
                );
                tracing::debug!(job = %id, "cache hit, job completed immediately");
                return Ok(SubmitReceipt {
                    job_id: id,
                    status: JobStatus::Completed,
                    cached: true,
                });
            }
        }

        self.shared.jobs.lock().unwrap().insert(
            id,
            JobEntry {
                kind,
                status: JobStatus::Pending,
                request: Arc::new(request),
                fingerprint: print,
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
                error: None,
                result: None,
                cancel: Arc::new(AtomicBool::new(false)),
                progress: Arc::new(ProgressChannel::new()),
            },
        );

        let shared = self.shared.clone();
        tokio::spawn(async move {
            QueueShared::execute(shared, id).await;
        });

        tracing::debug!(job = %id, ?kind, "job submitted");
        Ok(SubmitReceipt {
            job_id: id,
            status: JobStatus::Pending,
            cached: false,
        })
    }

    pub fn status(&self, id: Uuid) -> EngineResult<StatusReport> {
        let jobs = self.shared.jobs.lock().unwrap();
        let entry = jobs.get(&id).ok_or(EngineError::JobNotFound(id))?;
        let latest = entry.progress.latest();
        Ok(StatusReport {
            status: entry.status,
            percent: latest.percent,
            current: latest.current,
            total: latest.total,
            error: entry.error.clone(),
            submitted_at: entry.submitted_at,
            started_at: entry.started_at,
            finished_at: entry.finished_at,
        })
    }

    /// The completed result, or a not-ready error naming the job's state.
    pub fn result(&self, id: Uuid) -> EngineResult<Arc<JobOutput>> {
        let jobs = self.shared.jobs.lock().unwrap();
        let entry = jobs.get(&id).ok_or(EngineError::JobNotFound(id))?;
        match (&entry.status, &entry.result) {
            (JobStatus::Completed, Some(result)) => Ok(result.clone()),
            (status, _) => Err(EngineError::ResultNotReady {
                id,
                status: status.to_string(),
            }),
        }
    }

    /// Cancel a job. Pending jobs go terminal immediately; running jobs
    /// stop at their next month boundary, so completion may lag by up to
    /// one month's worth of work.
    pub fn cancel(&self, id: Uuid) -> EngineResult<()> {
        let mut jobs = self.shared.jobs.lock().unwrap();
        let entry = jobs.get_mut(&id).ok_or(EngineError::JobNotFound(id))?;
        match entry.status {
            JobStatus::Pending => {
                entry.cancel.store(true, Ordering::Relaxed);
                entry.status = JobStatus::Cancelled;
                entry.finished_at = Some(Utc::now());
                entry.progress.finish(JobStatus::Cancelled.label());
                tracing::info!(job = %id, "pending job cancelled");
                Ok(())
            }
            JobStatus::Running => {
                entry.cancel.store(true, Ordering::Relaxed);
                tracing::info!(job = %id, "cancellation requested for running job");
                Ok(())
            }
            status => Err(EngineError::AlreadyTerminal {
                id,
                status: status.to_string(),
            }),
        }
    }

    /// Attach a progress subscription: latest snapshot first, then live
    /// updates, then one `done` event.
    pub fn subscribe(&self, id: Uuid) -> EngineResult<ProgressSubscription> {
        let jobs = self.shared.jobs.lock().unwrap();
        let entry = jobs.get(&id).ok_or(EngineError::JobNotFound(id))?;
        Ok(entry.progress.subscribe())
    }

    /// Number of jobs currently in the table (all states).
    pub fn job_count(&self) -> usize {
        self.shared.jobs.lock().unwrap().len()
    }
}

impl QueueShared {
    fn cache_lookup(&self, print: &str) -> Option<Arc<JobOutput>> {
        let mut cache = self.cache.lock().unwrap();
        match cache.get(print) {
            Some(entry) if entry.stored_at.elapsed() < self.config.cache_ttl => {
                Some(entry.result.clone())
            }
            Some(_) => {
                // Lazy eviction of the expired entry.
                cache.remove(print);
                None
            }
            None => None,
        }
    }

    async fn execute(shared: Arc<QueueShared>, id: Uuid) {
        let permit = match shared.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        // Move pending → running, unless the job was cancelled (or swept)
        // while waiting for a permit.
        let (kind, request, cancel, progress) = {
            let mut jobs = shared.jobs.lock().unwrap();
            let entry = match jobs.get_mut(&id) {
                Some(entry) => entry,
                None => return,
            };
            if entry.status != JobStatus::Pending {
                return;
            }
            entry.status = JobStatus::Running;
            entry.started_at = Some(Utc::now());
            (
                entry.kind,
                entry.request.clone(),
                entry.cancel.clone(),
                entry.progress.clone(),
            )
        };

        let control = RunControl::new(cancel, progress.clone());
        let outcome = tokio::task::spawn_blocking(move || -> EngineResult<Execution> {
            match kind {
                JobKind::Single => {
                    let simulation = Simulation::new(&request)?;
                    match simulation.run(&control)? {
                        RunOutcome::Completed(result) => {
                            Ok(Execution::Done(JobOutput::Single(result)))
                        }
                        RunOutcome::Cancelled => Ok(Execution::Cancelled),
                    }
                }
                JobKind::MonteCarlo => match run_monte_carlo(&request, &control)? {
                    MonteCarloOutcome::Completed(result) => {
                        Ok(Execution::Done(JobOutput::MonteCarlo(result)))
                    }
                    MonteCarloOutcome::Cancelled => Ok(Execution::Cancelled),
                },
            }
        })
        .await;

        let resolution = match outcome {
            Ok(result) => result,
            Err(join_error) => Err(EngineError::simulation(format!(
                "worker aborted: {join_error}"
            ))),
        };

        let mut jobs = shared.jobs.lock().unwrap();
        let entry = match jobs.get_mut(&id) {
            Some(entry) => entry,
            None => return,
        };
        entry.finished_at = Some(Utc::now());
        match resolution {
            Ok(Execution::Done(output)) => {
                let output = Arc::new(output);
                entry.result = Some(output.clone());
                entry.status = JobStatus::Completed;
                entry.progress.finish(JobStatus::Completed.label());
                // Cache writes happen on normal completion only.
                shared.cache.lock().unwrap().insert(
                    entry.fingerprint.clone(),
                    CacheEntry {
                        result: output,
                        stored_at: Instant::now(),
                    },
                );
                tracing::info!(job = %id, "job completed");
            }
            Ok(Execution::Cancelled) => {
                entry.status = JobStatus::Cancelled;
                entry.progress.finish(JobStatus::Cancelled.label());
                tracing::info!(job = %id, "job cancelled");
            }
            Err(error) => {
                entry.status = JobStatus::Failed;
                entry.error = Some(error.to_string());
                entry.progress.finish(JobStatus::Failed.label());
                tracing::warn!(job = %id, %error, "job failed");
            }
        }
        drop(jobs);
        drop(permit);
    }

    fn sweep(&self) {
        let cache_ttl = self.config.cache_ttl;
        {
            let mut cache = self.cache.lock().unwrap();
            cache.retain(|_, entry| entry.stored_at.elapsed() < cache_ttl);
        }

        let job_ttl = match chrono::Duration::from_std(self.config.job_ttl) {
            Ok(ttl) => ttl,
            Err(_) => return,
        };
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, entry| {
            !(entry.status.is_terminal()
                && entry
                    .finished_at
                    .map(|at| now - at > job_ttl)
                    .unwrap_or(false))
        });
        let swept = before - jobs.len();
        if swept > 0 {
            tracing::debug!(swept, "expired jobs removed");
        }
    }
}

async fn sweeper(shared: Weak<QueueShared>) {
    let interval = match shared.upgrade() {
        Some(shared) => shared.config.sweep_interval,
        None => return,
    };
    loop {
        tokio::time::sleep(interval).await;
        match shared.upgrade() {
            Some(shared) => shared.sweep(),
            None => break,
        }
    }
}
