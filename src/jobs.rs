//! Background analysis jobs.
//!
//! A bounded in-process queue feeds a fixed pool of tokio workers. Each
//! worker takes one job at a time and runs the blocking pipeline on the
//! blocking thread pool. Job progress is tracked in a shared registry that
//! the API polls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tempfile::TempPath;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::ANALYSIS_QUEUE;
use crate::models::AnalysisRequest;
use crate::service::{AnalysisError, AnalysisService};

/// One queued analysis: the accepted request plus its staged upload.
pub struct AnalysisJob {
    pub request: AnalysisRequest,
    pub upload: TempPath,
}

impl AnalysisJob {
    pub fn analysis_id(&self) -> Uuid {
        self.request.id
    }
}

/// Reported by a worker when a job has been processed and saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

/// Finished statuses kept in memory. Older ones are answered from the store.
pub const FINISHED_JOBS_RETAINED: usize = 1024;

#[derive(Debug, Default)]
struct RegistryState {
    statuses: HashMap<Uuid, JobStatus>,
    finished: VecDeque<Uuid>,
}

/// Status of queued and running jobs, plus the most recently finished ones.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    inner: Arc<Mutex<RegistryState>>,
    retain_finished: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(FINISHED_JOBS_RETAINED)
    }
}

impl JobRegistry {
    pub fn new(retain_finished: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryState::default())),
            retain_finished,
        }
    }

    pub fn set(&self, id: Uuid, status: JobStatus) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        let finished = status.is_finished();
        state.statuses.insert(id, status);
        if !finished {
            return;
        }

        state.finished.push_back(id);
        while state.finished.len() > self.retain_finished {
            if let Some(oldest) = state.finished.pop_front() {
                state.statuses.remove(&oldest);
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<JobStatus> {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.statuses.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|state| state.statuses.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: &Uuid) {
        if let Ok(mut state) = self.inner.lock() {
            state.statuses.remove(id);
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Analysis queue is full, try again later")]
    Full,

    #[error("Analysis queue is closed")]
    Closed,
}

/// Producer side of the analysis queue.
pub struct JobQueue {
    sender: Mutex<Option<mpsc::Sender<AnalysisJob>>>,
    registry: JobRegistry,
}

impl JobQueue {
    /// Enqueue without waiting. The job is registered as queued on success.
    pub fn submit(&self, job: AnalysisJob) -> Result<Uuid, QueueError> {
        let id = job.analysis_id();
        let guard = self.sender.lock().map_err(|_| QueueError::Closed)?;
        let sender = guard.as_ref().ok_or(QueueError::Closed)?;

        // Register first so a fast worker never overwrites Running with Queued.
        self.registry.set(id, JobStatus::Queued);
        match sender.try_send(job) {
            Ok(()) => {
                tracing::info!(queue = ANALYSIS_QUEUE, analysis_id = %id, "Job queued");
                Ok(id)
            }
            Err(e) => {
                self.registry.remove(&id);
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        tracing::warn!(queue = ANALYSIS_QUEUE, "Queue full, job rejected");
                        Err(QueueError::Full)
                    }
                    mpsc::error::TrySendError::Closed(_) => Err(QueueError::Closed),
                }
            }
        }
    }

    pub fn status(&self, id: &Uuid) -> Option<JobStatus> {
        self.registry.get(id)
    }

    /// Stop accepting jobs. Workers drain what is already queued.
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            if guard.take().is_some() {
                tracing::info!(queue = ANALYSIS_QUEUE, "Queue closed");
            }
        }
    }
}

/// Handles of the running workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. Call after [`JobQueue::close`].
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("All analysis workers stopped");
    }
}

/// Spawn `workers` workers on the current runtime behind a queue of `capacity`.
pub fn start_workers(
    service: Arc<AnalysisService>,
    workers: usize,
    capacity: usize,
) -> (Arc<JobQueue>, WorkerPool) {
    start_workers_with(service, workers, capacity, JobRegistry::default())
}

/// Same as [`start_workers`] with a caller-supplied registry.
pub fn start_workers_with(
    service: Arc<AnalysisService>,
    workers: usize,
    capacity: usize,
    registry: JobRegistry,
) -> (Arc<JobQueue>, WorkerPool) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

    let handles = (0..workers)
        .map(|worker_id| {
            tokio::spawn(worker_loop(
                worker_id,
                service.clone(),
                receiver.clone(),
                registry.clone(),
            ))
        })
        .collect();

    tracing::info!(queue = ANALYSIS_QUEUE, workers, capacity, "Analysis workers started");
    let queue = JobQueue {
        sender: Mutex::new(Some(sender)),
        registry,
    };
    (Arc::new(queue), WorkerPool { handles })
}

async fn worker_loop(
    worker_id: usize,
    service: Arc<AnalysisService>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<AnalysisJob>>>,
    registry: JobRegistry,
) {
    loop {
        // Hold the lock only while waiting, not while processing.
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };
        let Some(job) = job else { break };

        let id = job.analysis_id();
        registry.set(id, JobStatus::Running);
        tracing::info!(worker_id, analysis_id = %id, "Job started");

        match run_job(service.clone(), job).await {
            Ok(outcome) => {
                tracing::info!(worker_id, analysis_id = %outcome.id, "Job done");
                registry.set(id, JobStatus::Done);
            }
            Err(e) => {
                tracing::error!(worker_id, analysis_id = %id, error = %e, "Job failed");
                registry.set(id, JobStatus::Failed { error: e.to_string() });
            }
        }
    }
    tracing::debug!(worker_id, "Worker exiting");
}

/// Process one job on the blocking pool.
pub async fn run_job(
    service: Arc<AnalysisService>,
    job: AnalysisJob,
) -> Result<JobOutcome, AnalysisError> {
    let AnalysisJob { request, upload } = job;
    let outcome = tokio::task::spawn_blocking(move || service.analyze(&request, upload))
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))??;
    Ok(JobOutcome {
        id: outcome.request.id,
        status: "done",
    })
}
