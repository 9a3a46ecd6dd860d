//! Runs the current workflow on settled files, one at a time
//!
//! Jobs are taken either by the processor's own thread or by
//! [`AutomationDatasetProcessor::run_once`] on the caller's thread. Either way at
//! most one workflow executes at any moment, and consecutive jobs are separated
//! by the processing interval.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use ptycho_core::error::{panic_message, PtychoError, Result};
use ptycho_core::models::AutomationDatasetState;
use ptycho_core::ports::{FileBasedWorkflow, WorkflowApi};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::repository::AutomationDatasetRepository;
use crate::SharedSettings;

const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest sleep between checks for a stop request while the interval runs out
const STOP_CHECK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
struct Job {
    path: PathBuf,
    attempt: u32,
}

struct ScheduledRetry {
    due: Instant,
    job: Job,
}

struct ProcessorShared {
    settings: SharedSettings,
    repository: Arc<AutomationDatasetRepository>,
    workflow: Arc<dyn FileBasedWorkflow>,
    api: Arc<dyn WorkflowApi>,
    jobs_tx: Sender<Job>,
    jobs_rx: Receiver<Job>,
    retries: Mutex<Vec<ScheduledRetry>>,
    busy: Mutex<()>,
    last_finished: Mutex<Option<Instant>>,
    stop_requested: AtomicBool,
}

impl ProcessorShared {
    fn enqueue(&self, job: Job) {
        // Both channel ends live in self, so the send cannot fail.
        let _ = self.jobs_tx.send(job);
    }

    /// Move retries whose backoff has elapsed onto the job queue
    fn promote_due_retries(&self) {
        let now = Instant::now();
        let due: Vec<Job> = {
            let mut retries = self.retries.lock();
            let (due, pending): (Vec<_>, Vec<_>) =
                retries.drain(..).partition(|retry| retry.due <= now);
            *retries = pending;
            due.into_iter().map(|retry| retry.job).collect()
        };

        for job in due {
            tracing::debug!("Retrying {} (attempt {})", job.path.display(), job.attempt);
            self.enqueue(job);
        }
    }

    fn interval_remaining(&self) -> Duration {
        let interval = self.settings.read().processing_interval();
        match *self.last_finished.lock() {
            Some(finished) => interval.saturating_sub(finished.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Sleep until the processing interval has elapsed
    ///
    /// Returns false as soon as a stop is requested.
    fn wait_out_interval(&self) -> bool {
        loop {
            if self.is_stopping() {
                return false;
            }

            let remaining = self.interval_remaining();
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(STOP_CHECK));
        }
    }

    /// Execute one job; the caller holds `busy`
    fn process(&self, job: Job) {
        let path = job.path.clone();
        self.repository.put(&path, AutomationDatasetState::Processing);
        tracing::info!("Processing {}", path.display());

        let tic = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.workflow.execute(self.api.as_ref(), &path)
        }));

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => Some(format!("workflow panicked: {}", panic_message(payload.as_ref()))),
        };

        match failure {
            None => {
                self.repository.put(&path, AutomationDatasetState::Complete);
                tracing::info!(
                    "Processed {} in {:.4} seconds.",
                    path.display(),
                    tic.elapsed().as_secs_f64()
                );
            }
            Some(reason) => self.handle_failure(job, reason),
        }

        *self.last_finished.lock() = Some(Instant::now());
    }

    fn handle_failure(&self, job: Job, reason: String) {
        let policy = self.settings.read().failure_policy;

        match policy.backoff_for(job.attempt) {
            Some(backoff) => {
                tracing::warn!(
                    "Attempt {} failed for {}: {}. Retrying in {:.1} seconds",
                    job.attempt,
                    job.path.display(),
                    reason,
                    backoff.as_secs_f64()
                );
                self.repository.put(&job.path, AutomationDatasetState::Waiting);
                self.retries.lock().push(ScheduledRetry {
                    due: Instant::now() + backoff,
                    job: Job {
                        path: job.path,
                        attempt: job.attempt + 1,
                    },
                });
            }
            None => {
                self.repository.put(&job.path, AutomationDatasetState::Failed);
                let err = PtychoError::WorkflowFailed {
                    path: job.path,
                    reason,
                };
                tracing::error!("{}", err);
            }
        }
    }
}

/// Single-worker executor for file-based workflows
pub struct AutomationDatasetProcessor {
    shared: Arc<ProcessorShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AutomationDatasetProcessor {
    pub fn new(
        settings: SharedSettings,
        repository: Arc<AutomationDatasetRepository>,
        workflow: Arc<dyn FileBasedWorkflow>,
        api: Arc<dyn WorkflowApi>,
    ) -> Self {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded();

        Self {
            shared: Arc::new(ProcessorShared {
                settings,
                repository,
                workflow,
                api,
                jobs_tx,
                jobs_rx,
                retries: Mutex::new(Vec::new()),
                busy: Mutex::new(()),
                last_finished: Mutex::new(None),
                stop_requested: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Queue a settled file for processing
    pub fn put(&self, path: &Path) {
        self.shared.enqueue(Job {
            path: path.to_path_buf(),
            attempt: 1,
        });
    }

    /// Jobs queued or waiting out a retry backoff
    pub fn pending(&self) -> usize {
        self.shared.jobs_rx.len() + self.shared.retries.lock().len()
    }

    /// Drop every queued job and scheduled retry
    pub fn clear(&self) {
        while self.shared.jobs_rx.try_recv().is_ok() {}
        self.shared.retries.lock().clear();
    }

    /// Process at most one waiting job on the calling thread
    ///
    /// Returns false without waiting if another job is executing, the processing
    /// interval has not elapsed, or nothing is queued.
    pub fn run_once(&self) -> bool {
        let Some(_busy) = self.shared.busy.try_lock() else {
            return false;
        };

        self.shared.promote_due_retries();
        if !self.shared.interval_remaining().is_zero() {
            return false;
        }

        match self.shared.jobs_rx.try_recv() {
            Ok(job) => {
                self.shared.process(job);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        tracing::info!("Starting automation processor...");
        self.shared.stop_requested.store(false, Ordering::Release);
        let shared = Arc::clone(&self.shared);

        let handle = thread::Builder::new()
            .name("automation-processor".to_string())
            .spawn(move || run_worker(shared))?;

        *worker = Some(handle);
        Ok(())
    }

    /// Stop after the executing job, if any, finishes
    ///
    /// Jobs still queued or waiting out the processing interval are kept for a
    /// later [`start`](Self::start) or [`run_once`](Self::run_once).
    pub fn stop(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            tracing::info!("Stopping automation processor...");
            self.shared.stop_requested.store(true, Ordering::Release);
            if handle.join().is_err() {
                tracing::error!("Automation processor thread terminated abnormally");
            }
            tracing::info!("Automation processor stopped.");
        }
    }
}

impl Drop for AutomationDatasetProcessor {
    fn drop(&mut self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        if let Some(handle) = self.worker.get_mut().take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(shared: Arc<ProcessorShared>) {
    while !shared.is_stopping() {
        shared.promote_due_retries();
        if !shared.wait_out_interval() {
            break;
        }

        let job = match shared.jobs_rx.recv_timeout(POLL_TIMEOUT) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let _busy = shared.busy.lock();
        // A run_once on another thread may have finished a job in the meantime.
        if !shared.wait_out_interval() {
            shared.enqueue(job);
            break;
        }
        shared.process(job);
    }
}
