//! Background reconstruction queue
//!
//! Reconstructions run one at a time on a dedicated worker thread. Finished
//! results are staged on an output channel and only written back to the product
//! repository when the controlling thread calls [`ReconstructionQueue::process_results`].
//!
//! A task that fails or panics is logged and dropped. Its product is left as it
//! was at submission time.
//!
//! Backends report progress into the queue's [`ReconstructorProgressMonitor`].

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use ptycho_core::error::{panic_message, Result};
use ptycho_core::models::{ProductHandle, ReconstructOutput, ScanIndexFilter};
use ptycho_core::ports::{ReconstructProgress, Reconstructor};
use ptycho_store::ProductRepository;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::matcher::DiffractionPatternPositionMatcher;
use crate::progress::ReconstructorProgressMonitor;

/// Receive timeout; bounds how long shutdown waits for an idle worker
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// How often a blocking result drain rechecks whether work is still pending
const RESULT_POLL: Duration = Duration::from_millis(100);

/// Reconstruction waiting for the worker
struct ExecuteReconstructorTask {
    reconstructor: Arc<dyn Reconstructor>,
    product: ProductHandle,
    index_filter: ScanIndexFilter,
}

impl ExecuteReconstructorTask {
    fn execute(
        self,
        matcher: &DiffractionPatternPositionMatcher,
        progress: &ReconstructorProgressMonitor,
    ) -> Result<UpdateProductTask> {
        let input =
            matcher.match_diffraction_patterns_with_positions(self.product, self.index_filter)?;

        let tic = Instant::now();
        let output = self.reconstructor.reconstruct(input, progress)?;
        progress.log_message(&format!(
            "Reconstruction time {:.4} seconds. (code={})",
            tic.elapsed().as_secs_f64(),
            output.result
        ));

        Ok(UpdateProductTask {
            product: self.product,
            output,
        })
    }
}

/// Finished reconstruction waiting to be applied
struct UpdateProductTask {
    product: ProductHandle,
    output: ReconstructOutput,
}

impl UpdateProductTask {
    /// Assign the result while keeping the product's user-assigned name
    fn execute(self, products: &ProductRepository) -> Result<()> {
        let name = products.name(self.product)?;
        products.assign(self.product, self.output.product)?;
        products.set_name(self.product, &name)
    }
}

/// Count of submitted tasks that have not finished executing
#[derive(Default)]
struct TaskTracker {
    unfinished: Mutex<usize>,
    idle: Condvar,
}

impl TaskTracker {
    fn add(&self) {
        *self.unfinished.lock() += 1;
    }

    fn task_done(&self) {
        let mut unfinished = self.unfinished.lock();
        *unfinished = unfinished.saturating_sub(1);
        if *unfinished == 0 {
            self.idle.notify_all();
        }
    }

    fn unfinished(&self) -> usize {
        *self.unfinished.lock()
    }

    fn wait_idle(&self) {
        let mut unfinished = self.unfinished.lock();
        while *unfinished > 0 {
            self.idle.wait(&mut unfinished);
        }
    }
}

/// Single-worker reconstruction queue
pub struct ReconstructionQueue {
    products: Arc<ProductRepository>,
    matcher: Arc<DiffractionPatternPositionMatcher>,
    input_tx: Sender<ExecuteReconstructorTask>,
    input_rx: Receiver<ExecuteReconstructorTask>,
    output_tx: Sender<UpdateProductTask>,
    output_rx: Receiver<UpdateProductTask>,
    tracker: Arc<TaskTracker>,
    progress: Arc<ReconstructorProgressMonitor>,
    stop_requested: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    applying: Mutex<()>,
}

impl ReconstructionQueue {
    pub fn new(
        products: Arc<ProductRepository>,
        matcher: Arc<DiffractionPatternPositionMatcher>,
    ) -> Self {
        let (input_tx, input_rx) = crossbeam_channel::unbounded();
        let (output_tx, output_rx) = crossbeam_channel::unbounded();

        Self {
            products,
            matcher,
            input_tx,
            input_rx,
            output_tx,
            output_rx,
            tracker: Arc::new(TaskTracker::default()),
            progress: Arc::new(ReconstructorProgressMonitor::new()),
            stop_requested: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            applying: Mutex::new(()),
        }
    }

    /// Number of tasks waiting for the worker
    pub fn len(&self) -> usize {
        self.input_rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_rx.is_empty()
    }

    /// True while any task is queued or running
    pub fn is_reconstructing(&self) -> bool {
        self.tracker.unfinished() > 0
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn progress(&self) -> &Arc<ReconstructorProgressMonitor> {
        &self.progress
    }

    /// Spawn the worker thread; does nothing if it is already running
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        tracing::info!("Starting reconstructor...");
        self.stop_requested.store(false, Ordering::Release);

        let input_rx = self.input_rx.clone();
        let output_tx = self.output_tx.clone();
        let worker_state = WorkerState {
            matcher: Arc::clone(&self.matcher),
            tracker: Arc::clone(&self.tracker),
            progress: Arc::clone(&self.progress),
            stop_requested: Arc::clone(&self.stop_requested),
        };

        let handle = thread::Builder::new()
            .name("reconstructor".to_string())
            .spawn(move || run_worker(input_rx, output_tx, worker_state))?;

        *worker = Some(handle);
        tracing::info!("Reconstructor started.");
        Ok(())
    }

    /// Enqueue a reconstruction of `product`; never blocks
    pub fn put(
        &self,
        reconstructor: Arc<dyn Reconstructor>,
        product: ProductHandle,
        index_filter: ScanIndexFilter,
    ) {
        self.tracker.add();
        let task = ExecuteReconstructorTask {
            reconstructor,
            product,
            index_filter,
        };

        // Both channel ends live in self, so the send cannot fail.
        if self.input_tx.send(task).is_err() {
            self.tracker.task_done();
        }
    }

    /// Apply finished results to the product repository, returning how many were applied
    ///
    /// With `block`, waits until a result arrives or until no work is left that
    /// could produce one, then drains whatever else is ready. A result received by
    /// a concurrent caller is fully applied before this call returns.
    pub fn process_results(&self, block: bool) -> usize {
        let mut applied = 0;

        if block {
            loop {
                let _applying = self.applying.lock();
                match self.output_rx.recv_timeout(RESULT_POLL) {
                    Ok(task) => {
                        self.apply(task);
                        applied += 1;
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        let pending = self.is_reconstructing() && self.is_running();
                        if !pending && self.output_rx.is_empty() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }

        let _applying = self.applying.lock();
        while let Ok(task) = self.output_rx.try_recv() {
            self.apply(task);
            applied += 1;
        }

        applied
    }

    fn apply(&self, task: UpdateProductTask) {
        let product = task.product;
        if let Err(err) = task.execute(&self.products) {
            tracing::warn!("Discarding reconstruction result for product {}: {}", product, err);
        }
    }

    /// Finish queued work, stop the worker, and apply remaining results
    pub fn stop(&self) {
        if self.is_running() {
            tracing::info!("Finishing reconstructions...");
            self.tracker.wait_idle();
        }

        tracing::info!("Stopping reconstructor...");
        self.stop_requested.store(true, Ordering::Release);

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Reconstructor thread terminated abnormally");
            }
        }

        self.process_results(false);
        tracing::info!("Reconstructor stopped.");
    }
}

impl Drop for ReconstructionQueue {
    fn drop(&mut self) {
        self.stop_requested.store(true, Ordering::Release);
        if let Some(handle) = self.worker.get_mut().take() {
            let _ = handle.join();
        }
    }
}

/// What the worker thread shares with the queue
struct WorkerState {
    matcher: Arc<DiffractionPatternPositionMatcher>,
    tracker: Arc<TaskTracker>,
    progress: Arc<ReconstructorProgressMonitor>,
    stop_requested: Arc<AtomicBool>,
}

fn run_worker(
    input_rx: Receiver<ExecuteReconstructorTask>,
    output_tx: Sender<UpdateProductTask>,
    state: WorkerState,
) {
    while !state.stop_requested.load(Ordering::Acquire) {
        let task = match input_rx.recv_timeout(POLL_TIMEOUT) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let product = task.product;
        state.progress.begin();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            task.execute(&state.matcher, &state.progress)
        }));
        state.progress.finish();

        match outcome {
            Ok(Ok(update)) => {
                if output_tx.send(update).is_err() {
                    tracing::warn!("Result for product {} dropped: queue shut down", product);
                }
            }
            Ok(Err(err)) => tracing::error!("Reconstructor error for product {}: {}", product, err),
            Err(payload) => tracing::error!(
                "Reconstructor panicked for product {}: {}",
                product,
                panic_message(payload.as_ref())
            ),
        }

        // Only after the result is staged, so an idle queue never hides one.
        state.tracker.task_done();
    }
}
