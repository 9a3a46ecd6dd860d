//! Debounce buffer between the watcher and the processor
//!
//! Detector writers touch a file many times while writing it. Each event resets
//! the file's timer, and the file is only handed to the processor once it has been
//! quiet for the watchdog delay. Files are released oldest event first.

use parking_lot::{Condvar, Mutex, MutexGuard};
use ptycho_core::error::Result;
use ptycho_core::models::AutomationDatasetState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::processor::AutomationDatasetProcessor;
use crate::repository::AutomationDatasetRepository;
use crate::SharedSettings;

/// Longest single wait before the buffer thread rechecks its entries
const MAX_WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct BufferState {
    last_event: HashMap<PathBuf, Instant>,
    stop_requested: bool,
}

struct BufferShared {
    settings: SharedSettings,
    repository: Arc<AutomationDatasetRepository>,
    processor: Arc<AutomationDatasetProcessor>,
    state: Mutex<BufferState>,
    wake: Condvar,
}

impl BufferShared {
    fn hand_off(&self, path: PathBuf) {
        tracing::debug!("{} settled", path.display());
        self.repository.put(&path, AutomationDatasetState::Waiting);
        self.processor.put(&path);
    }

    fn run(&self) {
        let mut state = self.state.lock();

        while !state.stop_requested {
            let delay = self.settings.read().watchdog_delay();
            let oldest = state
                .last_event
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(path, at)| (path.clone(), *at));

            let wait = match oldest {
                Some((path, at)) => {
                    let quiet = at.elapsed();
                    if quiet >= delay {
                        state.last_event.remove(&path);
                        MutexGuard::unlocked(&mut state, || self.hand_off(path));
                        continue;
                    }
                    (delay - quiet).min(MAX_WAIT)
                }
                None => MAX_WAIT,
            };

            self.wake.wait_for(&mut state, wait);
        }
    }
}

/// Holds recently touched files until they stop changing
pub struct AutomationDatasetBuffer {
    shared: Arc<BufferShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AutomationDatasetBuffer {
    pub fn new(
        settings: SharedSettings,
        repository: Arc<AutomationDatasetRepository>,
        processor: Arc<AutomationDatasetProcessor>,
    ) -> Self {
        Self {
            shared: Arc::new(BufferShared {
                settings,
                repository,
                processor,
                state: Mutex::new(BufferState::default()),
                wake: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Record an event for `path`, restarting its quiet period
    pub fn put(&self, path: &Path) {
        if self.shared.repository.state_of(path).is_none() {
            self.shared.repository.put(path, AutomationDatasetState::Exists);
        }

        self.shared
            .state
            .lock()
            .last_event
            .insert(path.to_path_buf(), Instant::now());
        self.shared.wake.notify_one();
    }

    /// Number of files still settling
    pub fn len(&self) -> usize {
        self.shared.state.lock().last_event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every settling file
    pub fn clear(&self) {
        self.shared.state.lock().last_event.clear();
    }

    pub fn is_alive(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        self.shared.state.lock().stop_requested = false;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("automation-buffer".to_string())
            .spawn(move || shared.run())?;

        *worker = Some(handle);
        tracing::debug!("Automation buffer started");
        Ok(())
    }

    pub fn stop(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            self.shared.state.lock().stop_requested = true;
            self.shared.wake.notify_all();
            if handle.join().is_err() {
                tracing::error!("Automation buffer thread terminated abnormally");
            }
            tracing::debug!("Automation buffer stopped");
        }
    }
}

impl Drop for AutomationDatasetBuffer {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            self.shared.state.lock().stop_requested = true;
            self.shared.wake.notify_all();
            let _ = handle.join();
        }
    }
}
