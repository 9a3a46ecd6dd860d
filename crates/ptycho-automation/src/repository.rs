//! Per-file automation state

use parking_lot::Mutex;
use ptycho_core::models::AutomationDatasetState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct Datasets {
    order: Vec<PathBuf>,
    states: HashMap<PathBuf, AutomationDatasetState>,
}

/// Every file the pipeline has seen, in discovery order
#[derive(Default)]
pub struct AutomationDatasetRepository {
    datasets: Mutex<Datasets>,
    changed: AtomicBool,
}

impl AutomationDatasetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state for `path`
    ///
    /// Unknown paths are only accepted in the `Exists` state. Returns whether the
    /// state was recorded.
    pub fn put(&self, path: &Path, state: AutomationDatasetState) -> bool {
        let mut datasets = self.datasets.lock();

        match datasets.states.get_mut(path) {
            Some(current) => {
                if *current != state {
                    tracing::debug!("{}: {} -> {}", path.display(), current, state);
                    *current = state;
                }
            }
            None if state == AutomationDatasetState::Exists => {
                datasets.order.push(path.to_path_buf());
                datasets.states.insert(path.to_path_buf(), state);
            }
            None => {
                tracing::error!(
                    "Refusing to track {} in state {}: unknown datasets must start as {}",
                    path.display(),
                    state,
                    AutomationDatasetState::Exists
                );
                return false;
            }
        }

        self.changed.store(true, Ordering::Release);
        true
    }

    /// Display label of the dataset at `index`
    pub fn label(&self, index: usize) -> Option<String> {
        self.datasets
            .lock()
            .order
            .get(index)
            .map(|path| path.display().to_string())
    }

    pub fn state(&self, index: usize) -> Option<AutomationDatasetState> {
        let datasets = self.datasets.lock();
        let path = datasets.order.get(index)?;
        datasets.states.get(path).copied()
    }

    pub fn state_of(&self, path: &Path) -> Option<AutomationDatasetState> {
        self.datasets.lock().states.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.datasets.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels and states in discovery order
    pub fn snapshot(&self) -> Vec<(String, AutomationDatasetState)> {
        let datasets = self.datasets.lock();
        datasets
            .order
            .iter()
            .filter_map(|path| {
                datasets
                    .states
                    .get(path)
                    .map(|state| (path.display().to_string(), *state))
            })
            .collect()
    }

    pub fn clear(&self) {
        let mut datasets = self.datasets.lock();
        datasets.order.clear();
        datasets.states.clear();
        self.changed.store(true, Ordering::Release);
    }

    /// Whether anything changed since the previous call
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}
