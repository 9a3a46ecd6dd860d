//! Progress of the reconstruction running on the worker thread
//!
//! Backends report into a [`ReconstructorProgressMonitor`] through the
//! [`ReconstructProgress`] port. Changes to progress are coalesced and handed to
//! observers when the controlling thread calls
//! [`ReconstructorProgressMonitor::notify_observers_if_changed`]; a reconstruction
//! starting or finishing is announced right away.

use parking_lot::{Mutex, RwLock};
use ptycho_core::ports::ReconstructProgress;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Messages kept in the log; older ones are dropped first
const MESSAGE_LOG_CAPACITY: usize = 1000;

/// Point-in-time view of the monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub is_reconstructing: bool,
    pub progress: u64,
    pub progress_goal: u64,
}

/// Port for subscribers to reconstruction progress
pub trait ProgressObserver: Send + Sync {
    fn progress_changed(&self, snapshot: &ProgressSnapshot);
}

#[derive(Default)]
struct ProgressState {
    snapshot: ProgressSnapshot,
    messages: VecDeque<String>,
}

#[derive(Default)]
pub struct ReconstructorProgressMonitor {
    state: Mutex<ProgressState>,
    changed: AtomicBool,
    observers: RwLock<Vec<Arc<dyn ProgressObserver>>>,
    /// Held while delivering, so observers see snapshots in the order taken
    delivering: Mutex<()>,
}

impl ReconstructorProgressMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&self, observer: Arc<dyn ProgressObserver>) {
        self.observers.write().push(observer);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().snapshot
    }

    pub fn is_reconstructing(&self) -> bool {
        self.snapshot().is_reconstructing
    }

    pub fn progress(&self) -> u64 {
        self.snapshot().progress
    }

    pub fn progress_goal(&self) -> u64 {
        self.snapshot().progress_goal
    }

    /// Logged messages, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.state.lock().messages.iter().cloned().collect()
    }

    /// Deliver the current snapshot if progress moved since the last delivery
    ///
    /// Call from the controlling thread. Returns whether observers were notified.
    pub fn notify_observers_if_changed(&self) -> bool {
        if !self.changed.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.notify_observers();
        true
    }

    /// Mark a reconstruction as started; progress restarts from zero
    pub(crate) fn begin(&self) {
        {
            let mut state = self.state.lock();
            state.snapshot = ProgressSnapshot {
                is_reconstructing: true,
                progress: 0,
                progress_goal: 0,
            };
        }
        self.changed.store(false, Ordering::Release);
        self.notify_observers();
    }

    pub(crate) fn finish(&self) {
        self.state.lock().snapshot.is_reconstructing = false;
        self.changed.store(false, Ordering::Release);
        self.notify_observers();
    }

    fn notify_observers(&self) {
        let _delivering = self.delivering.lock();
        let snapshot = self.snapshot();
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.progress_changed(&snapshot);
        }
    }

    fn update(&self, apply: impl FnOnce(&mut ProgressSnapshot) -> bool) {
        let moved = apply(&mut self.state.lock().snapshot);
        if moved {
            self.changed.store(true, Ordering::Release);
        }
    }
}

impl ReconstructProgress for ReconstructorProgressMonitor {
    fn set_progress_goal(&self, goal: u64) {
        self.update(|snapshot| {
            let moved = snapshot.progress_goal != goal;
            snapshot.progress_goal = goal;
            moved
        });
    }

    fn set_progress(&self, progress: u64) {
        self.update(|snapshot| {
            let moved = snapshot.progress != progress;
            snapshot.progress = progress;
            moved
        });
    }

    fn log_message(&self, message: &str) {
        tracing::info!("{}", message);

        let mut state = self.state.lock();
        if state.messages.len() == MESSAGE_LOG_CAPACITY {
            state.messages.pop_front();
        }
        state.messages.push_back(message.to_string());
    }
}
