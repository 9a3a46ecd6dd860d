use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::ports::FileBasedWorkflow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::AutomationDatasetBuffer;
use crate::workflow::CurrentFileBasedWorkflow;
use crate::SharedSettings;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Watch backend; dropping it ends the subscription
enum WatchBackend {
    Native(RecommendedWatcher),
    Polling(PollWatcher),
}

impl WatchBackend {
    fn kind(&self) -> &'static str {
        match self {
            WatchBackend::Native(_) => "native",
            WatchBackend::Polling(_) => "polling",
        }
    }
}

/// Forwards matching files in the data directory to the buffer
pub struct DataDirectoryWatcher {
    settings: SharedSettings,
    workflow: Arc<CurrentFileBasedWorkflow>,
    buffer: Arc<AutomationDatasetBuffer>,
    backend: Mutex<Option<WatchBackend>>,
}

impl DataDirectoryWatcher {
    pub fn new(
        settings: SharedSettings,
        workflow: Arc<CurrentFileBasedWorkflow>,
        buffer: Arc<AutomationDatasetBuffer>,
    ) -> Self {
        Self {
            settings,
            workflow,
            buffer,
            backend: Mutex::new(None),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.backend.lock().is_some()
    }

    /// Subscribe to the data directory; does nothing if already watching
    pub fn start(&self) -> Result<()> {
        let mut backend = self.backend.lock();
        if backend.is_some() {
            return Ok(());
        }

        let (directory, use_polling) = {
            let settings = self.settings.read();
            (settings.data_directory.clone(), settings.use_polling_observer)
        };

        if !directory.is_dir() {
            return Err(PtychoError::Watcher(format!(
                "data directory {} does not exist",
                directory.display()
            )));
        }

        let file_pattern = self.workflow.watch_file_pattern();
        let pattern = glob::Pattern::new(&file_pattern).map_err(|e| {
            PtychoError::InvalidWatchPattern {
                pattern: file_pattern.clone(),
                reason: e.to_string(),
            }
        })?;

        let mode = if self.workflow.is_watch_recursive() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let buffer = Arc::clone(&self.buffer);
        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => forward_event(&event, &pattern, &buffer),
            Err(err) => tracing::warn!("Watch error: {}", err),
        };

        let mut watcher = if use_polling {
            let config = Config::default().with_poll_interval(POLL_INTERVAL);
            WatchBackend::Polling(PollWatcher::new(handler, config).map_err(watch_error)?)
        } else {
            WatchBackend::Native(
                RecommendedWatcher::new(handler, Config::default()).map_err(watch_error)?,
            )
        };

        match &mut watcher {
            WatchBackend::Native(w) => w.watch(&directory, mode),
            WatchBackend::Polling(w) => w.watch(&directory, mode),
        }
        .map_err(watch_error)?;

        tracing::info!(
            "Watching {} for \"{}\" ({} observer)",
            directory.display(),
            file_pattern,
            watcher.kind()
        );
        *backend = Some(watcher);
        Ok(())
    }

    pub fn stop(&self) {
        if self.backend.lock().take().is_some() {
            tracing::info!("Stopped watching data directory");
        }
    }

    /// Resubscribe after the directory, observer type, or workflow changed
    pub fn update_watch(&self) -> Result<()> {
        if self.is_alive() {
            self.stop();
            self.start()?;
        }
        Ok(())
    }
}

fn forward_event(event: &Event, pattern: &glob::Pattern, buffer: &AutomationDatasetBuffer) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }

    for path in &event.paths {
        if is_candidate(path, pattern) {
            tracing::trace!("{:?} {}", event.kind, path.display());
            buffer.put(path);
        }
    }
}

fn is_candidate(path: &Path, pattern: &glob::Pattern) -> bool {
    !path.is_dir()
        && path
            .file_name()
            .is_some_and(|name| pattern.matches_path(Path::new(name)))
}

fn watch_error(err: notify::Error) -> PtychoError {
    PtychoError::Watcher(err.to_string())
}
