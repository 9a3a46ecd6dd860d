use parking_lot::RwLock;
use ptycho_core::config::{clamp_interval_s, AutomationSettings};
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::AutomationDatasetState;
use ptycho_core::plugins::PluginChooser;
use ptycho_core::ports::{FileBasedWorkflow, WorkflowApi};
use std::path::PathBuf;
use std::sync::Arc;

use crate::buffer::AutomationDatasetBuffer;
use crate::processor::AutomationDatasetProcessor;
use crate::repository::AutomationDatasetRepository;
use crate::watcher::DataDirectoryWatcher;
use crate::workflow::CurrentFileBasedWorkflow;
use crate::SharedSettings;

/// The assembled automation pipeline
pub struct AutomationCore {
    settings: SharedSettings,
    repository: Arc<AutomationDatasetRepository>,
    workflow: Arc<CurrentFileBasedWorkflow>,
    processor: Arc<AutomationDatasetProcessor>,
    buffer: Arc<AutomationDatasetBuffer>,
    watcher: DataDirectoryWatcher,
}

impl AutomationCore {
    pub fn new(
        settings: AutomationSettings,
        workflows: PluginChooser<dyn FileBasedWorkflow>,
        api: Arc<dyn WorkflowApi>,
    ) -> Self {
        let settings: SharedSettings = Arc::new(RwLock::new(settings));
        let repository = Arc::new(AutomationDatasetRepository::new());
        let workflow = Arc::new(CurrentFileBasedWorkflow::new(Arc::clone(&settings), workflows));
        let processor = Arc::new(AutomationDatasetProcessor::new(
            Arc::clone(&settings),
            Arc::clone(&repository),
            Arc::clone(&workflow) as Arc<dyn FileBasedWorkflow>,
            api,
        ));
        let buffer = Arc::new(AutomationDatasetBuffer::new(
            Arc::clone(&settings),
            Arc::clone(&repository),
            Arc::clone(&processor),
        ));
        let watcher =
            DataDirectoryWatcher::new(Arc::clone(&settings), Arc::clone(&workflow), Arc::clone(&buffer));

        Self {
            settings,
            repository,
            workflow,
            processor,
            buffer,
            watcher,
        }
    }

    /// Start the debounce buffer
    ///
    /// Watching and background processing are enabled separately.
    pub fn start(&self) -> Result<()> {
        self.buffer.start()
    }

    pub fn stop(&self) {
        self.processor.stop();
        self.watcher.stop();
        self.buffer.stop();
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> AutomationSettings {
        self.settings.read().clone()
    }

    pub fn repository(&self) -> &Arc<AutomationDatasetRepository> {
        &self.repository
    }

    pub fn strategies(&self) -> Vec<String> {
        self.workflow.available_workflows()
    }

    pub fn strategy(&self) -> Option<String> {
        self.workflow.workflow_name()
    }

    pub fn set_strategy(&self, name: &str) -> Result<String> {
        let simple_name = self.workflow.set_workflow(name)?;
        self.watcher.update_watch()?;
        Ok(simple_name)
    }

    pub fn set_data_directory(&self, directory: impl Into<PathBuf>) -> Result<()> {
        self.settings.write().data_directory = directory.into();
        self.watcher.update_watch()
    }

    pub fn set_processing_interval_s(&self, seconds: u64) {
        self.settings.write().processing_interval_s = clamp_interval_s(seconds);
    }

    pub fn set_watchdog_delay_s(&self, seconds: u64) {
        self.settings.write().watchdog_delay_s = clamp_interval_s(seconds);
    }

    pub fn set_use_polling_observer(&self, enable: bool) -> Result<()> {
        self.settings.write().use_polling_observer = enable;
        self.watcher.update_watch()
    }

    /// Feed files already in the data directory to the buffer, returning how many
    pub fn load_existing_datasets(&self) -> Result<usize> {
        let directory = self.settings.read().data_directory.clone();
        let file_pattern = self.workflow.watch_file_pattern();
        let root = PathBuf::from(glob::Pattern::escape(&directory.to_string_lossy()));
        let pattern = if self.workflow.is_watch_recursive() {
            root.join("**").join(&file_pattern)
        } else {
            root.join(&file_pattern)
        };
        let pattern = pattern.to_string_lossy().into_owned();

        let entries = glob::glob(&pattern).map_err(|e| PtychoError::InvalidWatchPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(err) => tracing::warn!("Skipping unreadable path: {}", err),
            }
        }
        paths.sort();

        for path in &paths {
            self.buffer.put(path);
        }

        tracing::info!("Loaded {} existing datasets from {}", paths.len(), directory.display());
        Ok(paths.len())
    }

    /// Forget every tracked, settling, and queued dataset
    pub fn clear_dataset_repository(&self) {
        self.buffer.clear();
        self.processor.clear();
        self.repository.clear();
    }

    pub fn is_watchdog_enabled(&self) -> bool {
        self.watcher.is_alive()
    }

    pub fn set_watchdog_enabled(&self, enable: bool) -> Result<()> {
        if enable {
            self.watcher.start()
        } else {
            self.watcher.stop();
            Ok(())
        }
    }

    pub fn is_processing_enabled(&self) -> bool {
        self.processor.is_alive()
    }

    pub fn set_processing_enabled(&self, enable: bool) -> Result<()> {
        if enable {
            self.processor.start()
        } else {
            self.processor.stop();
            Ok(())
        }
    }

    /// Whether the dataset list changed since the previous refresh
    pub fn refresh_dataset_repository(&self) -> bool {
        self.repository.take_changed()
    }

    /// Process one waiting dataset on the calling thread
    pub fn execute_waiting_tasks(&self) -> bool {
        self.processor.run_once()
    }

    pub fn datasets(&self) -> Vec<(String, AutomationDatasetState)> {
        self.repository.snapshot()
    }
}

impl Drop for AutomationCore {
    fn drop(&mut self) {
        self.stop();
    }
}
