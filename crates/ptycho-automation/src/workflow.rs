use ptycho_core::error::{PtychoError, Result};
use ptycho_core::plugins::{PluginChooser, SharedChooser};
use ptycho_core::ports::{FileBasedWorkflow, WorkflowApi};
use std::path::Path;
use std::sync::Arc;

use crate::SharedSettings;

/// The workflow named by the `strategy` setting
pub struct CurrentFileBasedWorkflow {
    settings: SharedSettings,
    workflows: SharedChooser<dyn FileBasedWorkflow>,
}

impl CurrentFileBasedWorkflow {
    pub fn new(settings: SharedSettings, workflows: PluginChooser<dyn FileBasedWorkflow>) -> Self {
        let workflows = workflows.into_shared();
        {
            let strategy = settings.read().strategy.clone();
            workflows.write().synchronize_with(&strategy);
        }

        Self {
            settings,
            workflows,
        }
    }

    pub fn available_workflows(&self) -> Vec<String> {
        self.workflows.read().simple_names()
    }

    /// Simple name of the current workflow
    pub fn workflow_name(&self) -> Option<String> {
        self.workflows.read().current().map(|p| p.simple_name.clone())
    }

    /// Select a workflow and store its simple name as the strategy
    pub fn set_workflow(&self, name: &str) -> Result<String> {
        let simple_name = {
            let mut workflows = self.workflows.write();
            workflows.set_current_plugin(name)?.simple_name.clone()
        };

        self.settings.write().strategy = simple_name.clone();
        tracing::info!("Automation strategy set to {}", simple_name);
        Ok(simple_name)
    }

    fn current(&self) -> Result<Arc<dyn FileBasedWorkflow>> {
        let workflows = self.workflows.read();
        Ok(Arc::clone(&workflows.require_current()?.strategy))
    }
}

impl FileBasedWorkflow for CurrentFileBasedWorkflow {
    fn is_watch_recursive(&self) -> bool {
        self.current().map(|w| w.is_watch_recursive()).unwrap_or(false)
    }

    fn watch_file_pattern(&self) -> String {
        self.current().map(|w| w.watch_file_pattern()).unwrap_or_default()
    }

    fn execute(&self, api: &dyn WorkflowApi, file_path: &Path) -> Result<()> {
        let workflow = self.current()?;
        workflow.execute(api, file_path).map_err(|err| match err {
            PtychoError::WorkflowFailed { .. } => err,
            other => PtychoError::WorkflowFailed {
                path: file_path.to_path_buf(),
                reason: other.to_string(),
            },
        })
    }
}
