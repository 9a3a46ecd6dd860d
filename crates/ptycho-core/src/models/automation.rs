use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a data file discovered by the automation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomationDatasetState {
    /// Seen on disk, still settling
    Exists,
    /// Settled and queued for processing
    Waiting,
    Processing,
    Complete,
    /// Workflow failed and will not be retried
    Failed,
}

impl AutomationDatasetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AutomationDatasetState::Complete | AutomationDatasetState::Failed)
    }
}

impl fmt::Display for AutomationDatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AutomationDatasetState::Exists => "Exists",
            AutomationDatasetState::Waiting => "Waiting",
            AutomationDatasetState::Processing => "Processing",
            AutomationDatasetState::Complete => "Complete",
            AutomationDatasetState::Failed => "Failed",
        };
        write!(f, "{}", label)
    }
}
