use crate::error::Result;
use crate::models::ReconstructInput;

/// Port for handing reconstructions to an external compute facility
pub trait RemoteExecutor: Send + Sync {
    /// Submit a matched input under a human-readable label
    fn submit(&self, input: ReconstructInput, label: &str) -> Result<()>;
}
