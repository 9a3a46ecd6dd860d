use std::path::Path;

use crate::error::Result;
use crate::models::{ReconstructInput, ReconstructOutput, TrainOutput};

/// Sink for progress reported by a running reconstruction
///
/// Progress is counted in backend-defined steps, for example iterations.
pub trait ReconstructProgress: Send + Sync {
    fn set_progress_goal(&self, goal: u64);

    fn set_progress(&self, progress: u64);

    /// Append a line to the reconstruction's message log
    fn log_message(&self, message: &str);
}

/// Port for reconstruction backends
///
/// Implementations are synchronous and may run for hours. The pipeline only
/// ever calls them from its worker thread.
pub trait Reconstructor: Send + Sync {
    /// Reconstruct probe and object from matched patterns and positions
    fn reconstruct(
        &self,
        input: ReconstructInput,
        progress: &dyn ReconstructProgress,
    ) -> Result<ReconstructOutput>;

    /// Training capability, if this backend supports it
    fn as_trainable(&self) -> Option<&dyn TrainableReconstructor> {
        None
    }
}

/// Optional capability for backends that learn from data
pub trait TrainableReconstructor: Reconstructor {
    /// Add one matched dataset to the training set
    fn ingest_training_data(&self, input: &ReconstructInput) -> Result<()>;

    /// Train on the data found at `data_path`
    fn train(&self, data_path: &Path) -> Result<TrainOutput>;

    /// Load model weights
    fn open_model(&self, file_path: &Path) -> Result<()>;

    /// Store model weights
    fn save_model(&self, file_path: &Path) -> Result<()>;

    /// Load a previously saved training set
    fn open_training_data(&self, file_path: &Path) -> Result<()>;

    /// Store the ingested training set
    fn save_training_data(&self, file_path: &Path) -> Result<()>;

    /// Discard the ingested training set
    fn clear_training_data(&self) -> Result<()>;

    /// Write one matched dataset in the backend's training format
    fn export_training_data(&self, file_path: &Path, input: &ReconstructInput) -> Result<()>;
}
