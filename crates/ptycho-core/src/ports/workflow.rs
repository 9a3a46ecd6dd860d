use std::path::Path;

use crate::error::Result;
use crate::models::{
    PositionSequence, ProductHandle, ProductMetadata, ReconstructInput, TrainOutput,
};

/// Facade used by site workflows and batch mode to drive the pipeline
pub trait WorkflowApi: Send + Sync {
    /// Open diffraction patterns from file, replacing the assembled dataset
    fn open_patterns(&self, file_path: &Path) -> Result<()>;

    /// Import previously exported assembled patterns
    fn import_assembled_patterns(&self, file_path: &Path) -> Result<()>;

    /// Export the assembled patterns
    fn export_assembled_patterns(&self, file_path: &Path) -> Result<()>;

    /// Product API for an existing product
    fn get_product(&self, handle: ProductHandle) -> Result<Box<dyn WorkflowProductApi>>;

    /// Open a product from file into the repository
    fn open_product(&self, file_path: &Path) -> Result<Box<dyn WorkflowProductApi>>;

    /// Create an empty product
    fn create_product(&self, metadata: ProductMetadata) -> Result<Box<dyn WorkflowProductApi>>;

    /// Select the active reconstructor, returning its simple name
    fn set_reconstructor(&self, name: &str) -> Result<String>;

    /// Simple name of the active reconstructor
    fn reconstructor_name(&self) -> Result<String>;

    /// Train on `input_path` and save the model to `output_path` on success
    fn train_reconstructor(&self, input_path: &Path, output_path: &Path) -> Result<TrainOutput>;
}

/// Operations on a single product
pub trait WorkflowProductApi: Send {
    fn product_handle(&self) -> ProductHandle;

    /// Replace positions with those read from a scan file
    fn open_scan(&self, file_path: &Path) -> Result<()>;

    /// Replace positions with the given sequence
    fn build_scan(&self, positions: PositionSequence) -> Result<()>;

    fn open_probe(&self, file_path: &Path) -> Result<()>;

    /// Build the probe with the named builder, or the current one
    fn build_probe(&self, builder: Option<&str>) -> Result<()>;

    fn open_object(&self, file_path: &Path) -> Result<()>;

    /// Build the object with the named builder, or the current one
    fn build_object(&self, builder: Option<&str>) -> Result<()>;

    /// Matched input for this product
    fn get_reconstruct_input(&self) -> Result<ReconstructInput>;

    /// Reconstruct on this machine, returning the output product
    ///
    /// With `block` the call waits until the result has been applied.
    fn reconstruct_local(&self, block: bool) -> Result<Box<dyn WorkflowProductApi>>;

    /// Submit this product to the remote executor
    fn reconstruct_remote(&self) -> Result<()>;

    fn save_product(&self, file_path: &Path) -> Result<()>;

    fn export_training_data(&self, file_path: &Path) -> Result<()>;
}

/// Site-specific reaction to newly arrived data files
pub trait FileBasedWorkflow: Send + Sync {
    /// Whether subdirectories of the data directory are watched
    fn is_watch_recursive(&self) -> bool;

    /// Glob pattern selecting the files this workflow reacts to
    fn watch_file_pattern(&self) -> String;

    /// Process one settled file
    fn execute(&self, api: &dyn WorkflowApi, file_path: &Path) -> Result<()>;
}
