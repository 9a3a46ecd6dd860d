//! Port trait definitions
//!
//! These traits define the seams where reconstruction backends, site workflows,
//! and data sources plug into the pipeline.

pub mod builder;
pub mod patterns;
pub mod reconstructor;
pub mod remote;
pub mod workflow;

pub use builder::ArrayBuilder;
pub use patterns::PatternSource;
pub use reconstructor::{ReconstructProgress, Reconstructor, TrainableReconstructor};
pub use remote::RemoteExecutor;
pub use workflow::{FileBasedWorkflow, WorkflowApi, WorkflowProductApi};
