//! Ptycho Reconstruct - Pattern matching and background reconstruction
//!
//! This crate matches diffraction patterns to scan positions, runs reconstructions
//! on a dedicated worker thread, and applies their results back to the product
//! repository on the controlling thread.

pub mod api;
pub mod builtin;
pub mod context;
pub mod matcher;
pub mod progress;
pub mod queue;
pub mod workflow;

pub use api::ReconstructorApi;
pub use context::{BatchAction, ReconstructorContext};
pub use matcher::DiffractionPatternPositionMatcher;
pub use progress::{ProgressObserver, ProgressSnapshot, ReconstructorProgressMonitor};
pub use queue::ReconstructionQueue;
pub use workflow::{ConcreteWorkflowApi, ConcreteWorkflowProductApi};
