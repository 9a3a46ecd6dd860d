//! Ptycho Automation - Reacting to newly arrived data files
//!
//! Files appearing in the data directory flow through four stages:
//! 1. The [`DataDirectoryWatcher`] forwards matching filesystem events
//! 2. The [`AutomationDatasetBuffer`] waits until a file has stopped changing
//! 3. The [`AutomationDatasetProcessor`] runs the current workflow on it
//! 4. The [`AutomationDatasetRepository`] tracks each file's progress
//!
//! [`AutomationCore`] wires the stages together.

pub mod buffer;
pub mod pipeline;
pub mod processor;
pub mod repository;
pub mod watcher;
pub mod workflow;
pub mod workflows;

use parking_lot::RwLock;
use ptycho_core::config::AutomationSettings;
use std::sync::Arc;

pub use crate::buffer::AutomationDatasetBuffer;
pub use crate::pipeline::AutomationCore;
pub use crate::processor::AutomationDatasetProcessor;
pub use crate::repository::AutomationDatasetRepository;
pub use crate::watcher::DataDirectoryWatcher;
pub use crate::workflow::CurrentFileBasedWorkflow;

/// Automation settings shared by every stage; changes apply on next use
pub type SharedSettings = Arc<RwLock<AutomationSettings>>;
