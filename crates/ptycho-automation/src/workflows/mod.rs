//! Built-in file-based workflows

mod product_file;
mod scan_correlation;

use ptycho_core::plugins::PluginRegistry;
use std::sync::Arc;

pub use product_file::ProductFileWorkflow;
pub use scan_correlation::{scan_number, ScanCorrelationWorkflow};

pub fn register_workflows(registry: &mut PluginRegistry) {
    registry
        .file_based_workflows
        .register_plugin(Arc::new(ProductFileWorkflow), "Product File", None);
    registry
        .file_based_workflows
        .register_plugin(Arc::new(ScanCorrelationWorkflow), "Scan Correlation", None);
}
