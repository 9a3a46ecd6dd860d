//! Plugins shipped with the pipeline
//!
//! Numerical backends are supplied by external libraries. These built-ins keep
//! the pipeline usable on its own: a pass-through reconstructor for exercising
//! workflows end to end, uniform initial estimates, and a directory-based remote
//! executor.

pub mod builders;
pub mod outbox;
pub mod reconstructors;

use ptycho_core::plugins::{PluginChooser, PluginRegistry};
use ptycho_core::ports::Reconstructor;
use std::sync::Arc;

pub use builders::UniformArrayBuilder;
pub use outbox::OutboxRemoteExecutor;
pub use reconstructors::{NullReconstructor, PassthroughReconstructor};

/// Register built-in reconstructors and builders
pub fn register_builtins(registry: &mut PluginRegistry) {
    registry
        .reconstructors
        .register_plugin(Arc::new(PassthroughReconstructor), "Passthrough", None);
    registry
        .probe_builders
        .register_plugin(Arc::new(UniformArrayBuilder::new(1)), "Uniform", None);
    registry
        .object_builders
        .register_plugin(Arc::new(UniformArrayBuilder::new(1)), "Uniform", None);
}

/// Make sure at least one reconstructor can be selected
pub fn ensure_reconstructor(chooser: &mut PluginChooser<dyn Reconstructor>) {
    if chooser.is_empty() {
        tracing::warn!("No reconstructors registered; falling back to \"None\"");
        chooser.register_plugin(Arc::new(NullReconstructor), "None", None);
    }
}
