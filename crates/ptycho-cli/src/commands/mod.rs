//! Command implementations

mod batch;
mod config;
mod match_cmd;
mod plugins;
mod reconstruct;
mod train;
mod watch;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use ptycho_automation::workflows::register_workflows;
use ptycho_core::config::LayeredConfig;
use ptycho_core::plugins::{PluginChooser, PluginRegistry};
use ptycho_core::ports::FileBasedWorkflow;
use ptycho_reconstruct::builtin::register_builtins;
use ptycho_reconstruct::ReconstructorContext;

/// Execute a CLI command, returning the process exit code
pub fn execute(cli: Cli) -> Result<u8> {
    let output = OutputWriter::new(cli.json);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Reconstruct(args) => reconstruct::execute(args, config_path, &output),
        Commands::Train(args) => train::execute(args, config_path, &output),
        Commands::Batch(args) => batch::execute(args, config_path, &output),
        Commands::Match(args) => match_cmd::execute(args, config_path, &output),
        Commands::Watch(args) => watch::execute(args, config_path, &output),
        Commands::Plugins => plugins::execute(config_path, &output),
        Commands::Config => config::execute(config_path, &output),
    }
}

/// Registry with every built-in plugin
fn plugin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry);
    register_workflows(&mut registry);
    registry
}

/// Reconstructor context configured from `config`, plus the workflow chooser
///
/// An explicitly requested algorithm must exist; the configured one only
/// warns when unknown.
fn reconstructor_context(
    config: &LayeredConfig,
    algorithm: Option<&str>,
) -> Result<(ReconstructorContext, PluginChooser<dyn FileBasedWorkflow>)> {
    let registry = plugin_registry();
    let context = ReconstructorContext::new(
        registry.reconstructors,
        registry.probe_builders,
        registry.object_builders,
        &config.reconstructor_settings(),
    );

    if let Some(name) = algorithm {
        context
            .reconstructor_api()
            .set_reconstructor(name)
            .context("Failed to select reconstructor")?;
    }

    Ok((context, registry.file_based_workflows))
}

/// Process exit status for a backend result code; -1 becomes 255
fn exit_code(result: i32) -> u8 {
    result as u8
}
