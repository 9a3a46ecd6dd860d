//! Plugins command implementation

use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::Result;
use ptycho_core::config::CliConfigOverrides;
use ptycho_core::plugins::PluginChooser;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct PluginRow {
    #[tabled(rename = "Registry")]
    registry: String,
    #[tabled(rename = "Name")]
    display_name: String,
    #[tabled(rename = "Simple name")]
    simple_name: String,
    #[tabled(rename = "Selected")]
    selected: bool,
}

fn rows<T: ?Sized>(chooser: &PluginChooser<T>, selected: Option<&str>) -> Vec<PluginRow> {
    let selected = selected
        .and_then(|name| chooser.find(name))
        .or_else(|| chooser.current())
        .map(|plugin| plugin.simple_name.clone());

    chooser
        .iter()
        .map(|plugin| PluginRow {
            registry: chooser.registry_name().to_string(),
            display_name: plugin.display_name.clone(),
            simple_name: plugin.simple_name.clone(),
            selected: selected.as_deref() == Some(plugin.simple_name.as_str()),
        })
        .collect()
}

pub fn execute(config_path: Option<&Path>, output: &OutputWriter) -> Result<u8> {
    let config = load_config(config_path, CliConfigOverrides::default())?;
    let registry = super::plugin_registry();

    let mut table = rows(&registry.reconstructors, Some(&config.algorithm.value));
    table.extend(rows(&registry.file_based_workflows, Some(&config.strategy.value)));
    table.extend(rows(&registry.probe_builders, None));
    table.extend(rows(&registry.object_builders, None));

    output.table(table)?;
    Ok(0)
}
