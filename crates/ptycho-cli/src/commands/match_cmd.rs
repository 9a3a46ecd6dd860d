//! Match command implementation

use crate::cli::MatchArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use ptycho_core::config::CliConfigOverrides;
use ptycho_core::ports::WorkflowApi;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct MatchRow {
    #[tabled(rename = "Index")]
    index: i64,
    #[tabled(rename = "X (m)")]
    position_x_m: f64,
    #[tabled(rename = "Y (m)")]
    position_y_m: f64,
}

pub fn execute(args: MatchArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<u8> {
    let config = load_config(config_path, CliConfigOverrides::default())?;
    let (context, _) = super::reconstructor_context(&config, None)?;

    let api = context.workflow_api();
    api.open_patterns(&args.patterns)
        .with_context(|| format!("Failed to open patterns {}", args.patterns.display()))?;
    let product = api
        .open_product(&args.input)
        .with_context(|| format!("Failed to open product {}", args.input.display()))?;

    let matched = context
        .reconstructor_api()
        .get_reconstruct_input(product.product_handle(), args.filter)?;
    let (count, height, width) = matched.patterns.dim();

    output.section("Match");
    output.kv("Filter", args.filter);
    output.kv("Matched", count);
    output.kv("Pattern shape", format!("{}x{}", height, width));

    let rows: Vec<MatchRow> = matched
        .product
        .positions
        .iter()
        .map(|point| MatchRow {
            index: point.index,
            position_x_m: point.position_x_m,
            position_y_m: point.position_y_m,
        })
        .collect();
    output.table(rows)?;

    Ok(0)
}
