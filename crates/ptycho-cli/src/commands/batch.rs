//! Batch command implementation

use crate::cli::BatchArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use anyhow::Result;
use ptycho_core::config::CliConfigOverrides;
use std::path::Path;

pub fn execute(args: BatchArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<u8> {
    let config = load_config(
        config_path,
        CliConfigOverrides {
            algorithm: args.algorithm.clone(),
            ..Default::default()
        },
    )?;
    let (context, _) = super::reconstructor_context(&config, args.algorithm.as_deref())?;

    let result = context.batch_mode_execute(
        &args.action,
        &args.input,
        &args.output,
        args.patterns.as_deref(),
    );
    context.stop();
    let code = result?;

    if code == 0 {
        output.success(format!("{} finished: {}", args.action, args.output.display()));
    } else {
        output.warning(format!("{} returned {}", args.action, code));
    }
    output.result(serde_json::json!({
        "action": args.action,
        "result": code,
    }))?;

    Ok(super::exit_code(code))
}
