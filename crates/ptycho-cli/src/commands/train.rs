//! Train command implementation

use crate::cli::TrainArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use crate::progress;
use anyhow::{Context, Result};
use ptycho_core::config::CliConfigOverrides;
use ptycho_core::ports::WorkflowApi;
use std::path::Path;

pub fn execute(args: TrainArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<u8> {
    let config = load_config(
        config_path,
        CliConfigOverrides {
            algorithm: args.algorithm.clone(),
            ..Default::default()
        },
    )?;
    let (context, _) = super::reconstructor_context(&config, args.algorithm.as_deref())?;
    let api = context.workflow_api();

    let spinner = progress::create_spinner(
        &format!("Training {}...", api.reconstructor_name()?),
        output.is_json(),
    );
    let trained = api
        .train_reconstructor(&args.input, &args.output)
        .with_context(|| format!("Failed to train on {}", args.input.display()));

    let trained = match trained {
        Ok(trained) if trained.result == 0 => {
            progress::finish_success(&spinner, "Training finished");
            trained
        }
        Ok(trained) => {
            progress::finish_error(&spinner, &format!("Training returned {}", trained.result));
            trained
        }
        Err(err) => {
            progress::finish_error(&spinner, "Training failed");
            return Err(err);
        }
    };

    output.kv("Result", trained.result);
    output.kv("Epochs", trained.training_loss.len());
    if let Some(loss) = trained.training_loss.last() {
        output.kv("Training loss", format!("{:.6}", loss));
    }
    if let Some(loss) = trained.validation_loss.last() {
        output.kv("Validation loss", format!("{:.6}", loss));
    }
    if trained.result == 0 {
        output.success(format!("Saved model to {}", args.output.display()));
    } else {
        output.warning("Model was not saved");
    }
    output.result(&trained)?;

    Ok(super::exit_code(trained.result))
}
