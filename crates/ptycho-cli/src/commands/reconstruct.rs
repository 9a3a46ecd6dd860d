//! Reconstruct command implementation

use crate::cli::ReconstructArgs;
use crate::config_loader::load_config;
use crate::output::OutputWriter;
use crate::progress;
use anyhow::{Context, Result};
use ptycho_core::config::CliConfigOverrides;
use ptycho_core::models::{ProductHandle, ScanIndexFilter, ScanTransformPreset};
use ptycho_core::ports::WorkflowApi;
use ptycho_reconstruct::ReconstructorContext;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ReconstructOutput {
    reconstructor: String,
    outputs: Vec<PathBuf>,
}

/// `<output>.<suffix>.json` for `<output>.json`
fn suffixed_path(output: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = output.with_extension("").into_os_string();
    name.push(format!(".{}.json", suffix));
    PathBuf::from(name)
}

pub fn execute(args: ReconstructArgs, config_path: Option<&Path>, output: &OutputWriter) -> Result<u8> {
    let config = load_config(
        config_path,
        CliConfigOverrides {
            algorithm: args.algorithm.clone(),
            ..Default::default()
        },
    )?;
    let (context, _) = super::reconstructor_context(&config, args.algorithm.as_deref())?;
    context.start()?;

    let api = context.workflow_api();
    api.open_patterns(&args.patterns)
        .with_context(|| format!("Failed to open patterns {}", args.patterns.display()))?;
    let input = api
        .open_product(&args.input)
        .with_context(|| format!("Failed to open product {}", args.input.display()))?;
    let reconstructor = api.reconstructor_name()?;

    let spinner = progress::create_spinner(
        &format!("Reconstructing with {}...", reconstructor),
        output.is_json(),
    );

    let outcome = if args.split {
        reconstruct_split(&context, input.product_handle(), &args.output)
    } else if args.transformed {
        reconstruct_transformed(&context, input.product_handle(), &args.output)
    } else {
        input
            .reconstruct_local(true)
            .and_then(|result| result.save_product(&args.output))
            .map(|()| vec![args.output.clone()])
            .map_err(Into::into)
    };
    context.stop();

    let outputs = match outcome {
        Ok(outputs) => {
            progress::finish_success(&spinner, "Reconstruction finished");
            outputs
        }
        Err(err) => {
            progress::finish_error(&spinner, "Reconstruction failed");
            return Err(err);
        }
    };

    for path in &outputs {
        output.success(format!("Saved {}", path.display()));
    }
    output.result(ReconstructOutput {
        reconstructor,
        outputs,
    })?;
    Ok(0)
}

fn reconstruct_split(
    context: &ReconstructorContext,
    input: ProductHandle,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    let api = context.reconstructor_api();
    let (odd, even) = api.reconstruct_split(input)?;
    api.process_all_results();

    save_outputs(
        context,
        [
            (odd, suffixed_path(output, &ScanIndexFilter::Odd.to_string())),
            (even, suffixed_path(output, &ScanIndexFilter::Even.to_string())),
        ],
    )
}

fn reconstruct_transformed(
    context: &ReconstructorContext,
    input: ProductHandle,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    let api = context.reconstructor_api();
    let handles = api.reconstruct_transformed(input)?;
    api.process_all_results();

    let paths = ScanTransformPreset::all()
        .map(|preset| suffixed_path(output, &format!("preset{}", preset.value())));
    save_outputs(context, handles.into_iter().zip(paths))
}

fn save_outputs(
    context: &ReconstructorContext,
    outputs: impl IntoIterator<Item = (ProductHandle, PathBuf)>,
) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::new();
    for (handle, path) in outputs {
        context
            .workflow_api()
            .get_product(handle)?
            .save_product(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        saved.push(path);
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixed_path_replaces_extension() {
        assert_eq!(
            suffixed_path(Path::new("out/scan1.json"), "odd"),
            PathBuf::from("out/scan1.odd.json")
        );
        assert_eq!(
            suffixed_path(Path::new("scan1"), "preset3"),
            PathBuf::from("scan1.preset3.json")
        );
    }
}
