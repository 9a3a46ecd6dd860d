use ptycho_core::error::{PtychoError, Result};
use ptycho_core::ports::{FileBasedWorkflow, WorkflowApi};
use std::path::{Path, PathBuf};

/// Reconstructs each `*.product.json` that appears, saving the result beside it
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductFileWorkflow;

impl ProductFileWorkflow {
    /// `<dir>/<stem>.<reconstructor>.json` for `<dir>/<stem>.product.json`
    pub fn output_path(input: &Path, reconstructor: &str) -> Result<PathBuf> {
        let stem = input
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').next())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| PtychoError::WorkflowFailed {
                path: input.to_path_buf(),
                reason: "file name has no stem".to_string(),
            })?;

        Ok(input.with_file_name(format!("{}.{}.json", stem, reconstructor)))
    }
}

impl FileBasedWorkflow for ProductFileWorkflow {
    fn is_watch_recursive(&self) -> bool {
        true
    }

    fn watch_file_pattern(&self) -> String {
        "*.product.json".to_string()
    }

    fn execute(&self, api: &dyn WorkflowApi, file_path: &Path) -> Result<()> {
        let output_path = Self::output_path(file_path, &api.reconstructor_name()?)?;

        let input = api.open_product(file_path)?;
        let output = input.reconstruct_local(true)?;
        output.save_product(&output_path)?;

        tracing::info!("Saved {}", output_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_replaces_extensions() {
        let path = ProductFileWorkflow::output_path(
            Path::new("/beamline/run3/scan12.product.json"),
            "Passthrough",
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/beamline/run3/scan12.Passthrough.json"));
    }

    #[test]
    fn test_output_does_not_match_watch_pattern() {
        let workflow = ProductFileWorkflow;
        let pattern = glob::Pattern::new(&workflow.watch_file_pattern()).unwrap();
        let output = ProductFileWorkflow::output_path(Path::new("a.product.json"), "None").unwrap();

        assert!(pattern.matches_path(Path::new("a.product.json")));
        assert!(!pattern.matches_path(&output));
    }
}
