use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::ProductMetadata;
use ptycho_core::ports::{FileBasedWorkflow, WorkflowApi};
use std::path::{Path, PathBuf};

/// Pairs each scan position file with its diffraction patterns
///
/// Expects a beamline layout where `positions/scan<N>.csv` sits next to
/// `patterns/scan<N>.patterns.json`. Local results go to
/// `reconstructions/scan<N>.product.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanCorrelationWorkflow;

/// Last run of ASCII digits in the file stem, e.g. 42 for `scan_0042.csv`
pub fn scan_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let end = stem.rfind(|c: char| c.is_ascii_digit())? + 1;
    let start = stem[..end]
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    stem[start..end].parse().ok()
}

fn experiment_root(file_path: &Path) -> PathBuf {
    let directory = file_path.parent().unwrap_or(Path::new(""));
    directory.parent().unwrap_or(directory).to_path_buf()
}

impl FileBasedWorkflow for ScanCorrelationWorkflow {
    fn is_watch_recursive(&self) -> bool {
        false
    }

    fn watch_file_pattern(&self) -> String {
        "*.csv".to_string()
    }

    fn execute(&self, api: &dyn WorkflowApi, file_path: &Path) -> Result<()> {
        let scan = scan_number(file_path).ok_or_else(|| PtychoError::WorkflowFailed {
            path: file_path.to_path_buf(),
            reason: "no scan number in file name".to_string(),
        })?;
        let name = format!("scan{}", scan);
        let root = experiment_root(file_path);

        api.open_patterns(&root.join("patterns").join(format!("{}.patterns.json", name)))?;

        let product = api.create_product(ProductMetadata::named(&name))?;
        product.open_scan(file_path)?;
        product.build_probe(None)?;
        product.build_object(None)?;

        match product.reconstruct_remote() {
            Ok(()) => Ok(()),
            Err(PtychoError::RemoteUnavailable { .. }) => {
                let output_path = root
                    .join("reconstructions")
                    .join(format!("{}.product.json", name));
                let output = product.reconstruct_local(true)?;
                output.save_product(&output_path)?;
                tracing::info!("Saved {}", output_path.display());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_number_takes_last_digit_run() {
        assert_eq!(scan_number(Path::new("/d/positions/scan0042.csv")), Some(42));
        assert_eq!(scan_number(Path::new("fly2_scan17.csv")), Some(17));
        assert_eq!(scan_number(Path::new("123.csv")), Some(123));
        assert_eq!(scan_number(Path::new("positions.csv")), None);
        assert_eq!(scan_number(Path::new("mesure_é7.csv")), Some(7));
    }

    #[test]
    fn test_experiment_root_is_parent_of_directory() {
        assert_eq!(
            experiment_root(Path::new("/beamline/run3/positions/scan1.csv")),
            PathBuf::from("/beamline/run3")
        );
    }
}
