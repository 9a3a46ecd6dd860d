use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::{ReconstructInput, ReconstructOutput};
use ptycho_core::ports::{ReconstructProgress, Reconstructor};

/// Placeholder selected when no backend is installed; every reconstruction fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReconstructor;

impl Reconstructor for NullReconstructor {
    fn reconstruct(
        &self,
        _input: ReconstructInput,
        _progress: &dyn ReconstructProgress,
    ) -> Result<ReconstructOutput> {
        Err(PtychoError::Reconstruction(
            "no reconstruction backend is installed".to_string(),
        ))
    }
}

/// Returns the matched product unchanged
///
/// Useful for checking a workflow's wiring before pointing it at a real backend.
/// The output product carries only the matched positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReconstructor;

impl Reconstructor for PassthroughReconstructor {
    fn reconstruct(
        &self,
        input: ReconstructInput,
        progress: &dyn ReconstructProgress,
    ) -> Result<ReconstructOutput> {
        progress.set_progress_goal(1);
        progress.set_progress(1);
        Ok(ReconstructOutput {
            result: 0,
            product: input.product,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ReconstructorProgressMonitor;
    use ndarray::Array3;
    use ptycho_core::models::{Product, ProductMetadata};

    fn input() -> ReconstructInput {
        ReconstructInput {
            patterns: Array3::zeros((0, 1, 1)),
            bad_pixels: None,
            product: Product::new(ProductMetadata::named("in")),
        }
    }

    #[test]
    fn test_null_reconstructor_fails() {
        let progress = ReconstructorProgressMonitor::new();
        assert!(NullReconstructor.reconstruct(input(), &progress).is_err());
        assert!(NullReconstructor.as_trainable().is_none());
    }

    #[test]
    fn test_passthrough_keeps_product() {
        let progress = ReconstructorProgressMonitor::new();
        let output = PassthroughReconstructor.reconstruct(input(), &progress).unwrap();
        assert_eq!(output.result, 0);
        assert_eq!(output.product.name(), "in");
        assert_eq!(progress.progress(), progress.progress_goal());
    }
}
