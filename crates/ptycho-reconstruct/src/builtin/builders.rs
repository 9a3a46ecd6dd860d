use ndarray::Array3;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::Product;
use ptycho_core::ports::ArrayBuilder;

/// Constant-valued initial estimate with one frame per mode
#[derive(Debug, Clone, Copy)]
pub struct UniformArrayBuilder {
    modes: usize,
}

impl UniformArrayBuilder {
    pub fn new(modes: usize) -> Self {
        Self { modes }
    }
}

impl ArrayBuilder for UniformArrayBuilder {
    fn build(&self, _product: &Product, pattern_shape: (usize, usize)) -> Result<Array3<f32>> {
        let (height, width) = pattern_shape;

        if self.modes == 0 || height == 0 || width == 0 {
            return Err(PtychoError::ShapeMismatch {
                what: "uniform estimate".to_string(),
                expected: "non-empty modes and pattern shape".to_string(),
                found: format!("{}x{}x{}", self.modes, height, width),
            });
        }

        Ok(Array3::ones((self.modes, height, width)))
    }
}
