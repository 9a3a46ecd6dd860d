use ndarray::Array3;

use crate::error::Result;
use crate::models::Product;

/// Port for initial probe or object estimates
pub trait ArrayBuilder: Send + Sync {
    /// Build an array for `product` sized for patterns of `pattern_shape` (height, width)
    fn build(&self, product: &Product, pattern_shape: (usize, usize)) -> Result<Array3<f32>>;
}
