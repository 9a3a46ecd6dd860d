use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PtychoError, Result};

/// Diffraction patterns assembled from a detector dataset
///
/// Row `i` of `patterns` was measured at scan index `indexes[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledPatterns {
    indexes: Vec<i64>,
    patterns: Array3<f32>,
    #[serde(default)]
    bad_pixels: Option<Array2<bool>>,
}

impl AssembledPatterns {
    /// Assemble patterns, validating that indexes, rows, and mask agree in shape
    pub fn new(
        indexes: Vec<i64>,
        patterns: Array3<f32>,
        bad_pixels: Option<Array2<bool>>,
    ) -> Result<Self> {
        let assembled = Self {
            indexes,
            patterns,
            bad_pixels,
        };
        assembled.validate()?;
        Ok(assembled)
    }

    /// Check shape agreement, used after deserialization
    pub fn validate(&self) -> Result<()> {
        let rows = self.patterns.len_of(Axis(0));

        if rows != self.indexes.len() {
            return Err(PtychoError::ShapeMismatch {
                what: "assembled patterns".to_string(),
                expected: format!("{} rows", self.indexes.len()),
                found: format!("{} rows", rows),
            });
        }

        if let Some(mask) = &self.bad_pixels {
            let (_, height, width) = self.patterns.dim();

            if mask.dim() != (height, width) {
                return Err(PtychoError::ShapeMismatch {
                    what: "bad pixel mask".to_string(),
                    expected: format!("{}x{}", height, width),
                    found: format!("{}x{}", mask.nrows(), mask.ncols()),
                });
            }
        }

        Ok(())
    }

    pub fn indexes(&self) -> &[i64] {
        &self.indexes
    }

    pub fn patterns(&self) -> &Array3<f32> {
        &self.patterns
    }

    pub fn bad_pixels(&self) -> Option<&Array2<bool>> {
        self.bad_pixels.as_ref()
    }

    /// Replace the bad pixel mask; a mask that does not match the pattern shape is rejected
    pub fn set_bad_pixels(&mut self, bad_pixels: Option<Array2<bool>>) -> Result<()> {
        let previous = std::mem::replace(&mut self.bad_pixels, bad_pixels);

        if let Err(err) = self.validate() {
            self.bad_pixels = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Pattern height and width
    pub fn pattern_shape(&self) -> (usize, usize) {
        let (_, height, width) = self.patterns.dim();
        (height, width)
    }

    /// Pattern measured at the given scan index, if any
    pub fn pattern(&self, index: i64) -> Option<ArrayView2<'_, f32>> {
        self.indexes
            .iter()
            .position(|&candidate| candidate == index)
            .map(|row| self.patterns.index_axis(Axis(0), row))
    }
}
