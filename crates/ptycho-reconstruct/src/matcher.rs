//! Diffraction pattern to scan position matching
//!
//! A reconstruction needs every pattern row paired with the position it was
//! measured at. Patterns are keyed by scan index in the assembled dataset and
//! positions are keyed by scan index in the product, and neither side is
//! guaranteed to cover the other. Matching keeps the indexes present on both
//! sides and orders pattern rows and positions identically, by ascending index.

use ndarray::Axis;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::{
    AssembledPatterns, PositionSequence, Product, ProductHandle, ReconstructInput,
    ScanIndexFilter, ScanPoint,
};
use ptycho_core::ports::PatternSource;
use ptycho_store::ProductRepository;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Builds reconstruction inputs from the assembled dataset and a product
pub struct DiffractionPatternPositionMatcher {
    patterns: Arc<dyn PatternSource>,
    products: Arc<ProductRepository>,
}

impl DiffractionPatternPositionMatcher {
    pub fn new(patterns: Arc<dyn PatternSource>, products: Arc<ProductRepository>) -> Self {
        Self { patterns, products }
    }

    /// Assembled patterns, provided they can be reconstructed from
    ///
    /// Fails when no dataset is loaded or its bad pixel mask is absent.
    pub fn check_ready(&self) -> Result<Arc<AssembledPatterns>> {
        let assembled = self.patterns.assembled().ok_or(PtychoError::PatternsNotLoaded)?;

        if assembled.bad_pixels().is_none() {
            return Err(PtychoError::BadPixelsMissing);
        }

        Ok(assembled)
    }

    /// Match the product's positions against the assembled patterns
    pub fn match_diffraction_patterns_with_positions(
        &self,
        product: ProductHandle,
        index_filter: ScanIndexFilter,
    ) -> Result<ReconstructInput> {
        let assembled = self.check_ready()?;
        let product = self.products.get(product)?;
        Ok(match_patterns(&assembled, product, index_filter))
    }
}

/// Pair pattern rows with positions by scan index
///
/// Keeps indexes present in both the dataset and the filtered positions, sorted
/// ascending. Row `i` of the returned patterns belongs to position `i`. When a
/// scan index repeats, its first occurrence in scan order is used.
pub fn match_patterns(
    assembled: &AssembledPatterns,
    mut product: Product,
    index_filter: ScanIndexFilter,
) -> ReconstructInput {
    let mut rows: HashMap<i64, usize> = HashMap::with_capacity(assembled.len());
    for (row, index) in assembled.indexes().iter().enumerate() {
        rows.entry(*index).or_insert(row);
    }

    let mut selected: BTreeMap<i64, (usize, ScanPoint)> = BTreeMap::new();
    for point in product.positions.iter() {
        if !index_filter.includes(point.index) {
            continue;
        }

        if let Some(row) = rows.get(&point.index) {
            selected.entry(point.index).or_insert((*row, *point));
        }
    }

    let row_indices: Vec<usize> = selected.values().map(|(row, _)| *row).collect();
    let patterns = assembled.patterns().select(Axis(0), &row_indices);

    tracing::debug!(
        "Matched {} of {} positions against {} patterns ({} filter)",
        row_indices.len(),
        product.positions.len(),
        assembled.len(),
        index_filter
    );

    product.positions = selected.into_values().map(|(_, point)| point).collect::<PositionSequence>();

    ReconstructInput {
        patterns,
        bad_pixels: assembled.bad_pixels().cloned(),
        product,
    }
}
