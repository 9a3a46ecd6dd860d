use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::product::Product;
use crate::error::PtychoError;

/// Predicate over scan indexes used to split data into interleaved subsets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanIndexFilter {
    #[default]
    All,
    Odd,
    Even,
}

impl ScanIndexFilter {
    pub fn includes(&self, index: i64) -> bool {
        match self {
            ScanIndexFilter::All => true,
            ScanIndexFilter::Odd => index.rem_euclid(2) == 1,
            ScanIndexFilter::Even => index.rem_euclid(2) == 0,
        }
    }
}

impl fmt::Display for ScanIndexFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanIndexFilter::All => write!(f, "all"),
            ScanIndexFilter::Odd => write!(f, "odd"),
            ScanIndexFilter::Even => write!(f, "even"),
        }
    }
}

impl FromStr for ScanIndexFilter {
    type Err = PtychoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ScanIndexFilter::All),
            "odd" => Ok(ScanIndexFilter::Odd),
            "even" => Ok(ScanIndexFilter::Even),
            _ => Err(PtychoError::ConfigInvalid {
                key: "index_filter".to_string(),
                reason: format!("Invalid index filter: {}. Use all, odd, or even", s),
            }),
        }
    }
}

/// Frozen snapshot handed to a reconstructor
///
/// Row `i` of `patterns` was measured at `product.positions[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructInput {
    pub patterns: Array3<f32>,
    pub bad_pixels: Option<Array2<bool>>,
    pub product: Product,
}

/// Result returned by a reconstructor
#[derive(Debug, Clone)]
pub struct ReconstructOutput {
    /// Backend status code, zero on success
    pub result: i32,
    pub product: Product,
}

/// Result of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainOutput {
    pub training_loss: Vec<f64>,
    pub validation_loss: Vec<f64>,
    pub result: i32,
}

impl TrainOutput {
    /// Output reported when no training took place
    pub fn not_trained() -> Self {
        Self {
            training_loss: Vec::new(),
            validation_loss: Vec::new(),
            result: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_odd_and_even_partition_indexes(index in any::<i64>()) {
            prop_assert!(ScanIndexFilter::All.includes(index));
            prop_assert_ne!(
                ScanIndexFilter::Odd.includes(index),
                ScanIndexFilter::Even.includes(index)
            );
        }
    }

    #[test]
    fn test_filter_includes() {
        assert!(ScanIndexFilter::All.includes(3));
        assert!(ScanIndexFilter::Odd.includes(3));
        assert!(!ScanIndexFilter::Even.includes(3));
        assert!(ScanIndexFilter::Even.includes(0));
        assert!(ScanIndexFilter::Odd.includes(-1));
        assert!(ScanIndexFilter::Even.includes(-2));
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!("ODD".parse::<ScanIndexFilter>().unwrap(), ScanIndexFilter::Odd);
        assert_eq!("even".parse::<ScanIndexFilter>().unwrap(), ScanIndexFilter::Even);
        assert!("half".parse::<ScanIndexFilter>().is_err());
    }

    #[test]
    fn test_not_trained_code() {
        assert_eq!(TrainOutput::not_trained().result, -1);
    }
}
