use ndarray::Array3;
use serde::{Deserialize, Serialize};

use super::scan::PositionSequence;

/// Descriptive metadata for a product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub name: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub detector_distance_m: Option<f64>,
    #[serde(default)]
    pub probe_energy_ev: Option<f64>,
    #[serde(default)]
    pub probe_photon_count: Option<f64>,
    #[serde(default)]
    pub exposure_time_s: Option<f64>,
}

impl ProductMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One reconstruction work item: positions, probe modes, object slices, and metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub metadata: ProductMetadata,
    pub positions: PositionSequence,
    /// Probe modes, shape `[modes, height, width]`
    #[serde(default)]
    pub probes: Array3<f32>,
    /// Object layers, shape `[layers, height, width]`
    #[serde(default)]
    pub object: Array3<f32>,
    /// Per-iteration cost values reported by the reconstructor
    #[serde(default)]
    pub losses: Vec<f64>,
}

impl Product {
    pub fn new(metadata: ProductMetadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn with_positions(mut self, positions: PositionSequence) -> Self {
        self.positions = positions;
        self
    }
}
