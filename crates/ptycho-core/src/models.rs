pub mod automation;
pub mod handle;
pub mod patterns;
pub mod product;
pub mod reconstruct;
pub mod scan;

pub use automation::AutomationDatasetState;
pub use handle::ProductHandle;
pub use patterns::AssembledPatterns;
pub use product::{Product, ProductMetadata};
pub use reconstruct::{ReconstructInput, ReconstructOutput, ScanIndexFilter, TrainOutput};
pub use scan::{PositionSequence, ScanPoint, ScanTransformPreset};
