use std::sync::Arc;

use crate::models::AssembledPatterns;

/// Port for the dataset currently assembled from detector files
pub trait PatternSource: Send + Sync {
    /// Snapshot of the assembled patterns, or `None` when nothing is loaded
    fn assembled(&self) -> Option<Arc<AssembledPatterns>>;
}
