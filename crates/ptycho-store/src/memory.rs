//! In-memory assembled pattern storage

use parking_lot::RwLock;
use ptycho_core::models::AssembledPatterns;
use ptycho_core::ports::PatternSource;
use std::sync::Arc;

/// Holds the currently assembled diffraction dataset
///
/// Readers receive an `Arc` snapshot, so replacing the dataset while a
/// reconstruction is matching against the old one is safe.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatternStore {
    assembled: Arc<RwLock<Option<Arc<AssembledPatterns>>>>,
}

impl MemoryPatternStore {
    /// Create an empty pattern store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the assembled dataset
    pub fn load(&self, patterns: AssembledPatterns) {
        tracing::info!(
            "Loaded {} diffraction patterns ({}x{})",
            patterns.len(),
            patterns.pattern_shape().0,
            patterns.pattern_shape().1
        );
        *self.assembled.write() = Some(Arc::new(patterns));
    }

    /// Drop the assembled dataset
    pub fn clear(&self) {
        *self.assembled.write() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.assembled.read().is_some()
    }
}

impl PatternSource for MemoryPatternStore {
    fn assembled(&self) -> Option<Arc<AssembledPatterns>> {
        self.assembled.read().clone()
    }
}
