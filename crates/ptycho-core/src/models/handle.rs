use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable reference to an item in the product repository
///
/// A handle stays valid across insertions and removals of other items. Once its
/// own item is removed, the slot's generation advances and the handle is rejected
/// instead of aliasing whatever item reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductHandle {
    slot: u32,
    generation: u32,
}

impl ProductHandle {
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ProductHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}
