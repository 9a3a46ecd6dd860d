use ptycho_core::models::ProductHandle;

/// Part of a product affected by a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    Metadata,
    Positions,
    Probes,
    Object,
    Losses,
}

/// Change notification emitted by the product repository
///
/// `index` is the item's position in the repository at the time of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductEvent {
    ItemInserted {
        handle: ProductHandle,
        index: usize,
    },
    ItemChanged {
        handle: ProductHandle,
        index: usize,
        field: ProductField,
    },
    ItemRemoved {
        handle: ProductHandle,
        index: usize,
    },
}

impl ProductEvent {
    pub fn handle(&self) -> ProductHandle {
        match self {
            ProductEvent::ItemInserted { handle, .. }
            | ProductEvent::ItemChanged { handle, .. }
            | ProductEvent::ItemRemoved { handle, .. } => *handle,
        }
    }
}

/// Port for subscribers to product repository changes
pub trait ProductRepositoryObserver: Send + Sync {
    /// Called after the change has been committed, outside the repository lock
    fn handle_event(&self, event: &ProductEvent);
}
