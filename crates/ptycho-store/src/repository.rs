//! In-memory product repository
//!
//! Products live in an arena of generation-counted slots. Callers address them
//! through [`ProductHandle`]s, which never go stale silently: removing an item
//! bumps its slot's generation, so an old handle is rejected rather than routed
//! to whatever item reuses the slot. Positional indexes are derived from the
//! insertion-ordered handle list on demand.

use parking_lot::RwLock;
use ptycho_core::error::{PtychoError, Result};
use ptycho_core::models::{PositionSequence, Product, ProductHandle, ProductMetadata};
use ndarray::Array3;
use std::sync::Arc;

use crate::ports::{ProductEvent, ProductField, ProductRepositoryObserver};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    product: Option<Product>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<ProductHandle>,
}

impl Arena {
    fn get(&self, handle: ProductHandle) -> Result<&Product> {
        self.slots
            .get(handle.slot() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.product.as_ref())
            .ok_or_else(|| stale(handle))
    }

    fn get_mut(&mut self, handle: ProductHandle) -> Result<&mut Product> {
        self.slots
            .get_mut(handle.slot() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.product.as_mut())
            .ok_or_else(|| stale(handle))
    }

    fn index_of(&self, handle: ProductHandle) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == handle)
    }

    fn insert(&mut self, product: Product) -> (ProductHandle, usize) {
        let handle = match self.free.pop() {
            Some(slot_index) => {
                let slot = &mut self.slots[slot_index as usize];
                slot.product = Some(product);
                ProductHandle::new(slot_index, slot.generation)
            }
            None => {
                let slot_index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    product: Some(product),
                });
                ProductHandle::new(slot_index, 0)
            }
        };

        self.order.push(handle);
        (handle, self.order.len() - 1)
    }

    fn remove(&mut self, handle: ProductHandle) -> Result<(Product, usize)> {
        let index = self.index_of(handle).ok_or_else(|| stale(handle))?;
        let slot = &mut self.slots[handle.slot() as usize];
        let product = slot.product.take().ok_or_else(|| stale(handle))?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot());
        self.order.remove(index);

        Ok((product, index))
    }
}

fn stale(handle: ProductHandle) -> PtychoError {
    PtychoError::StaleProductHandle {
        handle: handle.to_string(),
    }
}

/// Thread-safe repository of products with typed change notifications
#[derive(Default)]
pub struct ProductRepository {
    arena: RwLock<Arena>,
    observers: RwLock<Vec<Arc<dyn ProductRepositoryObserver>>>,
}

impl ProductRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to change notifications
    pub fn add_observer(&self, observer: Arc<dyn ProductRepositoryObserver>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.arena.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles in insertion order
    pub fn handles(&self) -> Vec<ProductHandle> {
        self.arena.read().order.clone()
    }

    /// Handle of the item at a positional index
    pub fn handle_at(&self, index: usize) -> Result<ProductHandle> {
        self.arena
            .read()
            .order
            .get(index)
            .copied()
            .ok_or(PtychoError::ProductNotFound { index })
    }

    /// Current positional index of an item, `None` once it is removed
    pub fn index_of(&self, handle: ProductHandle) -> Option<usize> {
        self.arena.read().index_of(handle)
    }

    pub fn contains(&self, handle: ProductHandle) -> bool {
        self.arena.read().get(handle).is_ok()
    }

    /// Append a product, returning its handle
    pub fn insert_product(&self, product: Product) -> ProductHandle {
        let (handle, index) = self.arena.write().insert(product);
        tracing::debug!("Inserted product {} at index {}", handle, index);
        self.notify(&[ProductEvent::ItemInserted { handle, index }]);
        handle
    }

    /// Append a copy of an existing product
    pub fn insert_like(&self, handle: ProductHandle) -> Result<ProductHandle> {
        let product = self.get(handle)?;
        Ok(self.insert_product(product))
    }

    /// Remove an item, returning its product
    pub fn remove(&self, handle: ProductHandle) -> Result<Product> {
        let (product, index) = self.arena.write().remove(handle)?;
        tracing::debug!("Removed product {} from index {}", handle, index);
        self.notify(&[ProductEvent::ItemRemoved { handle, index }]);
        Ok(product)
    }

    /// Snapshot of a product
    pub fn get(&self, handle: ProductHandle) -> Result<Product> {
        self.arena.read().get(handle).cloned()
    }

    /// Read a product in place
    pub fn with_product<R>(&self, handle: ProductHandle, f: impl FnOnce(&Product) -> R) -> Result<R> {
        let arena = self.arena.read();
        arena.get(handle).map(f)
    }

    pub fn name(&self, handle: ProductHandle) -> Result<String> {
        self.with_product(handle, |product| product.metadata.name.clone())
    }

    pub fn set_name(&self, handle: ProductHandle, name: &str) -> Result<()> {
        self.modify(handle, |product| {
            if product.metadata.name == name {
                return Vec::new();
            }
            product.metadata.name = name.to_string();
            vec![ProductField::Metadata]
        })
    }

    pub fn set_metadata(&self, handle: ProductHandle, metadata: ProductMetadata) -> Result<()> {
        self.modify(handle, |product| {
            product.metadata = metadata;
            vec![ProductField::Metadata]
        })
    }

    pub fn set_positions(&self, handle: ProductHandle, positions: PositionSequence) -> Result<()> {
        self.modify(handle, |product| {
            product.positions = positions;
            vec![ProductField::Positions]
        })
    }

    pub fn set_probes(&self, handle: ProductHandle, probes: Array3<f32>) -> Result<()> {
        self.modify(handle, |product| {
            product.probes = probes;
            vec![ProductField::Probes]
        })
    }

    pub fn set_object(&self, handle: ProductHandle, object: Array3<f32>) -> Result<()> {
        self.modify(handle, |product| {
            product.object = object;
            vec![ProductField::Object]
        })
    }

    /// Overwrite every part of an item with `product`
    ///
    /// One change event is emitted per field that actually differs. The name is
    /// overwritten too; callers that must keep it restore it afterwards.
    pub fn assign(&self, handle: ProductHandle, product: Product) -> Result<()> {
        self.modify(handle, |current| {
            let mut fields = Vec::new();

            if current.metadata != product.metadata {
                fields.push(ProductField::Metadata);
            }
            if current.positions != product.positions {
                fields.push(ProductField::Positions);
            }
            if current.probes != product.probes {
                fields.push(ProductField::Probes);
            }
            if current.object != product.object {
                fields.push(ProductField::Object);
            }
            if current.losses != product.losses {
                fields.push(ProductField::Losses);
            }

            *current = product;
            fields
        })
    }

    fn modify(
        &self,
        handle: ProductHandle,
        f: impl FnOnce(&mut Product) -> Vec<ProductField>,
    ) -> Result<()> {
        let events: Vec<ProductEvent> = {
            let mut arena = self.arena.write();
            let fields = f(arena.get_mut(handle)?);
            let index = arena.index_of(handle).ok_or_else(|| stale(handle))?;
            fields
                .into_iter()
                .map(|field| ProductEvent::ItemChanged {
                    handle,
                    index,
                    field,
                })
                .collect()
        };

        self.notify(&events);
        Ok(())
    }

    fn notify(&self, events: &[ProductEvent]) {
        if events.is_empty() {
            return;
        }

        let observers = self.observers.read().clone();
        for event in events {
            for observer in &observers {
                observer.handle_event(event);
            }
        }
    }
}

impl std::fmt::Debug for ProductRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductRepository")
            .field("len", &self.len())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}
