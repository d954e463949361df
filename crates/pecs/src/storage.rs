//! Per-component storage indexed by entity id.
//!
//! The world never touches component data. [`ComponentVec`] is a helper for
//! collaborators: a dense column of `T` indexed by [`EntityId`] that grows by
//! doubling and tags the entity handle with the component's mask bit when a
//! value is written.

use std::ops::{Index, IndexMut};

use tracing::trace;

use crate::entity::{Entity, EntityId};
use crate::mask::Mask;

/// A dense column of component values, one slot per entity id.
#[derive(Debug, Clone)]
pub struct ComponentVec<T> {
    bit: Mask,
    values: Vec<T>,
}

impl<T> ComponentVec<T> {
    /// An empty column whose entries mark entities with `bit`.
    pub fn new(bit: Mask) -> Self {
        Self {
            bit,
            values: Vec::new(),
        }
    }

    pub fn bit(&self) -> Mask {
        self.bit
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.values.get(id.index())
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.values.get_mut(id.index())
    }

    /// Number of slots, including ones never written.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }
}

impl<T: Default> ComponentVec<T> {
    /// Write `value` for `entity` and set this column's bit on the handle.
    ///
    /// When the id is out of range the column grows: the target size starts
    /// at the current one (at least 1) and doubles until it strictly
    /// exceeds the id. New slots are filled with `T::default()`. Returns the
    /// stored value.
    pub fn insert(&mut self, entity: &mut Entity, value: T) -> &mut T {
        let index = entity.id().index();
        if index >= self.values.len() {
            let mut cap = self.values.len().max(1);
            while cap <= index {
                cap *= 2;
            }
            self.values.reserve_exact(cap - self.values.len());
            self.values.resize_with(cap, T::default);
            trace!(capacity = cap, "component column grown");
        }
        entity.insert_mask(self.bit);
        let slot = &mut self.values[index];
        *slot = value;
        slot
    }
}

impl<T> Index<EntityId> for ComponentVec<T> {
    type Output = T;

    fn index(&self, id: EntityId) -> &T {
        &self.values[id.index()]
    }
}

impl<T> IndexMut<EntityId> for ComponentVec<T> {
    fn index_mut(&mut self, id: EntityId) -> &mut T {
        &mut self.values[id.index()]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
