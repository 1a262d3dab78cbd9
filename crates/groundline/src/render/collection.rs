//! Z-ordered primitive collection
//!
//! Ground primitives are drawn in layers by z-index, then in insertion order
//! within a layer. Entries are addressed by stable handles so owners can find
//! their own primitives without scanning, while `get(index)` exposes the draw
//! order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use super::primitive::GroundPolylinePrimitive;

new_key_type! {
    /// Stable handle to a primitive in a [`PrimitiveCollection`]
    pub struct PrimitiveHandle;
}

/// Collection shared between batches and the frame loop
pub type SharedPrimitives = Rc<RefCell<PrimitiveCollection>>;

struct Entry {
    primitive: GroundPolylinePrimitive,
    z_index: i32,
}

/// Ground primitives ordered by z-index
#[derive(Default)]
pub struct PrimitiveCollection {
    entries: SlotMap<PrimitiveHandle, Entry>,
    layers: BTreeMap<i32, Vec<PrimitiveHandle>>,
}

impl PrimitiveCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection behind a shared handle
    pub fn shared() -> SharedPrimitives {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Add a primitive on top of its z-index layer
    pub fn add(&mut self, primitive: GroundPolylinePrimitive, z_index: i32) -> PrimitiveHandle {
        let handle = self.entries.insert(Entry { primitive, z_index });
        self.layers.entry(z_index).or_default().push(handle);
        log::trace!("Added primitive {:?} at z-index {}", handle, z_index);
        handle
    }

    /// Remove and return a primitive; `None` if the handle is stale
    pub fn remove(&mut self, handle: PrimitiveHandle) -> Option<GroundPolylinePrimitive> {
        let entry = self.entries.remove(handle)?;
        if let Some(layer) = self.layers.get_mut(&entry.z_index) {
            layer.retain(|h| *h != handle);
            if layer.is_empty() {
                self.layers.remove(&entry.z_index);
            }
        }
        log::trace!("Removed primitive {:?}", handle);
        Some(entry.primitive)
    }

    /// Whether the handle refers to a live primitive
    pub fn contains(&self, handle: PrimitiveHandle) -> bool {
        self.entries.contains_key(handle)
    }

    /// Number of primitives
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle of the primitive at draw position `index`
    pub fn handle_at(&self, index: usize) -> Option<PrimitiveHandle> {
        self.layers.values().flatten().nth(index).copied()
    }

    /// Primitive at draw position `index`
    pub fn get(&self, index: usize) -> Option<&GroundPolylinePrimitive> {
        self.handle_at(index).and_then(|handle| self.primitive(handle))
    }

    /// Mutable primitive at draw position `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut GroundPolylinePrimitive> {
        let handle = self.handle_at(index)?;
        self.primitive_mut(handle)
    }

    /// Primitive by handle
    pub fn primitive(&self, handle: PrimitiveHandle) -> Option<&GroundPolylinePrimitive> {
        self.entries.get(handle).map(|entry| &entry.primitive)
    }

    /// Mutable primitive by handle
    pub fn primitive_mut(&mut self, handle: PrimitiveHandle) -> Option<&mut GroundPolylinePrimitive> {
        self.entries.get_mut(handle).map(|entry| &mut entry.primitive)
    }

    /// Z-index a primitive was added with
    pub fn z_index(&self, handle: PrimitiveHandle) -> Option<i32> {
        self.entries.get(handle).map(|entry| entry.z_index)
    }

    /// Primitives in draw order
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveHandle, &GroundPolylinePrimitive)> + '_ {
        self.layers
            .values()
            .flatten()
            .filter_map(|handle| self.primitive(*handle).map(|primitive| (*handle, primitive)))
    }

    /// Number of primitives with `show` set
    pub fn shown_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.primitive.show).count()
    }
}
