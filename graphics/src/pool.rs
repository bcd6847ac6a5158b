//! Fixed-capacity, generation-checked resource pool.
//!
//! The pool owns every payload it hands a handle out for. Slots are recycled
//! through a LIFO free stack, and each slot carries a generation counter that
//! is bumped on destroy so stale handles can be detected in O(1).

use std::fmt;

use crate::error::fatal;
use crate::handle::Handle;

/// Name and handle of a live resource, for tooling.
pub struct ResourceMetadata<K> {
    /// Debug name given at creation.
    pub name: String,
    /// Current handle of the resource.
    pub handle: Handle<K>,
}

impl<K> Clone for ResourceMetadata<K> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handle: self.handle,
        }
    }
}

impl<K> fmt::Debug for ResourceMetadata<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceMetadata")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

/// One storage slot.
struct Slot<T, D> {
    data: Option<T>,
    desc: Option<D>,
    name: String,
    generation: u32,
    is_valid: bool,
}

impl<T, D> Slot<T, D> {
    fn empty() -> Self {
        Self {
            data: None,
            desc: None,
            name: String::new(),
            generation: 0,
            is_valid: false,
        }
    }
}

/// Fixed-capacity pool of `T` payloads described by `D`, addressed by
/// [`Handle<K>`].
pub struct ResourcePool<T, D, K> {
    /// Every slot, live or free. Never grows.
    slots: Vec<Slot<T, D>>,
    /// Free slot indices (LIFO stack).
    free_list: Vec<u32>,
    /// Number of live resources.
    count: u32,
    /// Name used in diagnostics.
    label: &'static str,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<T, D, K> ResourcePool<T, D, K> {
    /// Create a pool with `capacity` pre-allocated slots.
    ///
    /// The free stack is seeded so the first allocation returns index 0.
    pub fn new(label: &'static str, capacity: u32) -> Self {
        let slots = (0..capacity).map(|_| Slot::empty()).collect();
        let free_list = (0..capacity).rev().collect();
        Self {
            slots,
            free_list,
            count: 0,
            label,
            _kind: std::marker::PhantomData,
        }
    }

    /// Store a payload and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if every slot is in use.
    pub fn create_resource(&mut self, data: T, desc: D, name: impl Into<String>) -> Handle<K> {
        let name = name.into();
        let Some(index) = self.free_list.pop() else {
            fatal!(
                "{} pool exhausted: all {} slots in use (creating '{}')",
                self.label,
                self.slots.len(),
                name
            );
        };

        let slot = &mut self.slots[index as usize];
        slot.data = Some(data);
        slot.desc = Some(desc);
        slot.name = name;
        slot.is_valid = true;
        self.count += 1;

        Handle::new(index, slot.generation)
    }

    /// Remove a resource and return its payload and descriptor.
    ///
    /// The slot generation is bumped so the handle (and every copy of it)
    /// stops validating.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or was already destroyed.
    pub fn destroy_resource(&mut self, handle: Handle<K>) -> (T, D) {
        let index = self.checked_index(handle, "destroy");
        let slot = &mut self.slots[index];

        let (Some(data), Some(desc)) = (slot.data.take(), slot.desc.take()) else {
            fatal!("{} slot {} is live but holds no payload", self.label, index);
        };
        slot.is_valid = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.name.clear();
        self.free_list.push(handle.index());
        self.count -= 1;

        (data, desc)
    }

    /// Whether the handle refers to a live resource.
    pub fn is_valid(&self, handle: Handle<K>) -> bool {
        self.slots
            .get(handle.index() as usize)
            .is_some_and(|slot| slot.is_valid && slot.generation == handle.generation())
    }

    /// Payload for a handle, or `None` if the handle is stale.
    pub fn try_get(&self, handle: Handle<K>) -> Option<&T> {
        if self.is_valid(handle) {
            self.slots[handle.index() as usize].data.as_ref()
        } else {
            None
        }
    }

    /// Payload for a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn get(&self, handle: Handle<K>) -> &T {
        let index = self.checked_index(handle, "access");
        match self.slots[index].data.as_ref() {
            Some(data) => data,
            None => fatal!("{} slot {} is live but holds no payload", self.label, index),
        }
    }

    /// Mutable payload for a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn get_mut(&mut self, handle: Handle<K>) -> &mut T {
        let index = self.checked_index(handle, "access");
        let label = self.label;
        match self.slots[index].data.as_mut() {
            Some(data) => data,
            None => fatal!("{} slot {} is live but holds no payload", label, index),
        }
    }

    /// Descriptor for a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn desc(&self, handle: Handle<K>) -> &D {
        let index = self.checked_index(handle, "describe");
        match self.slots[index].desc.as_ref() {
            Some(desc) => desc,
            None => fatal!("{} slot {} is live but holds no descriptor", self.label, index),
        }
    }

    /// Mutable descriptor for a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn desc_mut(&mut self, handle: Handle<K>) -> &mut D {
        let index = self.checked_index(handle, "describe");
        let label = self.label;
        match self.slots[index].desc.as_mut() {
            Some(desc) => desc,
            None => fatal!("{} slot {} is live but holds no descriptor", label, index),
        }
    }

    /// Payload and descriptor for a handle, borrowed together.
    pub fn get_with_desc_mut(&mut self, handle: Handle<K>) -> (&mut T, &mut D) {
        let index = self.checked_index(handle, "access");
        let label = self.label;
        let slot = &mut self.slots[index];
        match (slot.data.as_mut(), slot.desc.as_mut()) {
            (Some(data), Some(desc)) => (data, desc),
            _ => fatal!("{} slot {} is live but holds no payload", label, index),
        }
    }

    /// Debug name for a handle.
    pub fn name(&self, handle: Handle<K>) -> &str {
        let index = self.checked_index(handle, "name");
        &self.slots[index].name
    }

    /// Name and handle of every live resource, in slot order.
    pub fn metadata(&self) -> Vec<ResourceMetadata<K>> {
        self.live_slots()
            .map(|(index, slot)| ResourceMetadata {
                name: slot.name.clone(),
                handle: Handle::new(index as u32, slot.generation),
            })
            .collect()
    }

    /// Descriptor of every live resource, in slot order.
    pub fn descriptors(&self) -> Vec<&D> {
        self.live_slots()
            .filter_map(|(_, slot)| slot.desc.as_ref())
            .collect()
    }

    /// Handles of every live resource, in slot order.
    pub fn handles(&self) -> Vec<Handle<K>> {
        self.live_slots()
            .map(|(index, slot)| Handle::new(index as u32, slot.generation))
            .collect()
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether the pool holds no live resources.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Remove every live resource, returning the payloads.
    ///
    /// Generations are bumped exactly as in [`destroy_resource`](Self::destroy_resource).
    pub fn drain(&mut self) -> Vec<(T, D)> {
        self.handles()
            .into_iter()
            .map(|handle| self.destroy_resource(handle))
            .collect()
    }

    fn live_slots(&self) -> impl Iterator<Item = (usize, &Slot<T, D>)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.is_valid)
    }

    fn checked_index(&self, handle: Handle<K>, action: &str) -> usize {
        let index = handle.index() as usize;
        let Some(slot) = self.slots.get(index) else {
            fatal!(
                "cannot {} {} {:?}: index out of range (capacity {})",
                action,
                self.label,
                handle,
                self.slots.len()
            );
        };
        if !slot.is_valid || slot.generation != handle.generation() {
            fatal!(
                "cannot {} {} {:?}: stale handle (slot generation {}, live: {})",
                action,
                self.label,
                handle,
                slot.generation,
                slot.is_valid
            );
        }
        index
    }
}

impl<T, D, K> fmt::Debug for ResourcePool<T, D, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("label", &self.label)
            .field("count", &self.count)
            .field("capacity", &self.slots.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::BufferKind;

    type TestPool = ResourcePool<u64, &'static str, BufferKind>;

    #[test]
    fn test_first_allocation_is_index_zero() {
        let mut pool = TestPool::new("test", 4);
        let handle = pool.create_resource(10, "a", "first");
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.generation(), 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_lifo_reuse_bumps_generation() {
        let mut pool = TestPool::new("test", 4);
        let a = pool.create_resource(1, "a", "a");
        let b = pool.create_resource(2, "b", "b");
        let _c = pool.create_resource(3, "c", "c");

        pool.destroy_resource(b);
        let reused = pool.create_resource(4, "d", "d");
        assert_eq!(reused.index(), b.index());
        assert_eq!(reused.generation(), b.generation() + 1);
        assert!(!pool.is_valid(b));
        assert!(pool.is_valid(a));
        assert_eq!(*pool.get(reused), 4);
    }

    #[test]
    fn test_destroy_returns_payload() {
        let mut pool = TestPool::new("test", 2);
        let handle = pool.create_resource(99, "desc", "named");
        let (data, desc) = pool.destroy_resource(handle);
        assert_eq!(data, 99);
        assert_eq!(desc, "desc");
        assert!(pool.is_empty());
        assert!(pool.try_get(handle).is_none());
    }

    #[test]
    fn test_metadata_lists_live_resources_only() {
        let mut pool = TestPool::new("test", 4);
        let a = pool.create_resource(1, "a", "alpha");
        let b = pool.create_resource(2, "b", "beta");
        pool.destroy_resource(a);

        let metadata = pool.metadata();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].name, "beta");
        assert_eq!(metadata[0].handle, b);
        assert_eq!(pool.descriptors(), vec![&"b"]);
    }

    #[test]
    fn test_drain_invalidates_everything() {
        let mut pool = TestPool::new("test", 3);
        let handles: Vec<_> = (0..3).map(|i| pool.create_resource(i, "x", "x")).collect();
        let drained = pool.drain();
        assert_eq!(drained.len(), 3);
        assert!(handles.iter().all(|h| !pool.is_valid(*h)));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_double_destroy_is_fatal() {
        let mut pool = TestPool::new("test", 2);
        let handle = pool.create_resource(1, "a", "a");
        pool.destroy_resource(handle);
        pool.destroy_resource(handle);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_stale_access_is_fatal() {
        let mut pool = TestPool::new("test", 2);
        let handle = pool.create_resource(1, "a", "a");
        pool.destroy_resource(handle);
        let _ = pool.create_resource(2, "b", "b");
        let _ = pool.get(handle);
    }

    #[test]
    #[should_panic(expected = "pool exhausted")]
    fn test_exhaustion_is_fatal() {
        let mut pool = TestPool::new("test", 1);
        let _ = pool.create_resource(1, "a", "a");
        let _ = pool.create_resource(2, "b", "b");
    }
}
