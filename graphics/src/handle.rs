//! Generation-checked resource handles.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Opaque reference to a pooled resource.
///
/// A handle is only valid while its `generation` matches the generation of
/// the slot at `index`. Destroying the resource bumps the slot generation, so
/// every copy of the old handle stops validating.
///
/// The `K` parameter tags the handle with the kind of resource it refers to,
/// so a buffer handle cannot be passed where an image handle is expected.
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    /// Slot index inside the owning pool.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

/// Marker for buffer handles.
#[derive(Debug)]
pub enum BufferKind {}

/// Marker for image handles.
#[derive(Debug)]
pub enum ImageKind {}

/// Handle to a buffer owned by a [`BufferRegistry`](crate::resources::BufferRegistry).
pub type BufferHandle = Handle<BufferKind>;

/// Handle to an image owned by an [`ImageRegistry`](crate::resources::ImageRegistry).
pub type ImageHandle = Handle<ImageKind>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handle_equality_includes_generation() {
        let a = BufferHandle::new(3, 0);
        let b = BufferHandle::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a, BufferHandle::new(3, 0));
    }

    #[test]
    fn test_handle_is_hashable() {
        let mut set = HashSet::new();
        set.insert(ImageHandle::new(0, 0));
        set.insert(ImageHandle::new(0, 0));
        set.insert(ImageHandle::new(1, 0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_handle_debug_format() {
        let handle = BufferHandle::new(7, 2);
        assert_eq!(format!("{handle:?}"), "Handle(7v2)");
    }
}
