//! Batched descriptor set updates.

use crate::backend::{DescriptorWrite, GpuBackend, GpuBuffer, GpuDescriptorSet, GpuImage, GpuSampler};
use crate::error::fatal;
use crate::types::{DescriptorType, ImageLayout};

/// Collects descriptor writes and applies them to a set in one call.
///
/// The writer borrows the native objects it points at, so it cannot outlive
/// the registry entries it was filled from.
#[derive(Debug, Default)]
pub struct DescriptorWriter<'a> {
    writes: Vec<DescriptorWrite<'a>>,
}

impl<'a> DescriptorWriter<'a> {
    pub fn new() -> Self {
        Self { writes: Vec::new() }
    }

    /// Point `binding` at `size` bytes of `buffer` starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not a buffer descriptor type.
    pub fn write_buffer(
        &mut self,
        binding: u32,
        buffer: &'a GpuBuffer,
        size: u64,
        offset: u64,
        ty: DescriptorType,
    ) -> &mut Self {
        if !ty.is_buffer() {
            fatal!("binding {}: {:?} cannot hold a buffer", binding, ty);
        }
        self.writes.push(DescriptorWrite::Buffer {
            binding,
            ty,
            buffer,
            offset,
            range: size,
        });
        self
    }

    /// Point `binding` at `image`, read in `layout`, with an optional sampler.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is a buffer descriptor type.
    pub fn write_image(
        &mut self,
        binding: u32,
        image: &'a GpuImage,
        sampler: Option<GpuSampler>,
        layout: ImageLayout,
        ty: DescriptorType,
    ) -> &mut Self {
        if ty.is_buffer() {
            fatal!("binding {}: {:?} cannot hold an image", binding, ty);
        }
        if ty == DescriptorType::CombinedImageSampler && sampler.is_none() {
            fatal!("binding {}: combined image sampler needs a sampler", binding);
        }
        self.writes.push(DescriptorWrite::Image {
            binding,
            ty,
            image,
            sampler,
            layout,
        });
        self
    }

    /// Number of pending writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Drop every pending write.
    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Apply the pending writes to `set`.
    pub fn update_set(&self, backend: &dyn GpuBackend, set: GpuDescriptorSet) {
        if self.writes.is_empty() {
            return;
        }
        backend.update_descriptor_set(set, &self.writes);
    }
}
