//! Image registry with layout tracking.
//!
//! Every image carries its current layout. All layout changes go through
//! [`ImageRegistry::transition_image_layout`], which records exactly one
//! barrier per real change and none for a self-transition. Upload and copy
//! helpers move images into transfer layouts and restore the layout they
//! found them in.

use std::sync::Arc;

use crate::backend::{DebugObject, GpuBackend, GpuBuffer, GpuCommand, GpuImage};
use crate::error::{GraphicsError, fatal};
use crate::handle::{ImageHandle, ImageKind};
use crate::pool::{ResourceMetadata, ResourcePool};
use crate::types::{
    BufferDescriptor, ImageDesc, ImageDescriptor, ImageLayout, LayoutTransitionTable,
    transition_masks,
};

use super::deferred::{DeferredDestructor, DeferredResource};

/// Registry of GPU images.
pub struct ImageRegistry {
    backend: Arc<dyn GpuBackend>,
    deferred: Arc<DeferredDestructor>,
    pool: ResourcePool<GpuImage, ImageDesc, ImageKind>,
    /// Reject transitions the image type can never make.
    strict: bool,
}

impl ImageRegistry {
    /// Create a registry with room for `capacity` images.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        deferred: Arc<DeferredDestructor>,
        capacity: u32,
        strict: bool,
    ) -> Self {
        log::debug!(
            "Creating image registry (capacity: {}, strict layouts: {})",
            capacity,
            strict
        );
        Self {
            backend,
            deferred,
            pool: ResourcePool::new("image", capacity),
            strict,
        }
    }

    /// Allocate an image and move it into the initial layout for its type.
    ///
    /// Textures land in `ShaderReadOnly`, render targets in
    /// `ColorAttachment` and depth buffers in `DepthStencilAttachment`.
    pub fn create_image(&mut self, desc: ImageDesc, name: &str) -> Result<ImageHandle, GraphicsError> {
        let desc = ImageDesc::new(desc.ty, desc.format, desc.width, desc.height);
        let descriptor = ImageDescriptor::new_2d(
            desc.width,
            desc.height,
            desc.format,
            desc.ty.usage(),
            desc.ty.aspect(desc.format),
        )
        .with_label(name);

        let image = self.backend.create_image(&descriptor)?;
        self.backend.set_debug_name(DebugObject::Image(&image), name);
        let handle = self.pool.create_resource(image, desc, name);

        if let Err(e) = self.transition_image_layout(handle, desc.ty.initial_layout()) {
            let (image, _) = self.pool.destroy_resource(handle);
            self.backend.destroy_image(image);
            return Err(e);
        }

        log::trace!(
            "Created image '{}' {:?} ({:?}, {}x{} {:?})",
            name,
            handle,
            desc.ty,
            desc.width,
            desc.height,
            desc.format
        );
        Ok(handle)
    }

    /// Move the image into `target`.
    ///
    /// Records a single barrier and waits for it. Does nothing when the
    /// image is already in `target`. A transition without a precise barrier
    /// (such as back to `Undefined`) uses conservative masks, or is fatal
    /// in strict mode, as is any transition the image type cannot make.
    pub fn transition_image_layout(
        &mut self,
        handle: ImageHandle,
        target: ImageLayout,
    ) -> Result<(), GraphicsError> {
        let desc = *self.pool.desc(handle);
        let current = desc.layout_history.current();
        if current == target {
            return Ok(());
        }

        let masks = transition_masks(current, target);
        if self.strict {
            let table = LayoutTransitionTable::from_usage(desc.ty.usage());
            if !table.is_valid_transition(current, target) || masks.fallback {
                fatal!(
                    "illegal layout transition {:?} -> {:?} for {:?} image '{}' (valid: {:?})",
                    current,
                    target,
                    desc.ty,
                    self.pool.name(handle),
                    table.valid_destinations(current)
                );
            }
        }

        // No barrier may name `Undefined` as its new layout. The contents
        // are dropped and the next transition starts from scratch.
        if target == ImageLayout::Undefined {
            self.pool.desc_mut(handle).layout_history.push(target);
            log::warn!(
                "Image '{}' {:?} moved to Undefined, contents discarded",
                self.pool.name(handle),
                handle
            );
            return Ok(());
        }

        self.backend.submit_immediate(&[GpuCommand::ImageBarrier {
            image: self.pool.get(handle),
            old_layout: current,
            new_layout: target,
            masks,
        }])?;
        self.pool.desc_mut(handle).layout_history.push(target);

        log::trace!(
            "Transitioned image {:?} {:?} -> {:?}",
            handle,
            current,
            target
        );
        Ok(())
    }

    /// Upload tightly packed pixels covering the whole image.
    ///
    /// The image is returned to the layout it was in before the call.
    ///
    /// # Panics
    ///
    /// Panics unless `pixels` is exactly `width * height * texel size`
    /// bytes long.
    pub fn write_image(&mut self, handle: ImageHandle, pixels: &[u8]) -> Result<(), GraphicsError> {
        let desc = *self.pool.desc(handle);
        let expected = desc.byte_size();
        if pixels.len() as u64 != expected {
            fatal!(
                "pixel data for image '{}' is {} bytes, expected {} ({}x{} {:?})",
                self.pool.name(handle),
                pixels.len(),
                expected,
                desc.width,
                desc.height,
                desc.format
            );
        }

        let staging = self.backend.create_buffer(&BufferDescriptor::staging(expected))?;
        let result = self.upload(handle, &staging, &desc, pixels);
        self.backend.destroy_buffer(staging);
        result
    }

    /// Copy the whole of `src` into `dst`.
    ///
    /// Both images are returned to the layouts they were in before the call.
    ///
    /// # Panics
    ///
    /// Panics if the images differ in size or are the same image.
    pub fn copy_image(&mut self, src: ImageHandle, dst: ImageHandle) -> Result<(), GraphicsError> {
        if src == dst {
            fatal!("cannot copy image {:?} onto itself", src);
        }
        let src_desc = *self.pool.desc(src);
        let dst_desc = *self.pool.desc(dst);
        if !src_desc.same_extent(&dst_desc) {
            fatal!(
                "cannot copy image '{}' ({}x{}) into '{}' ({}x{}): extents differ",
                self.pool.name(src),
                src_desc.width,
                src_desc.height,
                self.pool.name(dst),
                dst_desc.width,
                dst_desc.height
            );
        }

        let src_layout = src_desc.layout_history.current();
        let dst_layout = dst_desc.layout_history.current();

        self.transition_image_layout(src, ImageLayout::TransferSrc)?;
        self.transition_image_layout(dst, ImageLayout::TransferDst)?;
        self.backend.submit_immediate(&[GpuCommand::CopyImage {
            src: self.pool.get(src),
            dst: self.pool.get(dst),
            width: src_desc.width,
            height: src_desc.height,
        }])?;
        self.restore_layout(src, src_layout)?;
        self.restore_layout(dst, dst_layout)
    }

    /// Invalidate the handle and queue the native image for release.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_image(&mut self, handle: ImageHandle) {
        let (image, _) = self.pool.destroy_resource(handle);
        log::trace!("Destroyed image {:?}", handle);
        self.deferred.queue(DeferredResource::Image(image));
    }

    /// Destroy every live image.
    pub fn destroy_all(&mut self) {
        let drained = self.pool.drain();
        if !drained.is_empty() {
            log::debug!("Releasing {} images", drained.len());
        }
        for (image, _) in drained {
            self.deferred.queue(DeferredResource::Image(image));
        }
    }

    /// Layout the image is currently in.
    pub fn layout(&self, handle: ImageHandle) -> ImageLayout {
        self.pool.desc(handle).layout_history.current()
    }

    /// Native image behind a handle.
    pub fn native(&self, handle: ImageHandle) -> &GpuImage {
        self.pool.get(handle)
    }

    /// Description of an image, including its layout history.
    pub fn desc(&self, handle: ImageHandle) -> &ImageDesc {
        self.pool.desc(handle)
    }

    /// Whether the handle refers to a live image.
    pub fn is_valid(&self, handle: ImageHandle) -> bool {
        self.pool.is_valid(handle)
    }

    /// Whether illegal transitions are fatal.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Name and handle of every live image.
    pub fn image_metadata(&self) -> Vec<ResourceMetadata<ImageKind>> {
        self.pool.metadata()
    }

    /// Description of every live image.
    pub fn image_descriptors(&self) -> Vec<&ImageDesc> {
        self.pool.descriptors()
    }

    /// Number of live images.
    pub fn image_size(&self) -> usize {
        self.pool.len()
    }

    /// Maximum number of live images.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    fn upload(
        &mut self,
        handle: ImageHandle,
        staging: &GpuBuffer,
        desc: &ImageDesc,
        pixels: &[u8],
    ) -> Result<(), GraphicsError> {
        self.backend.write_buffer(staging, 0, pixels)?;

        let previous = desc.layout_history.current();
        self.transition_image_layout(handle, ImageLayout::TransferDst)?;
        self.backend.submit_immediate(&[GpuCommand::CopyBufferToImage {
            src: staging,
            dst: self.pool.get(handle),
            width: desc.width,
            height: desc.height,
        }])?;
        self.restore_layout(handle, previous)
    }

    /// Return to a layout saved before a transfer. Images that had no
    /// defined contents stay in their transfer layout.
    fn restore_layout(&mut self, handle: ImageHandle, layout: ImageLayout) -> Result<(), GraphicsError> {
        if layout == ImageLayout::Undefined {
            return Ok(());
        }
        self.transition_image_layout(handle, layout)
    }
}

impl std::fmt::Debug for ImageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRegistry")
            .field("backend", &self.backend.name())
            .field("live", &self.pool.len())
            .field("capacity", &self.pool.capacity())
            .field("strict", &self.strict)
            .finish()
    }
}
