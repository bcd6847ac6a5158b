//! Resource context.
//!
//! [`ResourceContext`] owns everything built on top of one backend: the
//! buffer and image registries, the descriptor allocator and the deferred
//! destructor they share. Several contexts can live side by side; none of
//! them touches global state.
//!
//! ```text
//!                     ResourceContext
//!   ┌──────────────┬───────────────┬─────────────────────┐
//!   │BufferRegistry│ ImageRegistry │ DescriptorAllocator │
//!   └──────┬───────┴───────┬───────┴──────────┬──────────┘
//!          │    destroy    │                  │
//!          ▼               ▼                  │
//!      DeferredDestructor ──advance_frame──┐  │
//!          │                               │  │
//!          ▼                               ▼  ▼
//!                 Arc<dyn GpuBackend>
//! ```

use std::sync::Arc;

use crate::backend::{GpuBackend, GpuRenderPass};
use crate::config::CoreConfig;
use crate::descriptor::DescriptorAllocator;
use crate::error::GraphicsError;
use crate::pipeline::{Pipeline, build_graphics_pipeline};
use crate::resources::{BufferRegistry, DeferredDestructor, ImageRegistry};
use crate::types::GraphicsPipelineDesc;

/// Owner of the registries and allocators for one backend.
pub struct ResourceContext {
    backend: Arc<dyn GpuBackend>,
    config: CoreConfig,
    deferred: Arc<DeferredDestructor>,
    buffers: BufferRegistry,
    images: ImageRegistry,
    descriptors: DescriptorAllocator,
    shut_down: bool,
}

impl ResourceContext {
    /// Create the registries and the first descriptor pool.
    pub fn new(backend: Arc<dyn GpuBackend>, config: CoreConfig) -> Result<Self, GraphicsError> {
        log::info!(
            "Creating resource context on {} ({} frames in flight)",
            backend.name(),
            config.frames_in_flight
        );

        let deferred = Arc::new(DeferredDestructor::new(
            backend.clone(),
            config.frames_in_flight,
        ));
        let buffers = BufferRegistry::new(backend.clone(), deferred.clone(), config.buffer_capacity);
        let images = ImageRegistry::new(
            backend.clone(),
            deferred.clone(),
            config.image_capacity,
            config.strict_layout_validation,
        );
        let descriptors = DescriptorAllocator::new(
            backend.clone(),
            config.descriptor_max_sets,
            &config.descriptor_ratios,
        )?;

        Ok(Self {
            backend,
            config,
            deferred,
            buffers,
            images,
            descriptors,
            shut_down: false,
        })
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn deferred(&self) -> &Arc<DeferredDestructor> {
        &self.deferred
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut BufferRegistry {
        &mut self.buffers
    }

    pub fn images(&self) -> &ImageRegistry {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageRegistry {
        &mut self.images
    }

    pub fn descriptors(&self) -> &DescriptorAllocator {
        &self.descriptors
    }

    pub fn descriptors_mut(&mut self) -> &mut DescriptorAllocator {
        &mut self.descriptors
    }

    /// Build a graphics pipeline on this context's backend.
    pub fn build_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        render_pass: GpuRenderPass,
        subpass: u32,
    ) -> Result<Pipeline, GraphicsError> {
        build_graphics_pipeline(self.backend.as_ref(), desc, render_pass, subpass)
    }

    /// Release a pipeline once the in-flight frames are done with it.
    pub fn destroy_pipeline(&self, pipeline: Pipeline) {
        pipeline.destroy(&self.deferred);
    }

    /// Mark the end of a frame.
    ///
    /// Objects destroyed `frames_in_flight` frames ago are released. Call
    /// this once the GPU has finished the oldest frame in flight.
    pub fn advance_frame(&self) {
        self.deferred.advance_frame();
    }

    /// Wait for the device, then release every resource the context owns.
    ///
    /// Handles issued before this call stop validating. Calling it twice is
    /// harmless.
    pub fn shutdown(&mut self) -> Result<(), GraphicsError> {
        if self.shut_down {
            return Ok(());
        }
        self.backend.wait_idle()?;

        self.buffers.destroy_all();
        self.images.destroy_all();
        self.descriptors.destroy_pools();
        self.deferred.flush_all();
        self.shut_down = true;

        log::info!("Resource context shut down");
        Ok(())
    }
}

impl std::fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceContext")
            .field("backend", &self.backend.name())
            .field("buffers", &self.buffers)
            .field("images", &self.images)
            .field("descriptors", &self.descriptors)
            .field("deferred", &self.deferred)
            .finish()
    }
}

impl Drop for ResourceContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Failed to shut down resource context: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::{BufferDesc, BufferType, ImageDesc, ImageFormat, ImageType, MemoryAccess};

    #[test]
    fn test_independent_contexts() {
        let backend = Arc::new(DummyBackend::new());
        let mut a = ResourceContext::new(backend.clone(), CoreConfig::default()).unwrap();
        let mut b = ResourceContext::new(backend.clone(), CoreConfig::default()).unwrap();
        let desc = BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 1, 4);

        let in_a = a.buffers_mut().create_buffer(desc, "a").unwrap();
        let in_b = b.buffers_mut().create_buffer(desc, "b").unwrap();

        // Both registries start from slot 0 independently.
        assert_eq!(in_a, in_b);
        a.buffers_mut().destroy_buffer(in_a);
        assert!(b.buffers().is_valid(in_b));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let backend = Arc::new(DummyBackend::new());
        let mut context = ResourceContext::new(backend.clone(), CoreConfig::default()).unwrap();

        let buffer = context
            .buffers_mut()
            .create_buffer(
                BufferDesc::new(BufferType::Storage, MemoryAccess::GpuLocal, 16, 16),
                "storage",
            )
            .unwrap();
        context
            .images_mut()
            .create_image(
                ImageDesc::new(ImageType::DepthBuffer, ImageFormat::Depth32Float, 8, 8),
                "depth",
            )
            .unwrap();
        context.buffers_mut().destroy_buffer(buffer);
        assert_eq!(context.deferred().pending_count(), 1);

        context.shutdown().unwrap();
        assert_eq!(backend.live_objects().total(), 0);

        // A second shutdown is a no-op.
        context.shutdown().unwrap();
    }

    #[test]
    fn test_drop_shuts_down() {
        let backend = Arc::new(DummyBackend::new());
        {
            let mut context =
                ResourceContext::new(backend.clone(), CoreConfig::default()).unwrap();
            context
                .images_mut()
                .create_image(
                    ImageDesc::new(ImageType::Texture, ImageFormat::Rgba8Unorm, 4, 4),
                    "texture",
                )
                .unwrap();
        }
        assert_eq!(backend.live_objects().total(), 0);
    }
}
