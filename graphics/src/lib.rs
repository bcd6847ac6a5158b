//! # RedLilium GPU
//!
//! GPU resource registry, descriptor allocation and pipeline building for the
//! RedLilium renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ResourcePool`] - Fixed-capacity pool with generation-checked handles
//! - [`BufferRegistry`] / [`ImageRegistry`] - Native buffers and images behind
//!   handles, with synchronous uploads and image layout tracking
//! - [`DeferredDestructor`] - Frame-delayed release of native objects
//! - [`DescriptorAllocator`] - Growable pool-of-pools for descriptor sets
//! - [`build_graphics_pipeline`] - Pipeline creation from an immutable
//!   [`GraphicsPipelineDesc`]
//! - [`GpuBackend`] - The narrow GPU interface everything above is written
//!   against, with Vulkan and Dummy (for testing) implementations
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use redlilium_gpu::{
//!     BufferDesc, BufferType, CoreConfig, DummyBackend, MemoryAccess, ResourceContext,
//! };
//!
//! let backend = Arc::new(DummyBackend::new());
//! let mut context = ResourceContext::new(backend, CoreConfig::default()).unwrap();
//!
//! let vertices = context
//!     .buffers_mut()
//!     .create_buffer(
//!         BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 3, 12),
//!         "triangle",
//!     )
//!     .unwrap();
//! context.buffers_mut().update_buffer(vertices, &[0u8; 36]).unwrap();
//! context.buffers_mut().destroy_buffer(vertices);
//! context.advance_frame();
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod pipeline;
pub mod pool;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BackendParameters, DeviceFeatures, DeviceLimits, DummyBackend, GpuBackend, create_backend,
    has_gpu_backend,
};
pub use config::CoreConfig;
pub use context::ResourceContext;
pub use descriptor::{DescriptorAllocator, DescriptorLayoutBuilder, DescriptorWriter};
pub use error::GraphicsError;
pub use handle::{BufferHandle, Handle, ImageHandle};
pub use pipeline::{Pipeline, PipelineInfo, build_graphics_pipeline};
pub use pool::{ResourceMetadata, ResourcePool};
pub use resources::{BufferRegistry, DeferredDestructor, ImageRegistry};
pub use types::{
    BufferDesc, BufferType, GraphicsPipelineDesc, ImageDesc, ImageFormat, ImageLayout, ImageType,
    MemoryAccess, PoolSizeRatio,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("RedLilium GPU v{} initialized", VERSION);
}

// The context and its parts are shared across threads behind external locks.
static_assertions::assert_impl_all!(ResourceContext: Send, Sync);
static_assertions::assert_impl_all!(DeferredDestructor: Send, Sync);
static_assertions::assert_impl_all!(BufferHandle: Send, Sync, Copy);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
