//! GPU backend abstraction layer.
//!
//! This is the narrow "GPU operations" interface the registries, the
//! descriptor allocator and the pipeline builder are written against. A
//! backend creates and destroys native objects, maps host-visible memory,
//! names objects for debug tooling and executes short command sequences
//! synchronously. It has no knowledge of handles, pools or registries.
//!
//! # Available Backends
//!
//! - `dummy` (always available): host-memory simulation for tests and tooling
//! - `vulkan-backend`: native Vulkan backend using ash and gpu-allocator
//!
//! # Native objects
//!
//! Buffers and images own memory and are passed by value into the matching
//! `destroy_*` call. Every other native object is a small `Copy` handle.
//! Nothing is released on drop: the resource registries route destruction
//! through a [`DeferredDestructor`](crate::resources::DeferredDestructor).

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;

use std::sync::Arc;

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::Allocation;
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, DescriptorBinding, DescriptorPoolSize, DescriptorType, GraphicsPipelineDesc,
    ImageDescriptor, ImageFormat, ImageLayout, IndexFormat, MemoryAccess, PushConstantRange,
    RenderPassDescriptor, SamplerDescriptor, TransitionMasks,
};

pub use dummy::{DummyBackend, LiveObjects, RecordedBarrier, RecordedCommand, SubmitStats};

/// Handle to a GPU buffer and its memory.
pub enum GpuBuffer {
    /// Host-memory buffer owned by the dummy backend.
    Dummy {
        id: u64,
        data: Arc<Mutex<Vec<u8>>>,
        access: MemoryAccess,
    },
    /// Vulkan backend buffer
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        buffer: vk::Buffer,
        allocation: Mutex<Option<Allocation>>,
        size: u64,
        access: MemoryAccess,
    },
}

impl GpuBuffer {
    /// Size of the buffer in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Dummy { data, .. } => data.lock().len() as u64,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { size, .. } => *size,
        }
    }

    /// Memory placement the buffer was created with.
    pub fn access(&self) -> MemoryAccess {
        match self {
            Self::Dummy { access, .. } => *access,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { access, .. } => *access,
        }
    }

    /// Identifier of a dummy buffer.
    pub fn dummy_id(&self) -> Option<u64> {
        match self {
            Self::Dummy { id, .. } => Some(*id),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { .. } => None,
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { id, access, .. } => f
                .debug_struct("GpuBuffer::Dummy")
                .field("id", id)
                .field("access", access)
                .finish_non_exhaustive(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, size, .. } => f
                .debug_struct("GpuBuffer::Vulkan")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a 2D GPU image, its default view and its memory.
pub enum GpuImage {
    /// Host-memory image owned by the dummy backend.
    Dummy {
        id: u64,
        data: Arc<Mutex<Vec<u8>>>,
        width: u32,
        height: u32,
        format: ImageFormat,
    },
    /// Vulkan backend image
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        image: vk::Image,
        view: vk::ImageView,
        allocation: Mutex<Option<Allocation>>,
        format: vk::Format,
        extent: vk::Extent3D,
        aspect: vk::ImageAspectFlags,
    },
}

impl GpuImage {
    /// Identifier of a dummy image.
    pub fn dummy_id(&self) -> Option<u64> {
        match self {
            Self::Dummy { id, .. } => Some(*id),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { .. } => None,
        }
    }
}

impl std::fmt::Debug for GpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy {
                id,
                width,
                height,
                format,
                ..
            } => f
                .debug_struct("GpuImage::Dummy")
                .field("id", id)
                .field("width", width)
                .field("height", height)
                .field("format", format)
                .finish_non_exhaustive(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan {
                image,
                view,
                format,
                extent,
                ..
            } => f
                .debug_struct("GpuImage::Vulkan")
                .field("image", image)
                .field("view", view)
                .field("format", format)
                .field("extent", extent)
                .finish_non_exhaustive(),
        }
    }
}

/// Declares a `Copy` handle enum with a dummy id and a Vulkan variant.
macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident, $vk:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            /// Dummy backend object.
            Dummy { id: u64 },
            /// Vulkan backend object.
            #[cfg(feature = "vulkan-backend")]
            Vulkan($vk),
        }

        impl $name {
            /// Identifier of a dummy object.
            pub fn dummy_id(&self) -> Option<u64> {
                match self {
                    Self::Dummy { id } => Some(*id),
                    #[cfg(feature = "vulkan-backend")]
                    Self::Vulkan(_) => None,
                }
            }
        }
    };
}

native_handle!(
    /// Handle to a GPU sampler.
    GpuSampler,
    vk::Sampler
);
native_handle!(
    /// Handle to a compiled shader module.
    GpuShaderModule,
    vk::ShaderModule
);
native_handle!(
    /// Handle to a descriptor set layout.
    GpuDescriptorSetLayout,
    vk::DescriptorSetLayout
);
native_handle!(
    /// Handle to a descriptor pool.
    GpuDescriptorPool,
    vk::DescriptorPool
);
native_handle!(
    /// Handle to a pipeline layout.
    GpuPipelineLayout,
    vk::PipelineLayout
);
native_handle!(
    /// Handle to a graphics pipeline.
    GpuPipeline,
    vk::Pipeline
);
native_handle!(
    /// Handle to a render pass.
    GpuRenderPass,
    vk::RenderPass
);
native_handle!(
    /// Handle to a command buffer in the recording state.
    GpuCommandBuffer,
    vk::CommandBuffer
);

/// Handle to a descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuDescriptorSet {
    /// Dummy backend set, tagged with the pool it was carved from.
    Dummy { id: u64, pool: u64 },
    /// Vulkan backend set.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::DescriptorSet),
}

/// Device limits the registries and the pipeline builder check against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceLimits {
    /// Required alignment of uniform buffer offsets, in bytes.
    pub min_uniform_buffer_offset_alignment: u64,
    /// Total push-constant budget, in bytes.
    pub max_push_constants_size: u32,
    /// Maximum number of simultaneous viewports.
    pub max_viewports: u32,
    /// Maximum width/height of a 2D image.
    pub max_image_dimension_2d: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_uniform_buffer_offset_alignment: 256,
            max_push_constants_size: 128,
            max_viewports: 16,
            max_image_dimension_2d: 16384,
        }
    }
}

/// Optional device features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceFeatures {
    /// Line and point polygon modes.
    pub fill_mode_non_solid: bool,
    /// More than one viewport per pipeline.
    pub multi_viewport: bool,
    /// Debug object naming is available.
    pub debug_utils: bool,
}

impl Default for DeviceFeatures {
    fn default() -> Self {
        Self {
            fill_mode_non_solid: true,
            multi_viewport: true,
            debug_utils: true,
        }
    }
}

/// A command executed by [`GpuBackend::submit_immediate`].
#[derive(Debug)]
pub enum GpuCommand<'a> {
    /// Layout transition barrier over the whole image.
    ImageBarrier {
        image: &'a GpuImage,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        masks: TransitionMasks,
    },
    /// Copy `size` bytes from the start of `src` to the start of `dst`.
    CopyBuffer {
        src: &'a GpuBuffer,
        dst: &'a GpuBuffer,
        size: u64,
    },
    /// Copy tightly packed texels into the whole image.
    ///
    /// `dst` must be in `TransferDst` layout.
    CopyBufferToImage {
        src: &'a GpuBuffer,
        dst: &'a GpuImage,
        width: u32,
        height: u32,
    },
    /// Copy the whole image into a tightly packed buffer.
    ///
    /// `src` must be in `TransferSrc` layout.
    CopyImageToBuffer {
        src: &'a GpuImage,
        dst: &'a GpuBuffer,
        width: u32,
        height: u32,
    },
    /// Copy one image into another of the same extent.
    ///
    /// `src` must be in `TransferSrc` and `dst` in `TransferDst` layout.
    CopyImage {
        src: &'a GpuImage,
        dst: &'a GpuImage,
        width: u32,
        height: u32,
    },
}

/// A single descriptor update.
#[derive(Debug)]
pub enum DescriptorWrite<'a> {
    /// Point a buffer binding at a byte range.
    Buffer {
        binding: u32,
        ty: DescriptorType,
        buffer: &'a GpuBuffer,
        offset: u64,
        range: u64,
    },
    /// Point an image binding at an image (and sampler).
    Image {
        binding: u32,
        ty: DescriptorType,
        image: &'a GpuImage,
        sampler: Option<GpuSampler>,
        layout: ImageLayout,
    },
}

/// A native object that can carry a debug name.
#[derive(Debug, Clone, Copy)]
pub enum DebugObject<'a> {
    Buffer(&'a GpuBuffer),
    Image(&'a GpuImage),
    Sampler(GpuSampler),
    ShaderModule(GpuShaderModule),
    DescriptorSetLayout(GpuDescriptorSetLayout),
    DescriptorPool(GpuDescriptorPool),
    PipelineLayout(GpuPipelineLayout),
    Pipeline(GpuPipeline),
    RenderPass(GpuRenderPass),
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Limits of the selected device.
    fn limits(&self) -> DeviceLimits;

    /// Optional features enabled on the selected device.
    fn features(&self) -> DeviceFeatures;

    /// Block until the device has finished all submitted work.
    fn wait_idle(&self) -> Result<(), GraphicsError>;

    /// Create a buffer and bind memory to it.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Release a buffer and its memory.
    fn destroy_buffer(&self, buffer: GpuBuffer);

    /// Write into a host-visible buffer through its mapping.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8])
    -> Result<(), GraphicsError>;

    /// Read from a host-visible buffer through its mapping.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64)
    -> Result<Vec<u8>, GraphicsError>;

    /// Create a 2D image, its memory and its default view.
    ///
    /// The image starts out in `Undefined` layout.
    fn create_image(&self, descriptor: &ImageDescriptor) -> Result<GpuImage, GraphicsError>;

    /// Release an image, its view and its memory.
    fn destroy_image(&self, image: GpuImage);

    /// Create a sampler.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError>;

    /// Release a sampler.
    fn destroy_sampler(&self, sampler: GpuSampler);

    /// Record `commands`, submit them and block until they complete.
    fn submit_immediate(&self, commands: &[GpuCommand<'_>]) -> Result<(), GraphicsError>;

    /// Allocate a primary command buffer and begin recording.
    fn create_command_buffer(&self) -> Result<GpuCommandBuffer, GraphicsError>;

    /// Free a command buffer.
    fn free_command_buffer(&self, cmd: GpuCommandBuffer);

    /// Record a vertex buffer binding.
    fn cmd_bind_vertex_buffer(&self, cmd: GpuCommandBuffer, binding: u32, buffer: &GpuBuffer);

    /// Record an index buffer binding.
    fn cmd_bind_index_buffer(&self, cmd: GpuCommandBuffer, buffer: &GpuBuffer, format: IndexFormat);

    /// Create a descriptor set layout.
    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<GpuDescriptorSetLayout, GraphicsError>;

    /// Release a descriptor set layout.
    fn destroy_descriptor_set_layout(&self, layout: GpuDescriptorSetLayout);

    /// Create a descriptor pool for `max_sets` sets.
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<GpuDescriptorPool, GraphicsError>;

    /// Carve a set out of a pool.
    ///
    /// Fails with [`GraphicsError::OutOfPoolMemory`] or
    /// [`GraphicsError::FragmentedPool`] when the pool cannot hold the set.
    fn allocate_descriptor_set(
        &self,
        pool: GpuDescriptorPool,
        layout: GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError>;

    /// Return every set of a pool to it.
    fn reset_descriptor_pool(&self, pool: GpuDescriptorPool) -> Result<(), GraphicsError>;

    /// Release a descriptor pool and every set carved from it.
    fn destroy_descriptor_pool(&self, pool: GpuDescriptorPool);

    /// Apply descriptor writes to a set.
    fn update_descriptor_set(&self, set: GpuDescriptorSet, writes: &[DescriptorWrite<'_>]);

    /// Create a shader module from SPIR-V words.
    fn create_shader_module(&self, spirv: &[u32]) -> Result<GpuShaderModule, GraphicsError>;

    /// Release a shader module.
    fn destroy_shader_module(&self, module: GpuShaderModule);

    /// Create a single-subpass render pass.
    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<GpuRenderPass, GraphicsError>;

    /// Release a render pass.
    fn destroy_render_pass(&self, render_pass: GpuRenderPass);

    /// Create a pipeline layout.
    fn create_pipeline_layout(
        &self,
        set_layouts: &[GpuDescriptorSetLayout],
        push_constants: &[PushConstantRange],
    ) -> Result<GpuPipelineLayout, GraphicsError>;

    /// Release a pipeline layout.
    fn destroy_pipeline_layout(&self, layout: GpuPipelineLayout);

    /// Create a graphics pipeline from a validated description.
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: GpuPipelineLayout,
        render_pass: GpuRenderPass,
        subpass: u32,
    ) -> Result<GpuPipeline, GraphicsError>;

    /// Release a pipeline.
    fn destroy_pipeline(&self, pipeline: GpuPipeline);

    /// Attach a debug name to an object.
    ///
    /// A silent no-op when the device has no debug naming support.
    fn set_debug_name(&self, object: DebugObject<'_>, name: &str);
}

/// Parameters for backend creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendParameters {
    /// Enable validation layers when available.
    pub validation: bool,
    /// Application name reported to the driver.
    pub app_name: String,
}

impl BackendParameters {
    /// Create parameters with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }
}

impl Default for BackendParameters {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            app_name: "RedLilium".to_string(),
        }
    }
}

/// Selects and creates the appropriate backend based on available features.
pub fn create_backend(params: &BackendParameters) -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    #[cfg(feature = "vulkan-backend")]
    {
        match vulkan::VulkanBackend::with_params(params) {
            Ok(backend) => {
                log::info!("Using Vulkan backend (ash)");
                return Ok(Arc::new(backend));
            }
            Err(e) => {
                log::warn!("Failed to create Vulkan backend: {}", e);
            }
        }
    }
    #[cfg(not(feature = "vulkan-backend"))]
    let _ = params;

    log::info!("Using dummy backend");
    Ok(Arc::new(DummyBackend::new()))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "vulkan-backend")
}
