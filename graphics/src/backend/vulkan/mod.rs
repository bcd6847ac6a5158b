//! Native Vulkan backend implementation using ash.
//!
//! Headless: one graphics queue, no surface or swapchain. Memory comes from
//! gpu-allocator, short command sequences go through a dedicated command
//! buffer and fence, and validation output is routed into `log`.

mod allocator;
mod command;
pub(crate) mod conversion;
mod debug;
mod descriptor;
mod device;
mod instance;
mod pipeline;

use std::mem::ManuallyDrop;

use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, DescriptorBinding, DescriptorPoolSize, GraphicsPipelineDesc,
    ImageDescriptor, IndexFormat, PushConstantRange, RenderPassDescriptor, SamplerDescriptor,
};

use super::{
    BackendParameters, DebugObject, DescriptorWrite, DeviceFeatures, DeviceLimits, GpuBackend,
    GpuBuffer, GpuCommand, GpuCommandBuffer, GpuDescriptorPool, GpuDescriptorSet,
    GpuDescriptorSetLayout, GpuImage, GpuPipeline, GpuPipelineLayout, GpuRenderPass, GpuSampler,
    GpuShaderModule,
};

use self::command::ImmediateContext;
use self::conversion::{
    convert_access_flags, convert_address_mode, convert_buffer_usage, convert_compare_op,
    convert_descriptor_type, convert_filter_mode, convert_image_aspect, convert_image_format,
    convert_image_layout, convert_image_usage, convert_index_format, convert_mipmap_filter_mode,
    convert_pipeline_stages,
};

fn foreign(kind: &str) -> GraphicsError {
    GraphicsError::InvalidParameter(format!("{} does not belong to the Vulkan backend", kind))
}

/// Extracts the raw Vulkan handle from a `Copy` native handle.
macro_rules! raw_handle {
    ($fn_name:ident, $ty:ident, $vk:ty, $kind:literal) => {
        fn $fn_name(handle: $ty) -> Result<$vk, GraphicsError> {
            match handle {
                $ty::Vulkan(raw) => Ok(raw),
                $ty::Dummy { .. } => Err(foreign($kind)),
            }
        }
    };
}

raw_handle!(raw_sampler, GpuSampler, vk::Sampler, "sampler");
raw_handle!(raw_shader_module, GpuShaderModule, vk::ShaderModule, "shader module");
raw_handle!(
    raw_set_layout,
    GpuDescriptorSetLayout,
    vk::DescriptorSetLayout,
    "descriptor set layout"
);
raw_handle!(raw_pool, GpuDescriptorPool, vk::DescriptorPool, "descriptor pool");
raw_handle!(raw_pipeline_layout, GpuPipelineLayout, vk::PipelineLayout, "pipeline layout");
raw_handle!(raw_pipeline, GpuPipeline, vk::Pipeline, "pipeline");
raw_handle!(raw_render_pass, GpuRenderPass, vk::RenderPass, "render pass");
raw_handle!(raw_command_buffer, GpuCommandBuffer, vk::CommandBuffer, "command buffer");

fn raw_descriptor_set(set: GpuDescriptorSet) -> Result<vk::DescriptorSet, GraphicsError> {
    match set {
        GpuDescriptorSet::Vulkan(raw) => Ok(raw),
        GpuDescriptorSet::Dummy { .. } => Err(foreign("descriptor set")),
    }
}

fn raw_buffer(buffer: &GpuBuffer) -> Result<vk::Buffer, GraphicsError> {
    match buffer {
        GpuBuffer::Vulkan { buffer, .. } => Ok(*buffer),
        GpuBuffer::Dummy { .. } => Err(foreign("buffer")),
    }
}

/// Raw image, its view and the aspect used for barriers and copies.
fn raw_image(
    image: &GpuImage,
) -> Result<(vk::Image, vk::ImageView, vk::ImageAspectFlags), GraphicsError> {
    match image {
        GpuImage::Vulkan {
            image,
            view,
            aspect,
            ..
        } => Ok((*image, *view, *aspect)),
        GpuImage::Dummy { .. } => Err(foreign("image")),
    }
}

/// Copies touch the depth aspect only; stencil is never uploaded.
fn copy_aspect(aspect: vk::ImageAspectFlags) -> vk::ImageAspectFlags {
    if aspect.contains(vk::ImageAspectFlags::DEPTH) {
        vk::ImageAspectFlags::DEPTH
    } else {
        aspect
    }
}

fn subresource_layers(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: copy_aspect(aspect),
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn extent(width: u32, height: u32) -> vk::Extent3D {
    vk::Extent3D {
        width,
        height,
        depth: 1,
    }
}

/// A [`GpuCommand`] with every handle resolved, ready to record.
enum RawCommand {
    Barrier {
        barrier: vk::ImageMemoryBarrier<'static>,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    },
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        region: vk::BufferCopy,
    },
    CopyBufferToImage {
        src: vk::Buffer,
        dst: vk::Image,
        region: vk::BufferImageCopy,
    },
    CopyImageToBuffer {
        src: vk::Image,
        dst: vk::Buffer,
        region: vk::BufferImageCopy,
    },
    CopyImage {
        src: vk::Image,
        dst: vk::Image,
        region: vk::ImageCopy,
    },
}

impl RawCommand {
    fn resolve(command: &GpuCommand<'_>) -> Result<Self, GraphicsError> {
        let raw = match command {
            GpuCommand::ImageBarrier {
                image,
                old_layout,
                new_layout,
                masks,
            } => {
                let (image, _, aspect) = raw_image(image)?;
                let barrier = vk::ImageMemoryBarrier::default()
                    .old_layout(convert_image_layout(*old_layout))
                    .new_layout(convert_image_layout(*new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: aspect,
                        base_mip_level: 0,
                        level_count: vk::REMAINING_MIP_LEVELS,
                        base_array_layer: 0,
                        layer_count: vk::REMAINING_ARRAY_LAYERS,
                    })
                    .src_access_mask(convert_access_flags(masks.src_access))
                    .dst_access_mask(convert_access_flags(masks.dst_access));
                Self::Barrier {
                    barrier,
                    src_stage: convert_pipeline_stages(masks.src_stage),
                    dst_stage: convert_pipeline_stages(masks.dst_stage),
                }
            }
            GpuCommand::CopyBuffer { src, dst, size } => Self::CopyBuffer {
                src: raw_buffer(src)?,
                dst: raw_buffer(dst)?,
                region: vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: *size,
                },
            },
            GpuCommand::CopyBufferToImage {
                src,
                dst,
                width,
                height,
            } => {
                let (image, _, aspect) = raw_image(dst)?;
                Self::CopyBufferToImage {
                    src: raw_buffer(src)?,
                    dst: image,
                    region: vk::BufferImageCopy::default()
                        .image_subresource(subresource_layers(aspect))
                        .image_extent(extent(*width, *height)),
                }
            }
            GpuCommand::CopyImageToBuffer {
                src,
                dst,
                width,
                height,
            } => {
                let (image, _, aspect) = raw_image(src)?;
                Self::CopyImageToBuffer {
                    src: image,
                    dst: raw_buffer(dst)?,
                    region: vk::BufferImageCopy::default()
                        .image_subresource(subresource_layers(aspect))
                        .image_extent(extent(*width, *height)),
                }
            }
            GpuCommand::CopyImage {
                src,
                dst,
                width,
                height,
            } => {
                let (src, _, src_aspect) = raw_image(src)?;
                let (dst, _, dst_aspect) = raw_image(dst)?;
                Self::CopyImage {
                    src,
                    dst,
                    region: vk::ImageCopy::default()
                        .src_subresource(subresource_layers(src_aspect))
                        .dst_subresource(subresource_layers(dst_aspect))
                        .extent(extent(*width, *height)),
                }
            }
        };
        Ok(raw)
    }

    /// # Safety
    ///
    /// `cmd` must be recording and every handle must be alive.
    unsafe fn record(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            match self {
                Self::Barrier {
                    barrier,
                    src_stage,
                    dst_stage,
                } => device.cmd_pipeline_barrier(
                    cmd,
                    *src_stage,
                    *dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    std::slice::from_ref(barrier),
                ),
                Self::CopyBuffer { src, dst, region } => {
                    device.cmd_copy_buffer(cmd, *src, *dst, std::slice::from_ref(region))
                }
                Self::CopyBufferToImage { src, dst, region } => device.cmd_copy_buffer_to_image(
                    cmd,
                    *src,
                    *dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(region),
                ),
                Self::CopyImageToBuffer { src, dst, region } => device.cmd_copy_image_to_buffer(
                    cmd,
                    *src,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    *dst,
                    std::slice::from_ref(region),
                ),
                Self::CopyImage { src, dst, region } => device.cmd_copy_image(
                    cmd,
                    *src,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    *dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(region),
                ),
            }
        }
    }
}

/// Vulkan-based GPU backend using ash.
///
/// This backend provides native Vulkan access with:
/// - Validation layers when requested and installed
/// - gpu-allocator for memory management
/// - Classic single-subpass render passes (Vulkan 1.2)
/// - Debug object names through VK_EXT_debug_utils
pub struct VulkanBackend {
    /// Vulkan entry points (function loader). Kept alive for the instance.
    #[allow(dead_code)]
    entry: ash::Entry,
    /// Vulkan instance.
    instance: ash::Instance,
    /// Debug messenger for validation layer output.
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    /// Debug utils extension instance.
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    /// Debug utils device functions, used for object names.
    debug_utils_device: Option<ash::ext::debug_utils::Device>,
    /// Selected physical device.
    physical_device: vk::PhysicalDevice,
    /// Logical device.
    device: ash::Device,
    /// Graphics queue, guarded by `immediate`.
    graphics_queue: vk::Queue,
    /// Memory allocator. Dropped by hand before the device.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Command buffer and fence for blocking submissions.
    immediate: Mutex<ImmediateContext>,
    /// Pool for command buffers handed out to callers.
    command_pool: Mutex<vk::CommandPool>,
    limits: DeviceLimits,
    features: DeviceFeatures,
    validation_enabled: bool,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("physical_device", &self.physical_device)
            .field("limits", &self.limits)
            .field("features", &self.features)
            .field("validation_enabled", &self.validation_enabled)
            .finish()
    }
}

impl VulkanBackend {
    /// Create a new Vulkan backend with default parameters.
    pub fn new() -> Result<Self, GraphicsError> {
        Self::with_params(&BackendParameters::default())
    }

    /// Create a new Vulkan backend.
    ///
    /// This initializes the Vulkan instance, selects a physical device,
    /// creates a logical device, and sets up the memory allocator.
    pub fn with_params(params: &BackendParameters) -> Result<Self, GraphicsError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to load Vulkan: {}", e))
        })?;

        let bundle = instance::create_instance(&entry, params.validation, &params.app_name)?;
        let instance = bundle.instance;
        let validation_enabled = bundle.debug_messenger.is_some();

        let physical_device = device::select_physical_device(&instance)?;
        let graphics_queue_family = device::find_graphics_queue_family(&instance, physical_device)?;

        let limits = device::query_limits(&instance, physical_device);
        let features =
            device::query_features(&instance, physical_device, bundle.debug_utils.is_some());

        let device = device::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            &features,
        )?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        let allocator = allocator::create_allocator(&instance, physical_device, device.clone())?;

        let immediate = ImmediateContext::new(&device, graphics_queue_family)?;
        let command_pool = command::create_command_pool(&device, graphics_queue_family)?;

        let debug_utils_device = bundle
            .debug_utils
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));

        log::info!(
            "Vulkan backend initialized (validation: {}, uniform alignment: {}, push constants: {})",
            validation_enabled,
            limits.min_uniform_buffer_offset_alignment,
            limits.max_push_constants_size
        );

        Ok(Self {
            entry,
            instance,
            debug_messenger: bundle.debug_messenger,
            debug_utils: bundle.debug_utils,
            debug_utils_device,
            physical_device,
            device,
            graphics_queue,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            immediate: Mutex::new(immediate),
            command_pool: Mutex::new(command_pool),
            limits,
            features,
            validation_enabled,
        })
    }

    /// Get the Vulkan device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Whether validation layers are active.
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    fn allocate_memory(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: gpu_allocator::MemoryLocation,
        linear: bool,
    ) -> Result<gpu_allocator::vulkan::Allocation, GraphicsError> {
        self.allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| allocator::allocation_error(name, e))
    }

    fn free_memory(&self, allocation: &Mutex<Option<gpu_allocator::vulkan::Allocation>>) {
        if let Some(allocation) = allocation.lock().take()
            && let Err(e) = self.allocator.lock().free(allocation)
        {
            log::error!("Failed to free GPU memory: {}", e);
        }
    }

    /// Mapped host pointer range of a buffer, checked against its size.
    fn with_mapping<R>(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        len: u64,
        f: impl FnOnce(*mut u8) -> R,
    ) -> Result<R, GraphicsError> {
        let GpuBuffer::Vulkan {
            allocation,
            size,
            access,
            ..
        } = buffer
        else {
            return Err(foreign("buffer"));
        };

        if !access.is_host_visible() {
            return Err(GraphicsError::InvalidParameter(
                "buffer is not host visible".to_string(),
            ));
        }
        if offset + len > *size {
            return Err(GraphicsError::InvalidParameter(format!(
                "access of {} bytes at offset {} exceeds buffer size {}",
                len, offset, size
            )));
        }

        let guard = allocation.lock();
        let Some(allocation) = guard.as_ref() else {
            return Err(GraphicsError::Internal(
                "Buffer allocation is None".to_string(),
            ));
        };
        let Some(mapped_ptr) = allocation.mapped_ptr() else {
            return Err(GraphicsError::Internal(
                "Buffer is not mapped for CPU access".to_string(),
            ));
        };

        // SAFETY: the range was checked against the buffer size above
        let ptr = unsafe { (mapped_ptr.as_ptr() as *mut u8).add(offset as usize) };
        Ok(f(ptr))
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.immediate.lock().destroy(&self.device);
            self.device
                .destroy_command_pool(*self.command_pool.lock(), None);

            // Remaining allocations are reported by gpu-allocator as leaks
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn features(&self) -> DeviceFeatures {
        self.features
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        unsafe { self.device.device_wait_idle() }.map_err(|e| match e {
            vk::Result::ERROR_DEVICE_LOST => GraphicsError::DeviceLost,
            other => GraphicsError::Internal(format!("Failed to wait for device: {:?}", other)),
        })
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(convert_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create buffer: {:?}", e))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.allocate_memory(
            descriptor.label.as_deref().unwrap_or("buffer"),
            requirements,
            allocator::memory_location(descriptor.access),
            true,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            unsafe { self.device.destroy_buffer(buffer, None) };
            let _ = self.allocator.lock().free(allocation);
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "Failed to bind buffer memory: {:?}",
                e
            )));
        }

        log::trace!(
            "VulkanBackend: created buffer {:?} ({} bytes, {:?})",
            descriptor.label,
            descriptor.size,
            descriptor.access
        );

        Ok(GpuBuffer::Vulkan {
            buffer,
            allocation: Mutex::new(Some(allocation)),
            size: descriptor.size,
            access: descriptor.access,
        })
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        match &buffer {
            GpuBuffer::Vulkan {
                buffer: raw,
                allocation,
                ..
            } => {
                unsafe { self.device.destroy_buffer(*raw, None) };
                self.free_memory(allocation);
            }
            GpuBuffer::Dummy { .. } => log::warn!("VulkanBackend: ignoring foreign buffer"),
        }
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        self.with_mapping(buffer, offset, data.len() as u64, |dst| unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        })
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        self.with_mapping(buffer, offset, size, |src| {
            let mut result = vec![0u8; size as usize];
            unsafe {
                std::ptr::copy_nonoverlapping(src as *const u8, result.as_mut_ptr(), size as usize);
            }
            result
        })
    }

    fn create_image(&self, descriptor: &ImageDescriptor) -> Result<GpuImage, GraphicsError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "image extent must be non-zero".to_string(),
            ));
        }

        let format = convert_image_format(descriptor.format);
        let aspect = convert_image_aspect(descriptor.aspect);
        let extent = extent(descriptor.width, descriptor.height);

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_image_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create image: {:?}", e))
        })?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = match self.allocate_memory(
            descriptor.label.as_deref().unwrap_or("image"),
            requirements,
            gpu_allocator::MemoryLocation::GpuOnly,
            false,
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let bound = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        };

        let view = bound.and_then(|()| {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            unsafe { self.device.create_image_view(&view_info, None) }
        });

        let view = match view {
            Ok(view) => view,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                let _ = self.allocator.lock().free(allocation);
                return Err(GraphicsError::ResourceCreationFailed(format!(
                    "Failed to bind image memory or create view: {:?}",
                    e
                )));
            }
        };

        log::trace!(
            "VulkanBackend: created image {:?} ({}x{} {:?})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );

        Ok(GpuImage::Vulkan {
            image,
            view,
            allocation: Mutex::new(Some(allocation)),
            format,
            extent,
            aspect,
        })
    }

    fn destroy_image(&self, image: GpuImage) {
        match &image {
            GpuImage::Vulkan {
                image: raw,
                view,
                allocation,
                ..
            } => {
                unsafe {
                    self.device.destroy_image_view(*view, None);
                    self.device.destroy_image(*raw, None);
                }
                self.free_memory(allocation);
            }
            GpuImage::Dummy { .. } => log::warn!("VulkanBackend: ignoring foreign image"),
        }
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError> {
        let filter = convert_filter_mode(descriptor.filter);
        let address_mode = convert_address_mode(descriptor.address_mode);
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(convert_mipmap_filter_mode(descriptor.mipmap_filter))
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .compare_enable(descriptor.compare.is_some())
            .compare_op(
                descriptor
                    .compare
                    .map(convert_compare_op)
                    .unwrap_or(vk::CompareOp::ALWAYS),
            )
            .max_lod(descriptor.max_lod)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.device.create_sampler(&sampler_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create sampler: {:?}", e))
        })?;

        Ok(GpuSampler::Vulkan(sampler))
    }

    fn destroy_sampler(&self, sampler: GpuSampler) {
        if let Ok(raw) = raw_sampler(sampler) {
            unsafe { self.device.destroy_sampler(raw, None) };
        }
    }

    fn submit_immediate(&self, commands: &[GpuCommand<'_>]) -> Result<(), GraphicsError> {
        let raw = commands
            .iter()
            .map(RawCommand::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        let immediate = self.immediate.lock();
        // SAFETY: the lock gives exclusive use of the context and the queue
        unsafe {
            immediate.submit(&self.device, self.graphics_queue, |cmd| {
                for command in &raw {
                    unsafe { command.record(&self.device, cmd) };
                }
            })
        }
    }

    fn create_command_buffer(&self) -> Result<GpuCommandBuffer, GraphicsError> {
        let pool = self.command_pool.lock();
        let cmd = command::allocate_command_buffer(&self.device, *pool)?;

        let begin_info = vk::CommandBufferBeginInfo::default();
        unsafe { self.device.begin_command_buffer(cmd, &begin_info) }.map_err(|e| {
            GraphicsError::Internal(format!("Failed to begin command buffer: {:?}", e))
        })?;

        Ok(GpuCommandBuffer::Vulkan(cmd))
    }

    fn free_command_buffer(&self, cmd: GpuCommandBuffer) {
        if let Ok(raw) = raw_command_buffer(cmd) {
            let pool = self.command_pool.lock();
            unsafe { self.device.free_command_buffers(*pool, &[raw]) };
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: GpuCommandBuffer, binding: u32, buffer: &GpuBuffer) {
        let (Ok(cmd), Ok(buffer)) = (raw_command_buffer(cmd), raw_buffer(buffer)) else {
            log::warn!("VulkanBackend: cannot bind a foreign vertex buffer");
            return;
        };
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(cmd, binding, &[buffer], &[0])
        };
    }

    fn cmd_bind_index_buffer(&self, cmd: GpuCommandBuffer, buffer: &GpuBuffer, format: IndexFormat) {
        let (Ok(cmd), Ok(buffer)) = (raw_command_buffer(cmd), raw_buffer(buffer)) else {
            log::warn!("VulkanBackend: cannot bind a foreign index buffer");
            return;
        };
        unsafe {
            self.device
                .cmd_bind_index_buffer(cmd, buffer, 0, convert_index_format(format))
        };
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        descriptor::create_set_layout(&self.device, bindings).map(GpuDescriptorSetLayout::Vulkan)
    }

    fn destroy_descriptor_set_layout(&self, layout: GpuDescriptorSetLayout) {
        if let Ok(raw) = raw_set_layout(layout) {
            unsafe { self.device.destroy_descriptor_set_layout(raw, None) };
        }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<GpuDescriptorPool, GraphicsError> {
        descriptor::create_pool(&self.device, max_sets, sizes).map(GpuDescriptorPool::Vulkan)
    }

    fn allocate_descriptor_set(
        &self,
        pool: GpuDescriptorPool,
        layout: GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        descriptor::allocate_set(&self.device, raw_pool(pool)?, raw_set_layout(layout)?)
            .map(GpuDescriptorSet::Vulkan)
    }

    fn reset_descriptor_pool(&self, pool: GpuDescriptorPool) -> Result<(), GraphicsError> {
        let raw = raw_pool(pool)?;
        unsafe {
            self.device
                .reset_descriptor_pool(raw, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(|e| GraphicsError::Internal(format!("Failed to reset descriptor pool: {:?}", e)))
    }

    fn destroy_descriptor_pool(&self, pool: GpuDescriptorPool) {
        if let Ok(raw) = raw_pool(pool) {
            unsafe { self.device.destroy_descriptor_pool(raw, None) };
        }
    }

    fn update_descriptor_set(&self, set: GpuDescriptorSet, writes: &[DescriptorWrite<'_>]) {
        let Ok(set) = raw_descriptor_set(set) else {
            log::warn!("VulkanBackend: cannot update a foreign descriptor set");
            return;
        };

        enum Info {
            Buffer(vk::DescriptorBufferInfo),
            Image(vk::DescriptorImageInfo),
        }

        let mut infos = Vec::with_capacity(writes.len());
        for write in writes {
            let info = match write {
                DescriptorWrite::Buffer {
                    buffer,
                    offset,
                    range,
                    ..
                } => match raw_buffer(buffer) {
                    Ok(buffer) => Info::Buffer(vk::DescriptorBufferInfo {
                        buffer,
                        offset: *offset,
                        range: *range,
                    }),
                    Err(e) => {
                        log::warn!("VulkanBackend: skipping descriptor write: {}", e);
                        continue;
                    }
                },
                DescriptorWrite::Image {
                    image,
                    sampler,
                    layout,
                    ..
                } => match raw_image(image) {
                    Ok((_, view, _)) => Info::Image(vk::DescriptorImageInfo {
                        sampler: sampler
                            .and_then(|s| raw_sampler(s).ok())
                            .unwrap_or_else(vk::Sampler::null),
                        image_view: view,
                        image_layout: convert_image_layout(*layout),
                    }),
                    Err(e) => {
                        log::warn!("VulkanBackend: skipping descriptor write: {}", e);
                        continue;
                    }
                },
            };
            infos.push((write, info));
        }

        let vk_writes: Vec<vk::WriteDescriptorSet> = infos
            .iter()
            .map(|(write, info)| {
                let (binding, ty) = match write {
                    DescriptorWrite::Buffer { binding, ty, .. }
                    | DescriptorWrite::Image { binding, ty, .. } => (*binding, *ty),
                };
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding)
                    .dst_array_element(0)
                    .descriptor_type(convert_descriptor_type(ty));
                match info {
                    Info::Buffer(info) => base.buffer_info(std::slice::from_ref(info)),
                    Info::Image(info) => base.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
    }

    fn create_shader_module(&self, spirv: &[u32]) -> Result<GpuShaderModule, GraphicsError> {
        pipeline::create_shader_module(&self.device, spirv).map(GpuShaderModule::Vulkan)
    }

    fn destroy_shader_module(&self, module: GpuShaderModule) {
        if let Ok(raw) = raw_shader_module(module) {
            unsafe { self.device.destroy_shader_module(raw, None) };
        }
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<GpuRenderPass, GraphicsError> {
        pipeline::create_render_pass(&self.device, descriptor).map(GpuRenderPass::Vulkan)
    }

    fn destroy_render_pass(&self, render_pass: GpuRenderPass) {
        if let Ok(raw) = raw_render_pass(render_pass) {
            unsafe { self.device.destroy_render_pass(raw, None) };
        }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[GpuDescriptorSetLayout],
        push_constants: &[PushConstantRange],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        let raw_layouts = set_layouts
            .iter()
            .map(|layout| raw_set_layout(*layout))
            .collect::<Result<Vec<_>, _>>()?;
        pipeline::create_pipeline_layout(&self.device, &raw_layouts, push_constants)
            .map(GpuPipelineLayout::Vulkan)
    }

    fn destroy_pipeline_layout(&self, layout: GpuPipelineLayout) {
        if let Ok(raw) = raw_pipeline_layout(layout) {
            unsafe { self.device.destroy_pipeline_layout(raw, None) };
        }
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: GpuPipelineLayout,
        render_pass: GpuRenderPass,
        subpass: u32,
    ) -> Result<GpuPipeline, GraphicsError> {
        let modules = desc
            .shaders()
            .iter()
            .map(|shader| raw_shader_module(shader.module))
            .collect::<Result<Vec<_>, _>>()?;
        pipeline::create_graphics_pipeline(
            &self.device,
            desc,
            &modules,
            raw_pipeline_layout(layout)?,
            raw_render_pass(render_pass)?,
            subpass,
        )
        .map(GpuPipeline::Vulkan)
    }

    fn destroy_pipeline(&self, pipeline: GpuPipeline) {
        if let Ok(raw) = raw_pipeline(pipeline) {
            unsafe { self.device.destroy_pipeline(raw, None) };
        }
    }

    fn set_debug_name(&self, object: DebugObject<'_>, name: &str) {
        let Some(debug_utils) = &self.debug_utils_device else {
            return;
        };

        match object {
            DebugObject::Buffer(buffer) => {
                if let Ok(raw) = raw_buffer(buffer) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::Image(image) => {
                if let Ok((raw, view, _)) = raw_image(image) {
                    debug::set_object_name(debug_utils, raw, name);
                    debug::set_object_name(debug_utils, view, &format!("{} view", name));
                }
            }
            DebugObject::Sampler(sampler) => {
                if let Ok(raw) = raw_sampler(sampler) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::ShaderModule(module) => {
                if let Ok(raw) = raw_shader_module(module) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::DescriptorSetLayout(layout) => {
                if let Ok(raw) = raw_set_layout(layout) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::DescriptorPool(pool) => {
                if let Ok(raw) = raw_pool(pool) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::PipelineLayout(layout) => {
                if let Ok(raw) = raw_pipeline_layout(layout) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::Pipeline(pipeline) => {
                if let Ok(raw) = raw_pipeline(pipeline) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
            DebugObject::RenderPass(render_pass) => {
                if let Ok(raw) = raw_render_pass(render_pass) {
                    debug::set_object_name(debug_utils, raw, name);
                }
            }
        }
    }
}
