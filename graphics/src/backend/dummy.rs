//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. Buffers and images are plain host
//! memory, copies really move bytes and descriptor pools enforce their
//! capacities, so registry behavior can be tested without GPU hardware.
//! Every call is also recorded so tests can inspect what was submitted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::{
    BufferDescriptor, DescriptorBinding, DescriptorPoolSize, DescriptorType, GraphicsPipelineDesc,
    ImageDescriptor, ImageLayout, IndexFormat, PushConstantRange, RenderPassDescriptor,
    SamplerDescriptor,
};

use super::{
    DebugObject, DescriptorWrite, DeviceFeatures, DeviceLimits, GpuBackend, GpuBuffer,
    GpuCommand, GpuCommandBuffer, GpuDescriptorPool, GpuDescriptorSet, GpuDescriptorSetLayout,
    GpuImage, GpuPipeline, GpuPipelineLayout, GpuRenderPass, GpuSampler, GpuShaderModule,
};

/// Number of live objects of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveObjects {
    pub buffers: usize,
    pub images: usize,
    pub samplers: usize,
    pub shader_modules: usize,
    pub descriptor_set_layouts: usize,
    pub descriptor_pools: usize,
    pub pipeline_layouts: usize,
    pub pipelines: usize,
    pub render_passes: usize,
    pub command_buffers: usize,
}

impl LiveObjects {
    /// Total number of live objects.
    pub fn total(&self) -> usize {
        self.buffers
            + self.images
            + self.samplers
            + self.shader_modules
            + self.descriptor_set_layouts
            + self.descriptor_pools
            + self.pipeline_layouts
            + self.pipelines
            + self.render_passes
            + self.command_buffers
    }
}

/// Counters of submitted work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitStats {
    pub immediate_submits: usize,
    pub barriers: usize,
    pub copies: usize,
    pub descriptor_writes: usize,
}

/// A layout barrier seen by the dummy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedBarrier {
    pub image: u64,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    /// The barrier used the conservative full-pipeline masks.
    pub fallback: bool,
}

/// A command recorded into a dummy command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedCommand {
    BindVertexBuffer { binding: u32, buffer: u64 },
    BindIndexBuffer { buffer: u64, format: IndexFormat },
}

#[derive(Debug)]
struct DummyPool {
    max_sets: u32,
    capacity: HashMap<DescriptorType, u32>,
    used_sets: u32,
    used: HashMap<DescriptorType, u32>,
}

#[derive(Debug, Default)]
struct DummyState {
    live: LiveObjects,
    stats: SubmitStats,
    barriers: Vec<RecordedBarrier>,
    image_layouts: HashMap<u64, ImageLayout>,
    debug_names: HashMap<u64, String>,
    set_layouts: HashMap<u64, Vec<DescriptorBinding>>,
    pools: HashMap<u64, DummyPool>,
    command_buffers: HashMap<u64, Vec<RecordedCommand>>,
}

/// Dummy GPU backend.
pub struct DummyBackend {
    limits: DeviceLimits,
    features: DeviceFeatures,
    next_id: AtomicU64,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Create a new dummy backend with permissive limits and every feature.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default(), DeviceFeatures::default())
    }

    /// Create a dummy backend that reports the given limits and features.
    pub fn with_limits(limits: DeviceLimits, features: DeviceFeatures) -> Self {
        Self {
            limits,
            features,
            next_id: AtomicU64::new(1),
            state: Mutex::new(DummyState::default()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of objects created and not yet destroyed.
    pub fn live_objects(&self) -> LiveObjects {
        self.state.lock().live
    }

    /// Counters of submitted work.
    pub fn stats(&self) -> SubmitStats {
        self.state.lock().stats
    }

    /// Every layout barrier submitted so far, in order.
    pub fn barriers(&self) -> Vec<RecordedBarrier> {
        self.state.lock().barriers.clone()
    }

    /// Layout a dummy image was last transitioned to.
    pub fn image_layout(&self, image: u64) -> Option<ImageLayout> {
        self.state.lock().image_layouts.get(&image).copied()
    }

    /// Debug name attached to a dummy object.
    pub fn debug_name(&self, object: u64) -> Option<String> {
        self.state.lock().debug_names.get(&object).cloned()
    }

    /// Commands recorded into a command buffer.
    pub fn recorded_commands(&self, cmd: GpuCommandBuffer) -> Vec<RecordedCommand> {
        let Some(id) = cmd.dummy_id() else {
            return Vec::new();
        };
        self.state
            .lock()
            .command_buffers
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of sets currently carved out of a pool.
    pub fn pool_allocated_sets(&self, pool: GpuDescriptorPool) -> Option<u32> {
        let id = pool.dummy_id()?;
        self.state.lock().pools.get(&id).map(|p| p.used_sets)
    }

    fn execute(state: &mut DummyState, command: &GpuCommand<'_>) -> Result<(), GraphicsError> {
        match command {
            GpuCommand::ImageBarrier {
                image,
                old_layout,
                new_layout,
                masks,
            } => {
                let (id, _) = image_memory(image)?;
                let tracked = state
                    .image_layouts
                    .get(&id)
                    .copied()
                    .unwrap_or(ImageLayout::Undefined);
                if *old_layout != ImageLayout::Undefined && *old_layout != tracked {
                    log::warn!(
                        "DummyBackend: barrier on image {} claims {:?} but image is in {:?}",
                        id,
                        old_layout,
                        tracked
                    );
                }
                state.image_layouts.insert(id, *new_layout);
                state.barriers.push(RecordedBarrier {
                    image: id,
                    old_layout: *old_layout,
                    new_layout: *new_layout,
                    fallback: masks.fallback,
                });
                state.stats.barriers += 1;
            }
            GpuCommand::CopyBuffer { src, dst, size } => {
                let src = buffer_memory(src)?;
                let dst = buffer_memory(dst)?;
                copy_bytes(&src, &dst, *size as usize)?;
                state.stats.copies += 1;
            }
            GpuCommand::CopyBufferToImage {
                src,
                dst,
                width,
                height,
            } => {
                let src = buffer_memory(src)?;
                let (id, dst) = image_memory(dst)?;
                expect_layout(state, id, ImageLayout::TransferDst)?;
                let size = dst.lock().len();
                log::trace!(
                    "DummyBackend: copying {}x{} texels into image {}",
                    width,
                    height,
                    id
                );
                copy_bytes(&src, &dst, size)?;
                state.stats.copies += 1;
            }
            GpuCommand::CopyImageToBuffer { src, dst, .. } => {
                let (id, src) = image_memory(src)?;
                expect_layout(state, id, ImageLayout::TransferSrc)?;
                let dst = buffer_memory(dst)?;
                let size = src.lock().len();
                copy_bytes(&src, &dst, size)?;
                state.stats.copies += 1;
            }
            GpuCommand::CopyImage { src, dst, .. } => {
                let (src_id, src) = image_memory(src)?;
                let (dst_id, dst) = image_memory(dst)?;
                expect_layout(state, src_id, ImageLayout::TransferSrc)?;
                expect_layout(state, dst_id, ImageLayout::TransferDst)?;
                let size = src.lock().len();
                copy_bytes(&src, &dst, size)?;
                state.stats.copies += 1;
            }
        }
        Ok(())
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyBackend")
            .field("limits", &self.limits)
            .field("features", &self.features)
            .field("live", &self.live_objects())
            .finish()
    }
}

fn foreign(kind: &str) -> GraphicsError {
    GraphicsError::InvalidParameter(format!("{} does not belong to the dummy backend", kind))
}

fn buffer_memory(buffer: &GpuBuffer) -> Result<Arc<Mutex<Vec<u8>>>, GraphicsError> {
    match buffer {
        GpuBuffer::Dummy { data, .. } => Ok(Arc::clone(data)),
        #[cfg(feature = "vulkan-backend")]
        GpuBuffer::Vulkan { .. } => Err(foreign("buffer")),
    }
}

fn image_memory(image: &GpuImage) -> Result<(u64, Arc<Mutex<Vec<u8>>>), GraphicsError> {
    match image {
        GpuImage::Dummy { id, data, .. } => Ok((*id, Arc::clone(data))),
        #[cfg(feature = "vulkan-backend")]
        GpuImage::Vulkan { .. } => Err(foreign("image")),
    }
}

fn expect_layout(state: &DummyState, image: u64, layout: ImageLayout) -> Result<(), GraphicsError> {
    let current = state
        .image_layouts
        .get(&image)
        .copied()
        .unwrap_or(ImageLayout::Undefined);
    if current == layout || current == ImageLayout::General {
        Ok(())
    } else {
        Err(GraphicsError::InvalidParameter(format!(
            "image {} is in {:?}, copy requires {:?}",
            image, current, layout
        )))
    }
}

fn copy_bytes(
    src: &Arc<Mutex<Vec<u8>>>,
    dst: &Arc<Mutex<Vec<u8>>>,
    size: usize,
) -> Result<(), GraphicsError> {
    if Arc::ptr_eq(src, dst) {
        return Err(GraphicsError::InvalidParameter(
            "copy source and destination alias".to_string(),
        ));
    }
    let src = src.lock();
    let mut dst = dst.lock();
    if size > src.len() || size > dst.len() {
        return Err(GraphicsError::InvalidParameter(format!(
            "copy of {} bytes exceeds source ({}) or destination ({})",
            size,
            src.len(),
            dst.len()
        )));
    }
    dst[..size].copy_from_slice(&src[..size]);
    Ok(())
}

fn debug_object_id(object: &DebugObject<'_>) -> Option<u64> {
    match object {
        DebugObject::Buffer(buffer) => buffer.dummy_id(),
        DebugObject::Image(image) => image.dummy_id(),
        DebugObject::Sampler(sampler) => sampler.dummy_id(),
        DebugObject::ShaderModule(module) => module.dummy_id(),
        DebugObject::DescriptorSetLayout(layout) => layout.dummy_id(),
        DebugObject::DescriptorPool(pool) => pool.dummy_id(),
        DebugObject::PipelineLayout(layout) => layout.dummy_id(),
        DebugObject::Pipeline(pipeline) => pipeline.dummy_id(),
        DebugObject::RenderPass(render_pass) => render_pass.dummy_id(),
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn features(&self) -> DeviceFeatures {
        self.features
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        Ok(())
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }
        let id = self.next_id();
        log::trace!(
            "DummyBackend: creating buffer {} {:?} (size: {})",
            id,
            descriptor.label,
            descriptor.size
        );
        self.state.lock().live.buffers += 1;
        Ok(GpuBuffer::Dummy {
            id,
            data: Arc::new(Mutex::new(vec![0; descriptor.size as usize])),
            access: descriptor.access,
        })
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        if let Some(id) = buffer.dummy_id() {
            log::trace!("DummyBackend: destroying buffer {}", id);
            let mut state = self.state.lock();
            state.live.buffers = state.live.buffers.saturating_sub(1);
            state.debug_names.remove(&id);
        }
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if !buffer.access().is_host_visible() {
            return Err(GraphicsError::InvalidParameter(
                "buffer is not host visible".to_string(),
            ));
        }
        let memory = buffer_memory(buffer)?;
        let mut memory = memory.lock();
        let start = offset as usize;
        let end = start + data.len();
        if end > memory.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                memory.len()
            )));
        }
        memory[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, GraphicsError> {
        if !buffer.access().is_host_visible() {
            return Err(GraphicsError::InvalidParameter(
                "buffer is not host visible".to_string(),
            ));
        }
        let memory = buffer_memory(buffer)?;
        let memory = memory.lock();
        let start = offset as usize;
        let end = start + size as usize;
        if end > memory.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "read of {} bytes at offset {} exceeds buffer size {}",
                size,
                offset,
                memory.len()
            )));
        }
        Ok(memory[start..end].to_vec())
    }

    fn create_image(&self, descriptor: &ImageDescriptor) -> Result<GpuImage, GraphicsError> {
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "image extent must be non-zero".to_string(),
            ));
        }
        if descriptor.width > self.limits.max_image_dimension_2d
            || descriptor.height > self.limits.max_image_dimension_2d
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "image extent {}x{} exceeds device limit {}",
                descriptor.width, descriptor.height, self.limits.max_image_dimension_2d
            )));
        }
        let id = self.next_id();
        log::trace!(
            "DummyBackend: creating image {} {:?} ({}x{} {:?})",
            id,
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        let size = descriptor.width as usize
            * descriptor.height as usize
            * descriptor.format.texel_size() as usize;
        let mut state = self.state.lock();
        state.live.images += 1;
        state.image_layouts.insert(id, ImageLayout::Undefined);
        Ok(GpuImage::Dummy {
            id,
            data: Arc::new(Mutex::new(vec![0; size])),
            width: descriptor.width,
            height: descriptor.height,
            format: descriptor.format,
        })
    }

    fn destroy_image(&self, image: GpuImage) {
        if let Some(id) = image.dummy_id() {
            log::trace!("DummyBackend: destroying image {}", id);
            let mut state = self.state.lock();
            state.live.images = state.live.images.saturating_sub(1);
            state.image_layouts.remove(&id);
            state.debug_names.remove(&id);
        }
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        self.state.lock().live.samplers += 1;
        Ok(GpuSampler::Dummy { id: self.next_id() })
    }

    fn destroy_sampler(&self, sampler: GpuSampler) {
        if sampler.dummy_id().is_some() {
            let mut state = self.state.lock();
            state.live.samplers = state.live.samplers.saturating_sub(1);
        }
    }

    fn submit_immediate(&self, commands: &[GpuCommand<'_>]) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: immediate submit of {} commands",
            commands.len()
        );
        let mut state = self.state.lock();
        state.stats.immediate_submits += 1;
        for command in commands {
            Self::execute(&mut state, command)?;
        }
        Ok(())
    }

    fn create_command_buffer(&self) -> Result<GpuCommandBuffer, GraphicsError> {
        let id = self.next_id();
        let mut state = self.state.lock();
        state.live.command_buffers += 1;
        state.command_buffers.insert(id, Vec::new());
        Ok(GpuCommandBuffer::Dummy { id })
    }

    fn free_command_buffer(&self, cmd: GpuCommandBuffer) {
        if let Some(id) = cmd.dummy_id() {
            let mut state = self.state.lock();
            if state.command_buffers.remove(&id).is_some() {
                state.live.command_buffers -= 1;
            }
        }
    }

    fn cmd_bind_vertex_buffer(&self, cmd: GpuCommandBuffer, binding: u32, buffer: &GpuBuffer) {
        let (Some(cmd), Some(buffer)) = (cmd.dummy_id(), buffer.dummy_id()) else {
            return;
        };
        if let Some(commands) = self.state.lock().command_buffers.get_mut(&cmd) {
            commands.push(RecordedCommand::BindVertexBuffer { binding, buffer });
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: GpuCommandBuffer, buffer: &GpuBuffer, format: IndexFormat) {
        let (Some(cmd), Some(buffer)) = (cmd.dummy_id(), buffer.dummy_id()) else {
            return;
        };
        if let Some(commands) = self.state.lock().command_buffers.get_mut(&cmd) {
            commands.push(RecordedCommand::BindIndexBuffer { buffer, format });
        }
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorBinding],
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        let id = self.next_id();
        let mut state = self.state.lock();
        state.live.descriptor_set_layouts += 1;
        state.set_layouts.insert(id, bindings.to_vec());
        Ok(GpuDescriptorSetLayout::Dummy { id })
    }

    fn destroy_descriptor_set_layout(&self, layout: GpuDescriptorSetLayout) {
        if let Some(id) = layout.dummy_id() {
            let mut state = self.state.lock();
            if state.set_layouts.remove(&id).is_some() {
                state.live.descriptor_set_layouts -= 1;
            }
        }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<GpuDescriptorPool, GraphicsError> {
        if max_sets == 0 {
            return Err(GraphicsError::InvalidParameter(
                "descriptor pool needs at least one set".to_string(),
            ));
        }
        let id = self.next_id();
        let mut capacity = HashMap::new();
        for size in sizes {
            *capacity.entry(size.ty).or_insert(0) += size.count;
        }
        log::trace!(
            "DummyBackend: creating descriptor pool {} ({} sets)",
            id,
            max_sets
        );
        let mut state = self.state.lock();
        state.live.descriptor_pools += 1;
        state.pools.insert(
            id,
            DummyPool {
                max_sets,
                capacity,
                used_sets: 0,
                used: HashMap::new(),
            },
        );
        Ok(GpuDescriptorPool::Dummy { id })
    }

    fn allocate_descriptor_set(
        &self,
        pool: GpuDescriptorPool,
        layout: GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        let pool_id = pool.dummy_id().ok_or_else(|| foreign("descriptor pool"))?;
        let layout_id = layout
            .dummy_id()
            .ok_or_else(|| foreign("descriptor set layout"))?;
        let id = self.next_id();

        let mut state = self.state.lock();
        let bindings = state
            .set_layouts
            .get(&layout_id)
            .cloned()
            .ok_or_else(|| GraphicsError::InvalidParameter("unknown set layout".to_string()))?;
        let pool = state
            .pools
            .get_mut(&pool_id)
            .ok_or_else(|| GraphicsError::InvalidParameter("unknown descriptor pool".to_string()))?;

        if pool.used_sets >= pool.max_sets {
            return Err(GraphicsError::OutOfPoolMemory);
        }
        let mut required: HashMap<DescriptorType, u32> = HashMap::new();
        for binding in &bindings {
            *required.entry(binding.ty).or_insert(0) += binding.count;
        }
        for (ty, count) in &required {
            let used = pool.used.get(ty).copied().unwrap_or(0);
            let capacity = pool.capacity.get(ty).copied().unwrap_or(0);
            if used.saturating_add(*count) > capacity {
                return Err(GraphicsError::OutOfPoolMemory);
            }
        }
        for (ty, count) in required {
            *pool.used.entry(ty).or_insert(0) += count;
        }
        pool.used_sets += 1;

        Ok(GpuDescriptorSet::Dummy { id, pool: pool_id })
    }

    fn reset_descriptor_pool(&self, pool: GpuDescriptorPool) -> Result<(), GraphicsError> {
        let id = pool.dummy_id().ok_or_else(|| foreign("descriptor pool"))?;
        let mut state = self.state.lock();
        let pool = state
            .pools
            .get_mut(&id)
            .ok_or_else(|| GraphicsError::InvalidParameter("unknown descriptor pool".to_string()))?;
        pool.used_sets = 0;
        pool.used.clear();
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: GpuDescriptorPool) {
        if let Some(id) = pool.dummy_id() {
            let mut state = self.state.lock();
            if state.pools.remove(&id).is_some() {
                state.live.descriptor_pools -= 1;
            }
            state.debug_names.remove(&id);
        }
    }

    fn update_descriptor_set(&self, set: GpuDescriptorSet, writes: &[DescriptorWrite<'_>]) {
        log::trace!(
            "DummyBackend: updating descriptor set {:?} with {} writes",
            set,
            writes.len()
        );
        self.state.lock().stats.descriptor_writes += writes.len();
    }

    fn create_shader_module(&self, spirv: &[u32]) -> Result<GpuShaderModule, GraphicsError> {
        if spirv.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "shader module needs SPIR-V code".to_string(),
            ));
        }
        self.state.lock().live.shader_modules += 1;
        Ok(GpuShaderModule::Dummy { id: self.next_id() })
    }

    fn destroy_shader_module(&self, module: GpuShaderModule) {
        if module.dummy_id().is_some() {
            let mut state = self.state.lock();
            state.live.shader_modules = state.live.shader_modules.saturating_sub(1);
        }
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<GpuRenderPass, GraphicsError> {
        log::trace!(
            "DummyBackend: creating render pass {:?} ({} color attachments)",
            descriptor.label,
            descriptor.color_formats.len()
        );
        self.state.lock().live.render_passes += 1;
        Ok(GpuRenderPass::Dummy { id: self.next_id() })
    }

    fn destroy_render_pass(&self, render_pass: GpuRenderPass) {
        if render_pass.dummy_id().is_some() {
            let mut state = self.state.lock();
            state.live.render_passes = state.live.render_passes.saturating_sub(1);
        }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[GpuDescriptorSetLayout],
        push_constants: &[PushConstantRange],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        log::trace!(
            "DummyBackend: creating pipeline layout ({} sets, {} push ranges)",
            set_layouts.len(),
            push_constants.len()
        );
        self.state.lock().live.pipeline_layouts += 1;
        Ok(GpuPipelineLayout::Dummy { id: self.next_id() })
    }

    fn destroy_pipeline_layout(&self, layout: GpuPipelineLayout) {
        if let Some(id) = layout.dummy_id() {
            let mut state = self.state.lock();
            state.live.pipeline_layouts = state.live.pipeline_layouts.saturating_sub(1);
            state.debug_names.remove(&id);
        }
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        layout: GpuPipelineLayout,
        render_pass: GpuRenderPass,
        subpass: u32,
    ) -> Result<GpuPipeline, GraphicsError> {
        layout.dummy_id().ok_or_else(|| foreign("pipeline layout"))?;
        render_pass.dummy_id().ok_or_else(|| foreign("render pass"))?;
        if desc.shaders().is_empty() {
            return Err(GraphicsError::InvalidParameter(format!(
                "pipeline '{}' has no shader stages",
                desc.name()
            )));
        }
        log::trace!(
            "DummyBackend: creating pipeline '{}' (subpass {})",
            desc.name(),
            subpass
        );
        self.state.lock().live.pipelines += 1;
        Ok(GpuPipeline::Dummy { id: self.next_id() })
    }

    fn destroy_pipeline(&self, pipeline: GpuPipeline) {
        if let Some(id) = pipeline.dummy_id() {
            let mut state = self.state.lock();
            state.live.pipelines = state.live.pipelines.saturating_sub(1);
            state.debug_names.remove(&id);
        }
    }

    fn set_debug_name(&self, object: DebugObject<'_>, name: &str) {
        if !self.features.debug_utils {
            return;
        }
        if let Some(id) = debug_object_id(&object) {
            self.state.lock().debug_names.insert(id, name.to_string());
        }
    }
}
