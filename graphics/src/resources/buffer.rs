//! Buffer registry.
//!
//! Owns native buffers behind [`BufferHandle`]s. Uploads to device-local
//! memory go through a throwaway staging buffer and a synchronous immediate
//! submission; native buffers are released through the
//! [`DeferredDestructor`] so in-flight frames never see them disappear.

use std::sync::Arc;

use crate::backend::{DebugObject, GpuBackend, GpuBuffer, GpuCommand, GpuCommandBuffer};
use crate::error::{GraphicsError, fatal};
use crate::handle::{BufferHandle, BufferKind};
use crate::pool::{ResourceMetadata, ResourcePool};
use crate::types::{BufferDesc, BufferDescriptor, BufferType, IndexFormat, align_up};

use super::deferred::{DeferredDestructor, DeferredResource};

/// Registry of GPU buffers.
pub struct BufferRegistry {
    backend: Arc<dyn GpuBackend>,
    deferred: Arc<DeferredDestructor>,
    pool: ResourcePool<GpuBuffer, BufferDesc, BufferKind>,
}

impl BufferRegistry {
    /// Create a registry with room for `capacity` buffers.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        deferred: Arc<DeferredDestructor>,
        capacity: u32,
    ) -> Self {
        log::debug!("Creating buffer registry (capacity: {})", capacity);
        Self {
            backend,
            deferred,
            pool: ResourcePool::new("buffer", capacity),
        }
    }

    /// Allocate a buffer of `desc.size` elements of `desc.stride` bytes.
    ///
    /// Uniform buffers have their stride rounded up to the device's minimum
    /// uniform offset alignment so every element can be bound at its own
    /// dynamic offset.
    pub fn create_buffer(
        &mut self,
        desc: BufferDesc,
        name: &str,
    ) -> Result<BufferHandle, GraphicsError> {
        let mut desc = desc;
        if desc.ty == BufferType::Uniform {
            let alignment = self.backend.limits().min_uniform_buffer_offset_alignment;
            desc.stride = align_up(desc.stride, alignment);
        }

        let buffer = self.create_native(&desc, name)?;
        let handle = self.pool.create_resource(buffer, desc, name);

        log::trace!(
            "Created buffer '{}' {:?} ({:?}, {} x {} bytes)",
            name,
            handle,
            desc.ty,
            desc.size,
            desc.stride
        );
        Ok(handle)
    }

    /// Write `data` to the start of the buffer.
    ///
    /// CPU-upload buffers are written through their mapping; every other
    /// buffer receives the bytes through a staging copy that completes
    /// before this returns.
    ///
    /// # Panics
    ///
    /// Panics if `data` is longer than the buffer or the handle is stale.
    pub fn update_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<(), GraphicsError> {
        let desc = *self.pool.desc(handle);
        let capacity = desc.byte_size();
        if data.len() as u64 > capacity {
            fatal!(
                "update of buffer '{}' with {} bytes exceeds its size of {} bytes",
                self.pool.name(handle),
                data.len(),
                capacity
            );
        }
        if data.is_empty() {
            return Ok(());
        }

        let buffer = self.pool.get(handle);
        if desc.access.is_host_visible() {
            return self.backend.write_buffer(buffer, 0, data);
        }

        let staging = self
            .backend
            .create_buffer(&BufferDescriptor::staging(data.len() as u64))?;
        let result = self
            .backend
            .write_buffer(&staging, 0, data)
            .and_then(|()| {
                self.backend.submit_immediate(&[GpuCommand::CopyBuffer {
                    src: &staging,
                    dst: buffer,
                    size: data.len() as u64,
                }])
            });
        self.backend.destroy_buffer(staging);
        result
    }

    /// Write a slice of plain-old-data values, see [`update_buffer`](Self::update_buffer).
    pub fn update_buffer_pod<T: bytemuck::Pod>(
        &mut self,
        handle: BufferHandle,
        data: &[T],
    ) -> Result<(), GraphicsError> {
        self.update_buffer(handle, bytemuck::cast_slice(data))
    }

    /// Reallocate the buffer to hold `size` elements.
    ///
    /// The handle stays valid. Contents are not preserved; the old native
    /// buffer is released after the in-flight frames finish with it.
    pub fn resize_buffer(&mut self, handle: BufferHandle, size: u64) -> Result<(), GraphicsError> {
        let name = self.pool.name(handle).to_string();
        let mut desc = *self.pool.desc(handle);
        if desc.size == size {
            return Ok(());
        }
        desc.size = size;

        let replacement = self.create_native(&desc, &name)?;
        let (buffer, stored) = self.pool.get_with_desc_mut(handle);
        let old = std::mem::replace(buffer, replacement);
        *stored = desc;
        self.deferred.queue(DeferredResource::Buffer(old));

        log::debug!(
            "Resized buffer '{}' {:?} to {} elements",
            name,
            handle,
            size
        );
        Ok(())
    }

    /// Record the buffer's binding into `cmd`.
    ///
    /// Vertex buffers bind at vertex input binding 0, index buffers bind
    /// with 32-bit indices. Other buffer types are not bound here.
    pub fn bind_buffer(&self, handle: BufferHandle, cmd: GpuCommandBuffer) {
        let buffer = self.pool.get(handle);
        match self.pool.desc(handle).ty {
            BufferType::Vertex => self.backend.cmd_bind_vertex_buffer(cmd, 0, buffer),
            BufferType::Index => {
                self.backend
                    .cmd_bind_index_buffer(cmd, buffer, IndexFormat::Uint32)
            }
            BufferType::Uniform | BufferType::Storage => {}
        }
    }

    /// Read back the whole buffer.
    ///
    /// Device-local buffers are copied into a readback buffer first.
    pub fn read_buffer(&self, handle: BufferHandle) -> Result<Vec<u8>, GraphicsError> {
        let desc = self.pool.desc(handle);
        let size = desc.byte_size();
        let buffer = self.pool.get(handle);
        if desc.access.is_host_visible() {
            return self.backend.read_buffer(buffer, 0, size);
        }

        let readback = self
            .backend
            .create_buffer(&BufferDescriptor::readback(size))?;
        let result = self
            .backend
            .submit_immediate(&[GpuCommand::CopyBuffer {
                src: buffer,
                dst: &readback,
                size,
            }])
            .and_then(|()| self.backend.read_buffer(&readback, 0, size));
        self.backend.destroy_buffer(readback);
        result
    }

    /// Invalidate the handle and queue the native buffer for release.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn destroy_buffer(&mut self, handle: BufferHandle) {
        let (buffer, _) = self.pool.destroy_resource(handle);
        log::trace!("Destroyed buffer {:?}", handle);
        self.deferred.queue(DeferredResource::Buffer(buffer));
    }

    /// Destroy every live buffer.
    pub fn destroy_all(&mut self) {
        let drained = self.pool.drain();
        if !drained.is_empty() {
            log::debug!("Releasing {} buffers", drained.len());
        }
        for (buffer, _) in drained {
            self.deferred.queue(DeferredResource::Buffer(buffer));
        }
    }

    /// Native buffer behind a handle.
    pub fn native(&self, handle: BufferHandle) -> &GpuBuffer {
        self.pool.get(handle)
    }

    /// Description of a buffer.
    pub fn desc(&self, handle: BufferHandle) -> &BufferDesc {
        self.pool.desc(handle)
    }

    /// Whether the handle refers to a live buffer.
    pub fn is_valid(&self, handle: BufferHandle) -> bool {
        self.pool.is_valid(handle)
    }

    /// Name and handle of every live buffer.
    pub fn metadata(&self) -> Vec<ResourceMetadata<BufferKind>> {
        self.pool.metadata()
    }

    /// Description of every live buffer.
    pub fn descriptors(&self) -> Vec<&BufferDesc> {
        self.pool.descriptors()
    }

    /// Number of live buffers.
    pub fn size(&self) -> usize {
        self.pool.len()
    }

    /// Maximum number of live buffers.
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    fn create_native(&self, desc: &BufferDesc, name: &str) -> Result<GpuBuffer, GraphicsError> {
        let descriptor = BufferDescriptor::new(desc.byte_size(), desc.ty.usage(), desc.access)
            .with_label(name);
        let buffer = self.backend.create_buffer(&descriptor)?;
        self.backend.set_debug_name(DebugObject::Buffer(&buffer), name);
        Ok(buffer)
    }
}

impl std::fmt::Debug for BufferRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRegistry")
            .field("backend", &self.backend.name())
            .field("live", &self.pool.len())
            .field("capacity", &self.pool.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceFeatures, DeviceLimits, DummyBackend, RecordedCommand};
    use crate::types::MemoryAccess;

    fn registry_with(backend: &Arc<DummyBackend>, capacity: u32) -> BufferRegistry {
        let deferred = Arc::new(DeferredDestructor::new(backend.clone(), 2));
        BufferRegistry::new(backend.clone(), deferred, capacity)
    }

    #[test]
    fn test_handle_recycling() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 8);
        let desc = BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 4, 12);

        let first = registry.create_buffer(desc, "first").unwrap();
        assert_eq!((first.index(), first.generation()), (0, 0));

        registry.destroy_buffer(first);
        assert!(!registry.is_valid(first));

        let second = registry.create_buffer(desc, "second").unwrap();
        assert_eq!((second.index(), second.generation()), (0, 1));
    }

    #[test]
    fn test_uniform_stride_is_aligned() {
        let limits = DeviceLimits {
            min_uniform_buffer_offset_alignment: 64,
            ..DeviceLimits::default()
        };
        let backend = Arc::new(DummyBackend::with_limits(limits, DeviceFeatures::default()));
        let mut registry = registry_with(&backend, 4);

        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Uniform, MemoryAccess::CpuUpload, 3, 20),
                "uniforms",
            )
            .unwrap();
        assert_eq!(registry.desc(handle).stride, 64);
        assert_eq!(registry.native(handle).size(), 192);

        let vertices = registry
            .create_buffer(
                BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 3, 20),
                "vertices",
            )
            .unwrap();
        assert_eq!(registry.desc(vertices).stride, 20);
    }

    #[test]
    fn test_staged_update_round_trip() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 4);
        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Storage, MemoryAccess::GpuLocal, 4, 4),
                "storage",
            )
            .unwrap();

        let data: Vec<u8> = (0..16).collect();
        registry.update_buffer(handle, &data).unwrap();
        assert_eq!(registry.read_buffer(handle).unwrap(), data);

        // Staging and readback buffers are gone again.
        assert_eq!(backend.live_objects().buffers, 1);
        assert_eq!(backend.stats().copies, 2);
    }

    #[test]
    fn test_partial_update_keeps_tail() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 4);
        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 8, 1),
                "partial",
            )
            .unwrap();

        registry.update_buffer(handle, &[9; 8]).unwrap();
        registry.update_buffer(handle, &[1, 2]).unwrap();
        assert_eq!(
            registry.read_buffer(handle).unwrap(),
            vec![1, 2, 9, 9, 9, 9, 9, 9]
        );
    }

    #[test]
    fn test_pod_update() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 4);
        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Index, MemoryAccess::CpuUpload, 3, 4),
                "indices",
            )
            .unwrap();

        let indices = [0u32, 1, 2];
        registry.update_buffer_pod(handle, &indices).unwrap();
        assert_eq!(
            registry.read_buffer(handle).unwrap(),
            bytemuck::cast_slice::<u32, u8>(&indices)
        );
        assert_eq!(backend.stats().immediate_submits, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds its size")]
    fn test_oversized_update_is_fatal() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 4);
        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 2, 4),
                "small",
            )
            .unwrap();
        let _ = registry.update_buffer(handle, &[0; 9]);
    }

    #[test]
    fn test_resize_defers_old_buffer() {
        let backend = Arc::new(DummyBackend::new());
        let deferred = Arc::new(DeferredDestructor::new(backend.clone(), 2));
        let mut registry = BufferRegistry::new(backend.clone(), deferred.clone(), 4);
        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Index, MemoryAccess::GpuLocal, 6, 4),
                "indices",
            )
            .unwrap();

        registry.resize_buffer(handle, 12).unwrap();
        assert!(registry.is_valid(handle));
        assert_eq!(registry.desc(handle).size, 12);
        assert_eq!(registry.native(handle).size(), 48);
        assert_eq!(deferred.pending_count(), 1);
        assert_eq!(backend.live_objects().buffers, 2);

        deferred.advance_frame();
        deferred.advance_frame();
        assert_eq!(backend.live_objects().buffers, 1);
    }

    #[test]
    fn test_bind_by_type() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 4);
        let cmd = backend.create_command_buffer().unwrap();

        let vertex = registry
            .create_buffer(
                BufferDesc::new(BufferType::Vertex, MemoryAccess::GpuLocal, 3, 12),
                "vertex",
            )
            .unwrap();
        let index = registry
            .create_buffer(
                BufferDesc::new(BufferType::Index, MemoryAccess::GpuLocal, 3, 4),
                "index",
            )
            .unwrap();
        let uniform = registry
            .create_buffer(
                BufferDesc::new(BufferType::Uniform, MemoryAccess::CpuUpload, 1, 64),
                "uniform",
            )
            .unwrap();

        registry.bind_buffer(vertex, cmd);
        registry.bind_buffer(index, cmd);
        registry.bind_buffer(uniform, cmd);

        let vertex_id = registry.native(vertex).dummy_id().unwrap();
        let index_id = registry.native(index).dummy_id().unwrap();
        assert_eq!(
            backend.recorded_commands(cmd),
            vec![
                RecordedCommand::BindVertexBuffer {
                    binding: 0,
                    buffer: vertex_id
                },
                RecordedCommand::BindIndexBuffer {
                    buffer: index_id,
                    format: IndexFormat::Uint32
                },
            ]
        );
        backend.free_command_buffer(cmd);
    }

    #[test]
    fn test_metadata_and_destroy_all() {
        let backend = Arc::new(DummyBackend::new());
        let deferred = Arc::new(DeferredDestructor::new(backend.clone(), 1));
        let mut registry = BufferRegistry::new(backend.clone(), deferred.clone(), 4);
        let desc = BufferDesc::new(BufferType::Storage, MemoryAccess::CpuReadback, 1, 16);

        let a = registry.create_buffer(desc, "a").unwrap();
        let b = registry.create_buffer(desc, "b").unwrap();
        assert_eq!(registry.size(), 2);
        assert_eq!(backend.debug_name(registry.native(a).dummy_id().unwrap()).as_deref(), Some("a"));

        let names: Vec<_> = registry.metadata().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.descriptors().len(), 2);

        registry.destroy_all();
        assert!(!registry.is_valid(a) && !registry.is_valid(b));
        assert_eq!(registry.size(), 0);

        deferred.advance_frame();
        assert_eq!(backend.live_objects().buffers, 0);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_double_destroy_is_fatal() {
        let backend = Arc::new(DummyBackend::new());
        let mut registry = registry_with(&backend, 4);
        let handle = registry
            .create_buffer(
                BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 1, 4),
                "once",
            )
            .unwrap();
        registry.destroy_buffer(handle);
        registry.destroy_buffer(handle);
    }
}
