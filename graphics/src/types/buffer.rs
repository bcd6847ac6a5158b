//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for native buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 4;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Where a buffer's memory lives and how the CPU may reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryAccess {
    /// Device-local memory, not visible to the CPU.
    #[default]
    GpuLocal,
    /// Host-visible memory written by the CPU and read by the GPU.
    CpuUpload,
    /// Host-visible memory written by the GPU and read back by the CPU.
    CpuReadback,
}

impl MemoryAccess {
    /// Whether the CPU can map this memory.
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::GpuLocal)
    }
}

/// Descriptor for creating a native buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
    /// Memory placement.
    pub access: MemoryAccess,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage, access: MemoryAccess) -> Self {
        Self {
            label: None,
            size,
            usage,
            access,
        }
    }

    /// Descriptor for a throwaway upload buffer.
    pub fn staging(size: u64) -> Self {
        Self::new(size, BufferUsage::COPY_SRC, MemoryAccess::CpuUpload).with_label("staging")
    }

    /// Descriptor for a throwaway readback buffer.
    pub fn readback(size: u64) -> Self {
        Self::new(size, BufferUsage::COPY_DST, MemoryAccess::CpuReadback).with_label("readback")
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Role of a registry buffer. Decides how it is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Per-vertex data, bound at vertex input slot 0.
    Vertex,
    /// 32-bit indices.
    Index,
    /// Uniform data; element stride is padded to the device alignment.
    Uniform,
    /// General storage buffer.
    Storage,
}

impl BufferType {
    /// Native usage flags for this role.
    ///
    /// Every role can be a copy source and destination so staging uploads
    /// and readbacks work regardless of memory placement.
    pub fn usage(self) -> BufferUsage {
        let role = match self {
            Self::Vertex => BufferUsage::VERTEX,
            Self::Index => BufferUsage::INDEX,
            Self::Uniform => BufferUsage::UNIFORM,
            Self::Storage => BufferUsage::STORAGE,
        };
        role | BufferUsage::COPY_SRC | BufferUsage::COPY_DST
    }
}

/// Description of a registry buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    /// Role of the buffer.
    pub ty: BufferType,
    /// Memory placement.
    pub access: MemoryAccess,
    /// Number of elements.
    pub size: u64,
    /// Bytes per element.
    pub stride: u64,
}

impl BufferDesc {
    /// Create a buffer description.
    pub fn new(ty: BufferType, access: MemoryAccess, size: u64, stride: u64) -> Self {
        Self {
            ty,
            access,
            size,
            stride,
        }
    }

    /// Total size in bytes.
    pub fn byte_size(&self) -> u64 {
        self.size * self.stride
    }
}

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

/// Round `value` up to the next multiple of `alignment`.
///
/// An alignment of zero leaves the value untouched.
pub fn align_up(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size() {
        let desc = BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 4, 12);
        assert_eq!(desc.byte_size(), 48);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(12, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(7, 0), 7);
    }

    #[test]
    fn test_buffer_type_usage_includes_transfer() {
        let usage = BufferType::Uniform.usage();
        assert!(usage.contains(BufferUsage::UNIFORM));
        assert!(usage.contains(BufferUsage::COPY_SRC | BufferUsage::COPY_DST));
    }

    #[test]
    fn test_memory_access_visibility() {
        assert!(!MemoryAccess::GpuLocal.is_host_visible());
        assert!(MemoryAccess::CpuUpload.is_host_visible());
        assert!(MemoryAccess::CpuReadback.is_host_visible());
    }
}
