//! Descriptor types.

use super::ShaderStages;

/// Kind of resource a descriptor binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Standalone sampler.
    Sampler,
    /// Image and sampler in one binding.
    CombinedImageSampler,
    /// Sampled image without a sampler.
    SampledImage,
    /// Read/write storage image.
    StorageImage,
    /// Uniform buffer.
    UniformBuffer,
    /// Storage buffer.
    StorageBuffer,
    /// Uniform buffer with a dynamic offset.
    UniformBufferDynamic,
    /// Storage buffer with a dynamic offset.
    StorageBufferDynamic,
}

impl DescriptorType {
    /// Whether the binding takes a buffer.
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            Self::UniformBuffer
                | Self::StorageBuffer
                | Self::UniformBufferDynamic
                | Self::StorageBufferDynamic
        )
    }
}

/// One binding in a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    /// Binding index in the shader.
    pub binding: u32,
    /// Kind of resource.
    pub ty: DescriptorType,
    /// Array length.
    pub count: u32,
    /// Stages that can see the binding.
    pub stages: ShaderStages,
}

/// Descriptor capacity of a pool for one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorPoolSize {
    /// Descriptor type.
    pub ty: DescriptorType,
    /// Number of descriptors of that type.
    pub count: u32,
}

/// Descriptors of one type reserved per set when sizing a pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    /// Descriptor type.
    pub ty: DescriptorType,
    /// Descriptors per set.
    pub ratio: f32,
}

impl PoolSizeRatio {
    /// Create a ratio entry.
    pub fn new(ty: DescriptorType, ratio: f32) -> Self {
        Self { ty, ratio }
    }

    /// Pool capacity for `max_sets` sets.
    pub fn pool_size(&self, max_sets: u32) -> DescriptorPoolSize {
        DescriptorPoolSize {
            ty: self.ty,
            count: (self.ratio * max_sets as f32).ceil() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_from_ratio() {
        let ratio = PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.5);
        assert_eq!(ratio.pool_size(10).count, 15);
        assert_eq!(ratio.pool_size(10).ty, DescriptorType::UniformBuffer);
    }

    #[test]
    fn test_buffer_classification() {
        assert!(DescriptorType::UniformBuffer.is_buffer());
        assert!(!DescriptorType::CombinedImageSampler.is_buffer());
    }
}
