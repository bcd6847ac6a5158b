//! Configuration for the resource core.

use crate::types::{DescriptorType, PoolSizeRatio};

/// Default number of frames a destroyed resource is kept alive for.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;

/// Settings for a [`ResourceContext`](crate::ResourceContext).
///
/// # Example
///
/// ```
/// use redlilium_gpu::CoreConfig;
///
/// let config = CoreConfig::new()
///     .with_buffer_capacity(256)
///     .with_frames_in_flight(2)
///     .with_strict_layout_validation(true);
/// assert_eq!(config.frames_in_flight, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Number of buffer slots in the buffer registry.
    pub buffer_capacity: u32,
    /// Number of image slots in the image registry.
    pub image_capacity: u32,
    /// Frames a destroyed native object waits before it is released.
    pub frames_in_flight: usize,
    /// Reject layout transitions the image type can never make. Off by
    /// default, where every transition is permitted.
    pub strict_layout_validation: bool,
    /// Set count of the first descriptor pool.
    pub descriptor_max_sets: u32,
    /// Descriptors reserved per set, by type.
    pub descriptor_ratios: Vec<PoolSizeRatio>,
}

impl CoreConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer registry capacity.
    pub fn with_buffer_capacity(mut self, capacity: u32) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the image registry capacity.
    pub fn with_image_capacity(mut self, capacity: u32) -> Self {
        self.image_capacity = capacity;
        self
    }

    /// Set how many frames destroyed objects are kept alive.
    ///
    /// Values below one are clamped to one.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames.max(1);
        self
    }

    /// Enable or disable strict layout transition validation.
    pub fn with_strict_layout_validation(mut self, strict: bool) -> Self {
        self.strict_layout_validation = strict;
        self
    }

    /// Set the descriptor allocator's initial pool size and type ratios.
    pub fn with_descriptor_pools(mut self, max_sets: u32, ratios: Vec<PoolSizeRatio>) -> Self {
        self.descriptor_max_sets = max_sets;
        self.descriptor_ratios = ratios;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1024,
            image_capacity: 1024,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            strict_layout_validation: false,
            descriptor_max_sets: 1000,
            descriptor_ratios: vec![
                PoolSizeRatio::new(DescriptorType::UniformBuffer, 3.0),
                PoolSizeRatio::new(DescriptorType::StorageBuffer, 2.0),
                PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 4.0),
                PoolSizeRatio::new(DescriptorType::StorageImage, 1.0),
            ],
        }
    }
}
