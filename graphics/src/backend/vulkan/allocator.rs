//! GPU memory allocator integration using gpu-allocator.

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};

use crate::error::GraphicsError;
use crate::types::MemoryAccess;

/// Create a memory allocator for the Vulkan device.
pub fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
) -> Result<Allocator, GraphicsError> {
    let allocator = Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device,
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })?;

    Ok(allocator)
}

/// Memory location for a buffer placement.
pub fn memory_location(access: MemoryAccess) -> MemoryLocation {
    match access {
        MemoryAccess::GpuLocal => MemoryLocation::GpuOnly,
        MemoryAccess::CpuUpload => MemoryLocation::CpuToGpu,
        MemoryAccess::CpuReadback => MemoryLocation::GpuToCpu,
    }
}

/// Map an allocator failure onto the error taxonomy.
pub fn allocation_error(what: &str, error: gpu_allocator::AllocationError) -> GraphicsError {
    match error {
        gpu_allocator::AllocationError::OutOfMemory => {
            log::error!("Out of GPU memory allocating {}", what);
            GraphicsError::OutOfMemory
        }
        other => GraphicsError::ResourceCreationFailed(format!(
            "Failed to allocate {} memory: {}",
            what, other
        )),
    }
}
