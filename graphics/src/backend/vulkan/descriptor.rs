//! Vulkan descriptor set layouts, pools and set updates.

use ash::vk;

use crate::error::GraphicsError;
use crate::types::{DescriptorBinding, DescriptorPoolSize};

use super::conversion::{convert_descriptor_type, convert_shader_stages};

/// Create a descriptor set layout.
pub fn create_set_layout(
    device: &ash::Device,
    bindings: &[DescriptorBinding],
) -> Result<vk::DescriptorSetLayout, GraphicsError> {
    let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
        .iter()
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding.binding)
                .descriptor_type(convert_descriptor_type(binding.ty))
                .descriptor_count(binding.count)
                .stage_flags(convert_shader_stages(binding.stages))
        })
        .collect();

    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);

    unsafe { device.create_descriptor_set_layout(&create_info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!(
            "Failed to create descriptor set layout: {:?}",
            e
        ))
    })
}

/// Create a descriptor pool that is only ever reset as a whole.
pub fn create_pool(
    device: &ash::Device,
    max_sets: u32,
    sizes: &[DescriptorPoolSize],
) -> Result<vk::DescriptorPool, GraphicsError> {
    let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
        .iter()
        .filter(|size| size.count > 0)
        .map(|size| vk::DescriptorPoolSize {
            ty: convert_descriptor_type(size.ty),
            descriptor_count: size.count,
        })
        .collect();

    let pool_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(max_sets)
        .pool_sizes(&pool_sizes);

    unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create descriptor pool: {:?}", e))
    })
}

/// Allocate one set, classifying pool exhaustion.
pub fn allocate_set(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
) -> Result<vk::DescriptorSet, GraphicsError> {
    let layouts = [layout];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&layouts);

    let sets = unsafe { device.allocate_descriptor_sets(&alloc_info) }.map_err(|e| match e {
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => GraphicsError::OutOfPoolMemory,
        vk::Result::ERROR_FRAGMENTED_POOL => GraphicsError::FragmentedPool,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            GraphicsError::OutOfMemory
        }
        other => GraphicsError::ResourceCreationFailed(format!(
            "Failed to allocate descriptor set: {:?}",
            other
        )),
    })?;

    sets.into_iter().next().ok_or_else(|| {
        GraphicsError::Internal("Descriptor set allocation returned nothing".to_string())
    })
}
