//! Physical device selection and logical device creation.

use std::ffi::CStr;

use ash::vk;

use crate::backend::{DeviceFeatures, DeviceLimits};
use crate::error::GraphicsError;

/// Pick the physical device with the highest [`device_score`].
///
/// Devices without a graphics queue are skipped.
pub fn select_physical_device(
    instance: &ash::Instance,
) -> Result<vk::PhysicalDevice, GraphicsError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    devices
        .into_iter()
        .filter(|device| find_graphics_queue_family(instance, *device).is_ok())
        .map(|device| {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let score = device_score(&properties);
            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
            log::info!(
                "Vulkan device candidate {:?} ({:?}, score {})",
                name,
                properties.device_type,
                score
            );
            (device, score)
        })
        .max_by_key(|(_, score)| *score)
        .map(|(device, _)| device)
        .ok_or_else(|| {
            GraphicsError::InitializationFailed("No Vulkan device with a graphics queue".to_string())
        })
}

/// Rank a device: discrete over integrated over everything else, then by
/// maximum image size.
fn device_score(properties: &vk::PhysicalDeviceProperties) -> u32 {
    let kind = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
        _ => 1,
    };
    kind + properties.limits.max_image_dimension2_d / 1024
}

/// Index of the first queue family with graphics support.
pub fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32, GraphicsError> {
    unsafe { instance.get_physical_device_queue_family_properties(physical_device) }
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
        .ok_or_else(|| {
            GraphicsError::InitializationFailed("No graphics queue family found".to_string())
        })
}

/// Read the limits the registries and the pipeline builder care about.
pub fn query_limits(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> DeviceLimits {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let limits = properties.limits;
    DeviceLimits {
        min_uniform_buffer_offset_alignment: limits.min_uniform_buffer_offset_alignment,
        max_push_constants_size: limits.max_push_constants_size,
        max_viewports: limits.max_viewports,
        max_image_dimension_2d: limits.max_image_dimension2_d,
    }
}

/// Optional features the device supports.
pub fn query_features(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    debug_utils: bool,
) -> DeviceFeatures {
    let features = unsafe { instance.get_physical_device_features(physical_device) };
    let supported = DeviceFeatures {
        fill_mode_non_solid: features.fill_mode_non_solid == vk::TRUE,
        multi_viewport: features.multi_viewport == vk::TRUE,
        debug_utils,
    };
    if !supported.fill_mode_non_solid {
        log::warn!("fillModeNonSolid not supported, line and point pipelines are unavailable");
    }
    if !supported.multi_viewport {
        log::warn!("multiViewport not supported, pipelines are limited to one viewport");
    }
    supported
}

/// Create a logical device with one graphics queue.
///
/// Optional features are enabled only when `features` reports them.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    graphics_queue_family: u32,
    features: &DeviceFeatures,
) -> Result<ash::Device, GraphicsError> {
    let queue_priorities = [1.0f32];
    let queue_create_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(graphics_queue_family)
        .queue_priorities(&queue_priorities);

    let queue_create_infos = [queue_create_info];
    let enabled_features = vk::PhysicalDeviceFeatures::default()
        .fill_mode_non_solid(features.fill_mode_non_solid)
        .multi_viewport(features.multi_viewport);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_features(&enabled_features);

    unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
    })
}
