//! Vulkan instance creation and configuration.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::GraphicsError;

use super::debug;

/// Required Vulkan API version.
///
/// Classic render passes and `vkCmdPipelineBarrier` are enough here, so 1.2
/// keeps MoltenVK and older drivers in reach.
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 2, 0);

/// Validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Instance plus the optional debug-utils pieces.
pub struct InstanceBundle {
    pub instance: ash::Instance,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub debug_utils: Option<ash::ext::debug_utils::Instance>,
}

/// Create a headless Vulkan instance with optional validation layers.
///
/// Debug utils is enabled whenever the extension is present so objects can
/// be named even without validation; the messenger only with validation.
pub fn create_instance(
    entry: &ash::Entry,
    validation_enabled: bool,
    app_name: &str,
) -> Result<InstanceBundle, GraphicsError> {
    let validation_available = validation_enabled && check_validation_layer_support(entry);

    if validation_enabled && !validation_available {
        log::warn!("Validation layers requested but not available");
    }

    let debug_utils_available = check_instance_extension_support(entry, ash::ext::debug_utils::NAME);
    if !debug_utils_available {
        log::warn!("VK_EXT_debug_utils not available, debug names are disabled");
    }

    let app_name = CString::new(app_name).map_err(|e| {
        GraphicsError::InvalidParameter(format!("Invalid application name: {}", e))
    })?;
    let engine_name = c"RedLilium GPU";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(REQUIRED_API_VERSION);

    let mut extensions = Vec::new();

    if debug_utils_available {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
    }

    let layer_names: Vec<*const std::ffi::c_char> = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    #[allow(unused_mut)]
    let mut create_flags = vk::InstanceCreateFlags::empty();

    #[cfg(target_os = "macos")]
    {
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let create_info = vk::InstanceCreateInfo::default()
        .flags(create_flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    let debug_utils = debug_utils_available
        .then(|| ash::ext::debug_utils::Instance::new(entry, &instance));

    let debug_messenger = match (&debug_utils, validation_available) {
        (Some(debug_utils), true) => Some(debug::create_debug_messenger(debug_utils)?),
        _ => None,
    };

    Ok(InstanceBundle {
        instance,
        debug_messenger,
        debug_utils,
    })
}

/// Check if the validation layer is available.
fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let available_layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(_) => return false,
    };

    available_layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    })
}

/// Check if an instance extension is available.
fn check_instance_extension_support(entry: &ash::Entry, extension: &CStr) -> bool {
    let available = match unsafe { entry.enumerate_instance_extension_properties(None) } {
        Ok(extensions) => extensions,
        Err(_) => return false,
    };

    available.iter().any(|ext| {
        let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
        name == extension
    })
}
