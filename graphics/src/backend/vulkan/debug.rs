//! Debug-utils messenger and object names.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::error::GraphicsError;

/// Route validation layer output through [`debug_callback`].
pub fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> Result<vk::DebugUtilsMessengerEXT, GraphicsError> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
    })
}

/// Attach `name` to a Vulkan object.
///
/// Naming failures are logged and otherwise ignored.
pub fn set_object_name<T: vk::Handle>(
    debug_utils: &ash::ext::debug_utils::Device,
    object: T,
    name: &str,
) {
    let Ok(name) = CString::new(name) else {
        log::warn!("Debug name {:?} contains a NUL byte, skipping", name);
        return;
    };
    let name_info = vk::DebugUtilsObjectNameInfoEXT::default()
        .object_handle(object)
        .object_name(&name);

    if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&name_info) } {
        log::warn!("Failed to set debug name {:?}: {:?}", name, e);
    }
}

/// Forward validation messages to `log`.
///
/// Errors and warnings keep their level, info drops to debug and verbose
/// output to trace.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    kind: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes either null or a valid callback data struct
    // whose message is a NUL-terminated string for the duration of the call.
    let message = unsafe { callback_data.as_ref() }
        .filter(|data| !data.p_message.is_null())
        .map(|data| unsafe { CStr::from_ptr(data.p_message) }.to_string_lossy())
        .unwrap_or_default();

    let level = match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Debug,
        _ => log::Level::Trace,
    };
    log::log!(level, "[vulkan {:?}] {}", kind, message);

    vk::FALSE
}
