//! Instance, debug messenger and surface loader

use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;

use crate::core::config::RendererConfig;
use crate::render::device::logical::{name_from_raw, to_cstrings};
use crate::render::device::{check_instance_extensions, check_layers};
use crate::render::error::{RenderError, RenderResult};

const ENGINE_NAME: &str = "frame_engine";

/// Vulkan instance with its optional debug messenger
pub struct VulkanInstance {
    /// Loader entry points
    pub entry: Entry,
    /// Instance dispatch table
    pub instance: Instance,
    /// Surface extension functions
    pub surface_loader: Surface,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Load the driver and create an instance for windows on `display`
    ///
    /// Required instance extensions and validation layers are checked before
    /// the instance is created; a missing one is a configuration error.
    /// Validation is only enabled in debug builds.
    pub fn new(config: &RendererConfig, display: RawDisplayHandle) -> RenderResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| RenderError::Initialization(format!("Failed to load Vulkan: {e}")))?;

        let validation = config.validation.is_active();

        let window_extensions = ash_window::enumerate_required_extensions(display)
            .map_err(|result| RenderError::Initialization(format!("No window system extensions: {result:?}")))?;
        let mut extensions: Vec<String> = window_extensions
            .iter()
            // SAFETY: ash-window returns pointers to static NUL-terminated names.
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
            .collect();
        for name in &config.required_instance_extensions {
            if !extensions.contains(name) {
                extensions.push(name.clone());
            }
        }
        if validation {
            extensions.push(DebugUtils::name().to_string_lossy().into_owned());
        }

        let available_extensions: Vec<String> = entry
            .enumerate_instance_extension_properties(None)
            .map_err(|result| RenderError::Initialization(format!("Extension query failed: {result:?}")))?
            .iter()
            .map(|properties| name_from_raw(&properties.extension_name))
            .collect();
        check_instance_extensions(&extensions, &available_extensions)?;

        let layers = if validation {
            let available_layers: Vec<String> = entry
                .enumerate_instance_layer_properties()
                .map_err(|result| RenderError::Initialization(format!("Layer query failed: {result:?}")))?
                .iter()
                .map(|properties| name_from_raw(&properties.layer_name))
                .collect();
            check_layers(&config.validation.layers, &available_layers)?;
            config.validation.layers.clone()
        } else {
            Vec::new()
        };

        let app_name = to_cstrings(std::slice::from_ref(&config.application_name))?;
        let engine_name = CString::new(ENGINE_NAME)
            .map_err(|e| RenderError::Initialization(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name[0])
            .application_version(config.application_version.pack())
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extension_names = to_cstrings(&extensions)?;
        let extension_ptrs: Vec<*const std::os::raw::c_char> =
            extension_names.iter().map(|name| name.as_ptr()).collect();
        let layer_names = to_cstrings(&layers)?;
        let layer_ptrs: Vec<*const std::os::raw::c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|result| RenderError::Initialization(format!("vkCreateInstance failed: {result:?}")))?;

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
                .message_severity(config.validation.severity.to_vk())
                .message_type(config.validation.message_types.to_vk())
                .pfn_user_callback(Some(debug_callback));
            match unsafe { debug_utils.create_debug_utils_messenger(&messenger_info, None) } {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(result) => {
                    log::warn!("Debug messenger unavailable: {:?}", result);
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = Surface::new(&entry, &instance);

        log::info!(
            "Vulkan instance created (validation {})",
            if debug.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            entry,
            instance,
            surface_loader,
            debug,
        })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Route validation messages to the log by severity
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::info!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}
