//! Logical device creation
//!
//! One queue is requested per distinct family, however many roles share it.
//! Extension and layer lists are checked against what the driver offers
//! before anything is created, so a missing name surfaces as a configuration
//! error rather than a driver rejection.

use std::ffi::{CStr, CString};

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use super::physical::{PhysicalDeviceInfo, QueueRoles};
use crate::config::ConfigError;
use crate::render::error::{RenderError, RenderResult};

/// Distinct family indices across all roles, ascending
pub fn unique_queue_families(roles: &QueueRoles) -> Vec<u32> {
    let mut families = vec![roles.graphics, roles.present, roles.transfer];
    families.sort_unstable();
    families.dedup();
    families
}

/// First name in `required` that `available` lacks
pub fn first_missing<'a>(required: &'a [String], available: &[String]) -> Option<&'a str> {
    required
        .iter()
        .find(|name| !available.iter().any(|offered| offered == *name))
        .map(String::as_str)
}

/// Fail with `MissingInstanceExtension` for the first unavailable extension
pub fn check_instance_extensions(required: &[String], available: &[String]) -> Result<(), ConfigError> {
    match first_missing(required, available) {
        Some(name) => Err(ConfigError::MissingInstanceExtension(name.to_string())),
        None => Ok(()),
    }
}

/// Fail with `MissingLayer` for the first unavailable validation layer
pub fn check_layers(required: &[String], available: &[String]) -> Result<(), ConfigError> {
    match first_missing(required, available) {
        Some(name) => Err(ConfigError::MissingLayer(name.to_string())),
        None => Ok(()),
    }
}

/// Configured device extensions plus the swapchain extension, deduplicated
pub fn device_extension_names(configured: &[String]) -> Vec<String> {
    let swapchain = SwapchainLoader::name().to_string_lossy().into_owned();
    let mut names = vec![swapchain];
    for name in configured {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

pub(crate) fn to_cstrings(names: &[String]) -> RenderResult<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str())
                .map_err(|_| RenderError::from(ConfigError::Invalid(format!("name contains a NUL byte: {name:?}"))))
        })
        .collect()
}

pub(crate) fn name_from_raw(raw: &[std::os::raw::c_char]) -> String {
    // SAFETY: the driver fills these fixed arrays with NUL-terminated strings.
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

/// Logical device and its queues
pub struct LogicalDevice {
    /// Device dispatch table
    pub device: ash::Device,
    /// Graphics queue
    pub graphics_queue: vk::Queue,
    /// Present queue; may equal the graphics queue
    pub present_queue: vk::Queue,
    /// Transfer queue; may equal the graphics queue
    pub transfer_queue: vk::Queue,
    /// Family assignment the queues came from
    pub roles: QueueRoles,
    /// Swapchain extension functions
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one queue per distinct family and dynamic
    /// rendering enabled
    ///
    /// Fails with `DeviceCreation` carrying the driver result if the driver
    /// rejects the request.
    pub fn new(
        instance: &ash::Instance,
        physical: &PhysicalDeviceInfo,
        extensions: &[String],
    ) -> RenderResult<Self> {
        let roles = physical.queue_roles.ok_or(RenderError::NoSuitableDevice)?;

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_queue_families(&roles)
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_names = to_cstrings(extensions)?;
        let extension_ptrs: Vec<*const std::os::raw::c_char> =
            extension_names.iter().map(|name| name.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical.sampler_anisotropy)
            .build();
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::builder()
            .dynamic_rendering(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features)
            .push_next(&mut vulkan13);

        let device = unsafe { instance.create_device(physical.handle, &create_info, None) }
            .map_err(|result| RenderError::DeviceCreation { result })?;

        let graphics_queue = unsafe { device.get_device_queue(roles.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(roles.present, 0) };
        let transfer_queue = unsafe { device.get_device_queue(roles.transfer, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        log::debug!(
            "Logical device created: graphics family {}, present family {}, transfer family {}",
            roles.graphics,
            roles.present,
            roles.transfer
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            transfer_queue,
            roles,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_shared_families_deduplicated() {
        let shared = QueueRoles {
            graphics: 0,
            present: 0,
            transfer: 0,
        };
        assert_eq!(unique_queue_families(&shared), vec![0]);

        let split = QueueRoles {
            graphics: 2,
            present: 0,
            transfer: 2,
        };
        assert_eq!(unique_queue_families(&split), vec![0, 2]);
    }

    #[test]
    fn test_missing_instance_extension_reported_by_name() {
        let available = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let required = names(&["VK_KHR_surface", "VK_EXT_debug_utils"]);

        let error = check_instance_extensions(&required, &available).unwrap_err();
        assert!(matches!(error, ConfigError::MissingInstanceExtension(ref name) if name == "VK_EXT_debug_utils"));
        assert!(check_instance_extensions(&required[..1], &available).is_ok());
    }

    #[test]
    fn test_missing_layer_is_config_error() {
        let error = check_layers(&names(&["VK_LAYER_KHRONOS_validation"]), &[]).unwrap_err();
        assert!(matches!(error, ConfigError::MissingLayer(_)));
    }

    #[test]
    fn test_swapchain_extension_always_first_and_unique() {
        let list = device_extension_names(&names(&["VK_KHR_swapchain", "VK_EXT_memory_budget"]));
        assert_eq!(list, names(&["VK_KHR_swapchain", "VK_EXT_memory_budget"]));
        assert_eq!(device_extension_names(&[]), names(&["VK_KHR_swapchain"]));
    }

    #[test]
    fn test_nul_in_name_rejected() {
        assert!(to_cstrings(&names(&["bad\0name"])).is_err());
    }
}
