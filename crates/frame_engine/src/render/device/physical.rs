//! Physical device selection
//!
//! Candidates are described by [`PhysicalDeviceInfo`], a snapshot of what the
//! driver reports. [`pick_best_gpu`] filters them with a suitability
//! predicate and returns the strict-highest scorer; ties go to the device
//! enumerated first.

use ash::vk;

use crate::foundation::version::ApiVersion;
use crate::render::error::{RenderError, RenderResult};

/// Queue family chosen for each role; roles may share a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRoles {
    /// Graphics submissions
    pub graphics: u32,
    /// Presentation
    pub present: u32,
    /// Transfers
    pub transfer: u32,
}

impl QueueRoles {
    /// Assign roles from the family list
    ///
    /// Graphics takes the first family with graphics support. Present
    /// prefers the graphics family, then the first family that can present.
    /// Transfer prefers a dedicated transfer family and falls back to
    /// graphics. `None` when no family can do graphics or presentation.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        can_present: impl Fn(u32) -> bool,
    ) -> Option<Self> {
        let indexed = || (0_u32..).zip(families.iter());

        let graphics = indexed()
            .find(|(_, family)| family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(index, _)| index)?;

        let present = if can_present(graphics) {
            graphics
        } else {
            indexed()
                .find(|(index, family)| family.queue_count > 0 && can_present(*index))
                .map(|(index, _)| index)?
        };

        let transfer = indexed()
            .find(|(_, family)| {
                family.queue_count > 0
                    && family.queue_flags.contains(vk::QueueFlags::TRANSFER)
                    && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            })
            .map_or(graphics, |(index, _)| index);

        Some(Self {
            graphics,
            present,
            transfer,
        })
    }
}

/// What the driver reports about one GPU
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Driver handle
    pub handle: vk::PhysicalDevice,
    /// Marketing name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// Highest API version the device supports
    pub api_version: ApiVersion,
    /// Largest 2D image dimension
    pub max_image_dimension_2d: u32,
    /// Role assignment, if one is complete
    pub queue_roles: Option<QueueRoles>,
    /// Supported device extension names
    pub extensions: Vec<String>,
    /// Whether the dynamic rendering feature is available
    pub dynamic_rendering: bool,
    /// Whether anisotropic filtering is available
    pub sampler_anisotropy: bool,
    /// Memory types in driver order
    pub memory_types: Vec<vk::MemoryType>,
}

impl PhysicalDeviceInfo {
    /// True when every name in `required` is supported
    pub fn supports_extensions(&self, required: &[String]) -> bool {
        required
            .iter()
            .all(|name| self.extensions.iter().any(|available| available == name))
    }

    /// Index of the first memory type allowed by `type_bits` that has all of
    /// `properties`
    pub fn find_memory_type(&self, type_bits: u32, properties: vk::MemoryPropertyFlags) -> Option<u32> {
        find_memory_type(&self.memory_types, type_bits, properties)
    }
}

/// Index of the first memory type allowed by `type_bits` that has all of
/// `properties`
pub fn find_memory_type(
    memory_types: &[vk::MemoryType],
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0_u32..32)
        .zip(memory_types.iter())
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(index, _)| index)
}

/// Default suitability predicate
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    /// Lowest acceptable API version
    pub min_api_version: ApiVersion,
    /// Device extensions that must be present
    pub extensions: Vec<String>,
}

impl DeviceRequirements {
    /// Requirements for the frame protocol: Vulkan 1.3 and the given extensions
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            min_api_version: ApiVersion::VULKAN_1_3,
            extensions,
        }
    }

    /// Complete queue roles, required extensions, a new enough API and
    /// dynamic rendering
    pub fn is_suitable(&self, info: &PhysicalDeviceInfo) -> bool {
        info.queue_roles.is_some()
            && info.supports_extensions(&self.extensions)
            && info.api_version.supports(self.min_api_version)
            && info.dynamic_rendering
    }
}

/// Default score: device type first, then maximum texture size
pub fn default_score(info: &PhysicalDeviceInfo) -> u64 {
    let type_score = match info.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 0,
    };
    type_score + u64::from(info.max_image_dimension_2d / 1024)
}

/// Return the strict-highest scoring suitable candidate
///
/// Ties keep the candidate that comes first. Fails with `NoSuitableDevice`
/// when no candidate passes `is_suitable`.
pub fn pick_best_gpu<T>(
    candidates: &[T],
    is_suitable: impl Fn(&T) -> bool,
    score: impl Fn(&T) -> u64,
) -> RenderResult<&T> {
    let mut best: Option<(&T, u64)> = None;
    for candidate in candidates.iter().filter(|candidate| is_suitable(*candidate)) {
        let candidate_score = score(candidate);
        if best.map_or(true, |(_, best_score)| candidate_score > best_score) {
            best = Some((candidate, candidate_score));
        }
    }
    best.map(|(candidate, _)| candidate)
        .ok_or(RenderError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn gpu(name: &str, device_type: vk::PhysicalDeviceType) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            handle: vk::PhysicalDevice::null(),
            name: name.to_string(),
            device_type,
            api_version: ApiVersion::VULKAN_1_3,
            max_image_dimension_2d: 16384,
            queue_roles: Some(QueueRoles {
                graphics: 0,
                present: 0,
                transfer: 0,
            }),
            extensions: vec!["VK_KHR_swapchain".to_string()],
            dynamic_rendering: true,
            sampler_anisotropy: true,
            memory_types: Vec::new(),
        }
    }

    #[test]
    fn test_picks_strict_highest_score() {
        let candidates = [("a", 3), ("b", 9), ("c", 5)];
        let best = pick_best_gpu(&candidates, |_| true, |c| c.1).unwrap();
        assert_eq!(best.0, "b");
    }

    #[test]
    fn test_tie_goes_to_first_enumerated() {
        let candidates = [("a", 1), ("b", 7), ("c", 7)];
        let best = pick_best_gpu(&candidates, |_| true, |c| c.1).unwrap();
        assert_eq!(best.0, "b");
    }

    #[test]
    fn test_unsuitable_never_wins() {
        let candidates = [("fast", 100, false), ("slow", 1, true)];
        let best = pick_best_gpu(&candidates, |c| c.2, |c| c.1).unwrap();
        assert_eq!(best.0, "slow");
    }

    #[test]
    fn test_empty_eligible_set_fails() {
        let candidates = [("a", 1), ("b", 2)];
        let result = pick_best_gpu(&candidates, |_| false, |c| c.1);
        assert!(matches!(result, Err(RenderError::NoSuitableDevice)));

        let none: [(&str, u64); 0] = [];
        assert!(pick_best_gpu(&none, |_| true, |c| c.1).is_err());
    }

    #[test]
    fn test_selection_is_stable_across_orders() {
        let scores = [4_u64, 12, 7, 12, 0, 3];
        for rotation in 0..scores.len() {
            let mut rotated: Vec<(usize, u64)> = scores.iter().copied().enumerate().collect();
            rotated.rotate_left(rotation);

            let best = pick_best_gpu(&rotated, |_| true, |c| c.1).unwrap();
            let expected = rotated.iter().find(|c| c.1 == 12).unwrap();
            assert_eq!(best.0, expected.0);
        }
    }

    #[test]
    fn test_default_score_prefers_discrete() {
        let discrete = gpu("discrete", vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = gpu("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU);
        assert_eq!(default_score(&discrete), 1016);
        assert_eq!(default_score(&integrated), 116);

        let candidates = [integrated, discrete];
        let requirements = DeviceRequirements::new(vec!["VK_KHR_swapchain".to_string()]);
        let best = pick_best_gpu(&candidates, |c| requirements.is_suitable(c), default_score).unwrap();
        assert_eq!(best.name, "discrete");
    }

    #[test]
    fn test_requirements_reject_old_api_and_missing_features() {
        let requirements = DeviceRequirements::new(vec!["VK_KHR_swapchain".to_string()]);

        let mut old = gpu("old", vk::PhysicalDeviceType::DISCRETE_GPU);
        old.api_version = ApiVersion::VULKAN_1_0;
        assert!(!requirements.is_suitable(&old));

        let mut no_dynamic = gpu("no dynamic rendering", vk::PhysicalDeviceType::DISCRETE_GPU);
        no_dynamic.dynamic_rendering = false;
        assert!(!requirements.is_suitable(&no_dynamic));

        let mut headless = gpu("headless", vk::PhysicalDeviceType::DISCRETE_GPU);
        headless.queue_roles = None;
        assert!(!requirements.is_suitable(&headless));

        let mut bare = gpu("bare", vk::PhysicalDeviceType::DISCRETE_GPU);
        bare.extensions.clear();
        assert!(!requirements.is_suitable(&bare));
    }

    #[test]
    fn test_queue_roles_prefer_shared_graphics_present() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let roles = QueueRoles::find(&families, |_| true).unwrap();
        assert_eq!(roles.graphics, 1);
        assert_eq!(roles.present, 1);
        assert_eq!(roles.transfer, 0);
    }

    #[test]
    fn test_queue_roles_separate_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::COMPUTE)];
        let roles = QueueRoles::find(&families, |index| index == 1).unwrap();
        assert_eq!(roles.graphics, 0);
        assert_eq!(roles.present, 1);
        assert_eq!(roles.transfer, 0);
    }

    #[test]
    fn test_queue_roles_incomplete() {
        let compute_only = [family(vk::QueueFlags::COMPUTE)];
        assert!(QueueRoles::find(&compute_only, |_| true).is_none());

        let no_present = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueRoles::find(&no_present, |_| false).is_none());
    }

    #[test]
    fn test_memory_type_lookup() {
        let memory_types = [
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                heap_index: 0,
            },
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 1,
            },
        ];
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        assert_eq!(find_memory_type(&memory_types, 0b11, host), Some(1));
        assert_eq!(find_memory_type(&memory_types, 0b01, host), None);
        assert_eq!(
            find_memory_type(&memory_types, 0b11, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
    }
}
