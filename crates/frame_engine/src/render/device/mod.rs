//! GPU selection and logical device creation

pub mod logical;
pub mod physical;

pub use logical::{
    check_instance_extensions, check_layers, device_extension_names, unique_queue_families,
    LogicalDevice,
};
pub use physical::{
    default_score, find_memory_type, pick_best_gpu, DeviceRequirements, PhysicalDeviceInfo,
    QueueRoles,
};
