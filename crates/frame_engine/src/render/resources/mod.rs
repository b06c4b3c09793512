//! GPU resource ownership and deferred destruction
//!
//! Every resource kind gets its own [`ResourceManager`]. [`GpuResources`]
//! groups one manager per kind so the frame executor can sweep them all
//! after each fence wait and free them all at teardown.

mod kinds;
mod manager;

pub use kinds::{
    Buffer, BufferDesc, DescriptorBinding, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, GraphicsPipelineDesc, Image, ImageDesc, Pipeline, Sampler, SamplerDesc,
};
pub use manager::{PendingDestruction, ResourceManager};

use crate::foundation::collections::Handle;
use crate::render::backend::GpuDevice;

/// A driver object that can be released through a [`GpuDevice`]
pub trait GpuResource {
    /// Human-readable kind used in log lines
    const KIND: &'static str;

    /// Release the driver objects; called exactly once by the owning manager
    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D);
}

/// Resource kinds with a manager inside [`GpuResources`]
pub trait ManagedResource: GpuResource + Sized {
    /// The manager for this kind
    fn manager(resources: &GpuResources) -> &ResourceManager<Self>;
    /// The manager for this kind, mutably
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self>;
}

/// One resource manager per kind
#[derive(Default)]
pub struct GpuResources {
    buffers: ResourceManager<Buffer>,
    images: ResourceManager<Image>,
    samplers: ResourceManager<Sampler>,
    set_layouts: ResourceManager<DescriptorSetLayout>,
    descriptor_pools: ResourceManager<DescriptorPool>,
    pipelines: ResourceManager<Pipeline>,
}

impl GpuResources {
    /// Create empty managers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource with the manager for its kind
    pub fn add<T: ManagedResource>(&mut self, resource: T, name: impl Into<String>) -> Handle<T> {
        T::manager_mut(self).add(resource, name)
    }

    /// Look up a resource of any kind
    pub fn get<T: ManagedResource>(&self, handle: Handle<T>) -> Option<&T> {
        T::manager(self).get(handle)
    }

    /// Queue a resource for destruction after `generation` retires
    pub fn enqueue_destroy<T: ManagedResource>(&mut self, handle: Handle<T>, generation: u64) {
        T::manager_mut(self).enqueue_destroy(handle, generation);
    }

    /// Manager for one kind
    pub fn manager<T: ManagedResource>(&self) -> &ResourceManager<T> {
        T::manager(self)
    }

    /// Sweep every kind for resources retired by `retired_generation`
    pub fn try_cleanup<D: GpuDevice + ?Sized>(&mut self, device: &D, retired_generation: u64) -> usize {
        // Pipelines and pools go before the layouts and images they reference.
        self.pipelines.try_cleanup(device, retired_generation)
            + self.descriptor_pools.try_cleanup(device, retired_generation)
            + self.set_layouts.try_cleanup(device, retired_generation)
            + self.samplers.try_cleanup(device, retired_generation)
            + self.images.try_cleanup(device, retired_generation)
            + self.buffers.try_cleanup(device, retired_generation)
    }

    /// Free everything; the caller has already waited for idle
    pub(crate) fn destroy_all<D: GpuDevice + ?Sized>(&mut self, device: &D) -> usize {
        self.pipelines.destroy_all(device)
            + self.descriptor_pools.destroy_all(device)
            + self.set_layouts.destroy_all(device)
            + self.samplers.destroy_all(device)
            + self.images.destroy_all(device)
            + self.buffers.destroy_all(device)
    }

    /// Resources registered across all kinds
    pub fn len(&self) -> usize {
        self.buffers.len()
            + self.images.len()
            + self.samplers.len()
            + self.set_layouts.len()
            + self.descriptor_pools.len()
            + self.pipelines.len()
    }

    /// True when no resource of any kind is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy requests waiting across all kinds
    pub fn pending_len(&self) -> usize {
        self.buffers.pending_len()
            + self.images.pending_len()
            + self.samplers.pending_len()
            + self.set_layouts.pending_len()
            + self.descriptor_pools.pending_len()
            + self.pipelines.pending_len()
    }
}

impl ManagedResource for Buffer {
    fn manager(resources: &GpuResources) -> &ResourceManager<Self> {
        &resources.buffers
    }
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self> {
        &mut resources.buffers
    }
}

impl ManagedResource for Image {
    fn manager(resources: &GpuResources) -> &ResourceManager<Self> {
        &resources.images
    }
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self> {
        &mut resources.images
    }
}

impl ManagedResource for Sampler {
    fn manager(resources: &GpuResources) -> &ResourceManager<Self> {
        &resources.samplers
    }
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self> {
        &mut resources.samplers
    }
}

impl ManagedResource for DescriptorSetLayout {
    fn manager(resources: &GpuResources) -> &ResourceManager<Self> {
        &resources.set_layouts
    }
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self> {
        &mut resources.set_layouts
    }
}

impl ManagedResource for DescriptorPool {
    fn manager(resources: &GpuResources) -> &ResourceManager<Self> {
        &resources.descriptor_pools
    }
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self> {
        &mut resources.descriptor_pools
    }
}

impl ManagedResource for Pipeline {
    fn manager(resources: &GpuResources) -> &ResourceManager<Self> {
        &resources.pipelines
    }
    fn manager_mut(resources: &mut GpuResources) -> &mut ResourceManager<Self> {
        &mut resources.pipelines
    }
}
