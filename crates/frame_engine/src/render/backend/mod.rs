//! Driver capability interface
//!
//! [`GpuDevice`] is the set of driver entry points the frame core consumes.
//! The swapchain manager, frame ring, resource managers and frame executor
//! are written against this trait only; [`crate::render::vulkan::VulkanContext`]
//! implements it on top of `ash`, and tests drive the same code through a
//! scripted mock.
//!
//! Handles are the raw `vk::*` types so a backend never has to translate IDs.
//! Frame-protocol calls return the raw [`VkResult`] so the caller can tell
//! recoverable presentation codes apart from fatal ones. Resource creation
//! returns [`RenderResult`] because the backend is the only place that knows
//! which of several driver calls (create, allocate, bind) failed.

use ash::prelude::VkResult;
use ash::vk;

use crate::render::error::RenderResult;
use crate::render::resources::{
    Buffer, BufferDesc, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, GraphicsPipelineDesc, Image, ImageDesc, Pipeline, Sampler,
    SamplerDesc,
};
use crate::render::sync::ImageBarrier;

#[cfg(test)]
pub mod mock;

/// Everything the surface reports about what a swapchain may look like
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format/color-space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Parameters for a swapchain creation call
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    /// Surface the chain presents to
    pub surface: vk::SurfaceKHR,
    /// Minimum number of images requested
    pub min_image_count: u32,
    /// Image format and color space
    pub format: vk::SurfaceFormatKHR,
    /// Image extent, already clamped to the surface limits
    pub extent: vk::Extent2D,
    /// Present mode, already validated against the surface
    pub present_mode: vk::PresentModeKHR,
    /// Transform reported by the surface
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Previous chain, passed as a hint on recreation
    pub old_swapchain: vk::SwapchainKHR,
}

/// One frame's queue submission
#[derive(Debug, Clone, Copy)]
pub struct FrameSubmission {
    /// Recorded command buffer
    pub command_buffer: vk::CommandBuffer,
    /// Image-acquired semaphore to wait on
    pub wait_semaphore: vk::Semaphore,
    /// Stage at which the wait applies
    pub wait_stage: vk::PipelineStageFlags,
    /// Render-finished semaphore for the acquired image
    pub signal_semaphore: vk::Semaphore,
    /// Slot fence signaled when the GPU finishes
    pub fence: vk::Fence,
}

/// One frame's present request
#[derive(Debug, Clone, Copy)]
pub struct FramePresentation {
    /// Chain owning the image
    pub swapchain: vk::SwapchainKHR,
    /// Acquired image index
    pub image_index: u32,
    /// Render-finished semaphore for that image
    pub wait_semaphore: vk::Semaphore,
}

/// Color target for a dynamic-rendering pass
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    /// View of the acquired swapchain image
    pub view: vk::ImageView,
    /// Render area
    pub extent: vk::Extent2D,
    /// Clear color applied on load
    pub clear_color: [f32; 4],
}

/// Driver entry points consumed by the frame core
pub trait GpuDevice {
    // Synchronization

    /// Create a binary semaphore
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);
    /// Block until the fence signals or `timeout_ns` elapses (`Err(TIMEOUT)`)
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()>;
    /// Return a fence to the unsignaled state
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;
    /// Block until every queue is idle
    fn device_wait_idle(&self) -> VkResult<()>;

    // Command buffers

    /// Create a resettable command pool on the graphics family
    fn create_command_pool(&self) -> VkResult<vk::CommandPool>;
    /// Destroy a command pool and every buffer allocated from it
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    /// Allocate primary command buffers
    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    /// Reset a command buffer for re-recording
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    /// Begin one-time-submit recording
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    /// Finish recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
    /// Record an image layout transition
    fn cmd_image_barrier(&self, command_buffer: vk::CommandBuffer, barrier: &ImageBarrier);
    /// Begin a dynamic-rendering pass and set a full-target viewport/scissor
    fn cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, target: &RenderTarget);
    /// End the dynamic-rendering pass
    fn cmd_end_rendering(&self, command_buffer: vk::CommandBuffer);

    // Queues

    /// Submit one frame on the graphics queue
    fn queue_submit(&self, submission: &FrameSubmission) -> VkResult<()>;
    /// Present on the present queue; `Ok(true)` means suboptimal
    fn queue_present(&self, presentation: &FramePresentation) -> VkResult<bool>;

    // Swapchain

    /// Query surface capabilities, formats and present modes
    fn surface_support(&self, surface: vk::SurfaceKHR) -> VkResult<SurfaceSupport>;
    /// Create a swapchain
    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    /// Images owned by the presentation engine for this chain
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    /// Destroy a swapchain
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    /// Create a 2D color view of a swapchain image
    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);
    /// Acquire the next presentable image; `Ok((index, true))` means suboptimal
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    // Resources

    /// Create a buffer with bound memory
    fn create_buffer(&self, desc: &BufferDesc) -> RenderResult<Buffer>;
    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: &Buffer);
    /// Copy bytes into a host-visible buffer
    fn write_buffer(&self, buffer: &Buffer, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()>;
    /// Create an image with bound memory and a default view
    fn create_image(&self, desc: &ImageDesc) -> RenderResult<Image>;
    /// Destroy an image, its view and its memory
    fn destroy_image(&self, image: &Image);
    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> RenderResult<Sampler>;
    /// Destroy a sampler
    fn destroy_sampler(&self, sampler: &Sampler);
    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        desc: &DescriptorSetLayoutDesc,
    ) -> RenderResult<DescriptorSetLayout>;
    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: &DescriptorSetLayout);
    /// Create a descriptor pool
    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> RenderResult<DescriptorPool>;
    /// Destroy a descriptor pool, implicitly freeing its sets
    fn destroy_descriptor_pool(&self, pool: &DescriptorPool);
    /// Allocate descriptor sets from a pool
    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<Vec<vk::DescriptorSet>>;
    /// Create a graphics pipeline and its layout
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> RenderResult<Pipeline>;
    /// Destroy a pipeline and its layout
    fn destroy_pipeline(&self, pipeline: &Pipeline);
}
