//! Scripted in-memory device for tests
//!
//! Hands out fake handles, records every call in order and replays queued
//! results for acquire, present, submit and fence waits. Fences behave like
//! the real thing: a submission signals its fence, a reset unsignals it, and
//! waiting on an unsignaled fence with nothing in flight times out.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use super::{FramePresentation, FrameSubmission, GpuDevice, RenderTarget, SurfaceSupport, SwapchainDesc};
use crate::render::error::{RenderError, RenderResult};
use crate::render::resources::{
    Buffer, BufferDesc, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, GraphicsPipelineDesc, Image, ImageDesc, Pipeline, Sampler,
    SamplerDesc,
};
use crate::render::sync::ImageBarrier;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSemaphore(vk::Semaphore),
    DestroySemaphore(vk::Semaphore),
    CreateFence { signaled: bool },
    DestroyFence(vk::Fence),
    WaitForFence(vk::Fence),
    ResetFence(vk::Fence),
    DeviceWaitIdle,
    CreateCommandPool,
    DestroyCommandPool(vk::CommandPool),
    AllocateCommandBuffers(u32),
    ResetCommandBuffer(vk::CommandBuffer),
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    ImageBarrier {
        image: vk::Image,
        new_layout: vk::ImageLayout,
    },
    BeginRendering {
        view: vk::ImageView,
        extent: vk::Extent2D,
    },
    EndRendering,
    QueueSubmit {
        command_buffer: vk::CommandBuffer,
        wait_semaphore: vk::Semaphore,
        signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    },
    QueuePresent {
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    },
    CreateSwapchain {
        extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    },
    DestroySwapchain(vk::SwapchainKHR),
    DestroyImageView(vk::ImageView),
    AcquireNextImage {
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    },
    CreateBuffer(vk::Buffer),
    DestroyBuffer(vk::Buffer),
    WriteBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        len: usize,
    },
    CreateImage(vk::Image),
    DestroyImage(vk::Image),
    DestroySampler(vk::Sampler),
    DestroyDescriptorSetLayout(vk::DescriptorSetLayout),
    DestroyDescriptorPool(vk::DescriptorPool),
    AllocateDescriptorSets { pool: vk::DescriptorPool, count: usize },
    DestroyPipeline(vk::Pipeline),
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    calls: Vec<Call>,
    live_objects: HashSet<u64>,
    live_resources: HashSet<u64>,
    double_destroys: Vec<u64>,
    signaled_fences: HashMap<u64, bool>,
    image_count: u32,
    surface_support: SurfaceSupport,
    swapchain_images: HashMap<u64, Vec<vk::Image>>,
    next_image: HashMap<u64, u32>,
    acquire_results: VecDeque<VkResult<(u32, bool)>>,
    present_results: VecDeque<VkResult<bool>>,
    submit_results: VecDeque<VkResult<()>>,
    wait_results: VecDeque<VkResult<()>>,
    fence_failure: Option<(u32, vk::Result)>,
    buffer_contents: HashMap<u64, Vec<u8>>,
}

impl MockState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn object<T: Handle>(&mut self) -> T {
        let raw = self.handle();
        self.live_objects.insert(raw);
        T::from_raw(raw)
    }

    fn resource<T: Handle>(&mut self) -> T {
        let raw = self.handle();
        self.live_resources.insert(raw);
        T::from_raw(raw)
    }

    fn release_object(&mut self, raw: u64) {
        if !self.live_objects.remove(&raw) {
            self.double_destroys.push(raw);
        }
    }

    fn release_resource(&mut self, raw: u64) {
        if !self.live_resources.remove(&raw) {
            self.double_destroys.push(raw);
        }
    }
}

/// Recording device with scripted results
pub struct MockDevice {
    state: RefCell<MockState>,
    surface: vk::SurfaceKHR,
}

impl MockDevice {
    /// Three-image surface offering BGRA8 sRGB with FIFO and mailbox
    pub fn new() -> Self {
        let surface_support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };

        Self {
            state: RefCell::new(MockState {
                next_handle: 1000,
                image_count: 3,
                surface_support,
                ..MockState::default()
            }),
            surface: vk::SurfaceKHR::from_raw(1),
        }
    }

    /// Surface handle to pass to the swapchain
    pub const fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Raw handles destroyed when they were not live
    pub fn double_destroys(&self) -> Vec<u64> {
        self.state.borrow().double_destroys.clone()
    }

    /// Buffers, images, samplers, layouts, pools and pipelines still alive
    pub fn live_resource_count(&self) -> usize {
        self.state.borrow().live_resources.len()
    }

    /// Sync objects, command pools, swapchains and views still alive
    pub fn live_object_count(&self) -> usize {
        self.state.borrow().live_objects.len()
    }

    /// Images per swapchain created from now on
    pub fn set_image_count(&self, count: u32) {
        self.state.borrow_mut().image_count = count;
    }

    /// Replace what the surface reports
    pub fn set_surface_support(&self, support: SurfaceSupport) {
        self.state.borrow_mut().surface_support = support;
    }

    /// Queue the result of the next acquire
    pub fn push_acquire_result(&self, result: VkResult<(u32, bool)>) {
        self.state.borrow_mut().acquire_results.push_back(result);
    }

    /// Queue the result of the next present
    pub fn push_present_result(&self, result: VkResult<bool>) {
        self.state.borrow_mut().present_results.push_back(result);
    }

    /// Queue the result of the next submit
    pub fn push_submit_result(&self, result: VkResult<()>) {
        self.state.borrow_mut().submit_results.push_back(result);
    }

    /// Queue the result of the next fence wait
    pub fn push_wait_result(&self, result: VkResult<()>) {
        self.state.borrow_mut().wait_results.push_back(result);
    }

    /// Let `successes` fence creations through, then fail with `result`
    pub fn fail_fence_creation_after(&self, successes: u32, result: vk::Result) {
        self.state.borrow_mut().fence_failure = Some((successes, result));
    }

    /// Bytes last written to a buffer
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Vec<u8> {
        self.state
            .borrow()
            .buffer_contents
            .get(&buffer.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal pipeline description for tests
pub fn pipeline_desc() -> GraphicsPipelineDesc {
    GraphicsPipelineDesc {
        vertex_spirv: vec![0x0723_0203],
        fragment_spirv: vec![0x0723_0203],
        color_format: vk::Format::B8G8R8A8_SRGB,
        depth_format: None,
        set_layouts: Vec::new(),
        push_constant_ranges: Vec::new(),
        vertex_bindings: Vec::new(),
        vertex_attributes: Vec::new(),
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        cull_mode: vk::CullModeFlags::BACK,
    }
}

impl GpuDevice for MockDevice {
    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let semaphore = self.state.borrow_mut().object();
        self.record(Call::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.record(Call::DestroySemaphore(semaphore));
        self.state.borrow_mut().release_object(semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        self.record(Call::CreateFence { signaled });
        let mut state = self.state.borrow_mut();
        if let Some((remaining, result)) = state.fence_failure {
            if remaining == 0 {
                return Err(result);
            }
            state.fence_failure = Some((remaining - 1, result));
        }
        let fence: vk::Fence = state.object();
        state.signaled_fences.insert(fence.as_raw(), signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.record(Call::DestroyFence(fence));
        let mut state = self.state.borrow_mut();
        state.signaled_fences.remove(&fence.as_raw());
        state.release_object(fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        self.record(Call::WaitForFence(fence));
        let mut state = self.state.borrow_mut();
        if let Some(result) = state.wait_results.pop_front() {
            return result;
        }
        if state.signaled_fences.get(&fence.as_raw()).copied().unwrap_or(false) {
            Ok(())
        } else {
            Err(vk::Result::TIMEOUT)
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        self.record(Call::ResetFence(fence));
        self.state.borrow_mut().signaled_fences.insert(fence.as_raw(), false);
        Ok(())
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.record(Call::DeviceWaitIdle);
        Ok(())
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        self.record(Call::CreateCommandPool);
        Ok(self.state.borrow_mut().object())
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.record(Call::DestroyCommandPool(pool));
        self.state.borrow_mut().release_object(pool.as_raw());
    }

    fn allocate_command_buffers(
        &self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.record(Call::AllocateCommandBuffers(count));
        let mut state = self.state.borrow_mut();
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(state.handle()))
            .collect())
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(Call::ResetCommandBuffer(command_buffer));
        Ok(())
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(Call::BeginCommandBuffer(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.record(Call::EndCommandBuffer(command_buffer));
        Ok(())
    }

    fn cmd_image_barrier(&self, _command_buffer: vk::CommandBuffer, barrier: &ImageBarrier) {
        self.record(Call::ImageBarrier {
            image: barrier.image,
            new_layout: barrier.new_layout,
        });
    }

    fn cmd_begin_rendering(&self, _command_buffer: vk::CommandBuffer, target: &RenderTarget) {
        self.record(Call::BeginRendering {
            view: target.view,
            extent: target.extent,
        });
    }

    fn cmd_end_rendering(&self, _command_buffer: vk::CommandBuffer) {
        self.record(Call::EndRendering);
    }

    fn queue_submit(&self, submission: &FrameSubmission) -> VkResult<()> {
        self.record(Call::QueueSubmit {
            command_buffer: submission.command_buffer,
            wait_semaphore: submission.wait_semaphore,
            signal_semaphore: submission.signal_semaphore,
            fence: submission.fence,
        });
        let mut state = self.state.borrow_mut();
        if let Some(result) = state.submit_results.pop_front() {
            result?;
        }
        // Work completes instantly.
        state.signaled_fences.insert(submission.fence.as_raw(), true);
        Ok(())
    }

    fn queue_present(&self, presentation: &FramePresentation) -> VkResult<bool> {
        self.record(Call::QueuePresent {
            image_index: presentation.image_index,
            wait_semaphore: presentation.wait_semaphore,
        });
        self.state.borrow_mut().present_results.pop_front().unwrap_or(Ok(false))
    }

    fn surface_support(&self, _surface: vk::SurfaceKHR) -> VkResult<SurfaceSupport> {
        Ok(self.state.borrow().surface_support.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        self.record(Call::CreateSwapchain {
            extent: desc.extent,
            old_swapchain: desc.old_swapchain,
        });
        let mut state = self.state.borrow_mut();
        let swapchain: vk::SwapchainKHR = state.object();
        let images = (0..state.image_count)
            .map(|_| vk::Image::from_raw(state.handle()))
            .collect();
        state.swapchain_images.insert(swapchain.as_raw(), images);
        Ok(swapchain)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.state
            .borrow()
            .swapchain_images
            .get(&swapchain.as_raw())
            .cloned()
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.record(Call::DestroySwapchain(swapchain));
        let mut state = self.state.borrow_mut();
        state.swapchain_images.remove(&swapchain.as_raw());
        state.next_image.remove(&swapchain.as_raw());
        state.release_object(swapchain.as_raw());
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        Ok(self.state.borrow_mut().object())
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.record(Call::DestroyImageView(view));
        self.state.borrow_mut().release_object(view.as_raw());
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        self.record(Call::AcquireNextImage { swapchain, semaphore });
        let mut state = self.state.borrow_mut();
        if let Some(result) = state.acquire_results.pop_front() {
            return result;
        }
        let count = state
            .swapchain_images
            .get(&swapchain.as_raw())
            .map_or(0, |images| images.len() as u32);
        if count == 0 {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        let next = state.next_image.entry(swapchain.as_raw()).or_insert(0);
        let index = *next % count;
        *next += 1;
        Ok((index, false))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> RenderResult<Buffer> {
        let mut state = self.state.borrow_mut();
        let handle: vk::Buffer = state.resource();
        state.calls.push(Call::CreateBuffer(handle));
        Ok(Buffer {
            handle,
            memory: vk::DeviceMemory::from_raw(state.handle()),
            size: desc.size,
        })
    }

    fn destroy_buffer(&self, buffer: &Buffer) {
        self.record(Call::DestroyBuffer(buffer.handle));
        let mut state = self.state.borrow_mut();
        state.buffer_contents.remove(&buffer.handle.as_raw());
        state.release_resource(buffer.handle.as_raw());
    }

    fn write_buffer(&self, buffer: &Buffer, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()> {
        self.record(Call::WriteBuffer {
            buffer: buffer.handle,
            offset,
            len: data.len(),
        });
        if offset + data.len() as vk::DeviceSize > buffer.size {
            return Err(RenderError::creation("vkMapMemory", vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        let mut state = self.state.borrow_mut();
        let contents = state
            .buffer_contents
            .entry(buffer.handle.as_raw())
            .or_insert_with(|| vec![0; buffer.size as usize]);
        let start = offset as usize;
        contents[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> RenderResult<Image> {
        let mut state = self.state.borrow_mut();
        let image: vk::Image = state.resource();
        state.calls.push(Call::CreateImage(image));
        Ok(Image {
            image,
            memory: vk::DeviceMemory::from_raw(state.handle()),
            view: vk::ImageView::from_raw(state.handle()),
            format: desc.format,
            extent: desc.extent,
        })
    }

    fn destroy_image(&self, image: &Image) {
        self.record(Call::DestroyImage(image.image));
        self.state.borrow_mut().release_resource(image.image.as_raw());
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> RenderResult<Sampler> {
        Ok(Sampler {
            handle: self.state.borrow_mut().resource(),
        })
    }

    fn destroy_sampler(&self, sampler: &Sampler) {
        self.record(Call::DestroySampler(sampler.handle));
        self.state.borrow_mut().release_resource(sampler.handle.as_raw());
    }

    fn create_descriptor_set_layout(
        &self,
        _desc: &DescriptorSetLayoutDesc,
    ) -> RenderResult<DescriptorSetLayout> {
        Ok(DescriptorSetLayout {
            handle: self.state.borrow_mut().resource(),
        })
    }

    fn destroy_descriptor_set_layout(&self, layout: &DescriptorSetLayout) {
        self.record(Call::DestroyDescriptorSetLayout(layout.handle));
        self.state.borrow_mut().release_resource(layout.handle.as_raw());
    }

    fn create_descriptor_pool(&self, _desc: &DescriptorPoolDesc) -> RenderResult<DescriptorPool> {
        Ok(DescriptorPool {
            handle: self.state.borrow_mut().resource(),
        })
    }

    fn destroy_descriptor_pool(&self, pool: &DescriptorPool) {
        self.record(Call::DestroyDescriptorPool(pool.handle));
        self.state.borrow_mut().release_resource(pool.handle.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        self.record(Call::AllocateDescriptorSets {
            pool,
            count: layouts.len(),
        });
        let mut state = self.state.borrow_mut();
        Ok(layouts
            .iter()
            .map(|_| vk::DescriptorSet::from_raw(state.handle()))
            .collect())
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> RenderResult<Pipeline> {
        if desc.vertex_spirv.is_empty() || desc.fragment_spirv.is_empty() {
            return Err(RenderError::creation(
                "vkCreateShaderModule",
                vk::Result::ERROR_INITIALIZATION_FAILED,
            ));
        }
        let mut state = self.state.borrow_mut();
        Ok(Pipeline {
            pipeline: state.resource(),
            layout: vk::PipelineLayout::from_raw(state.handle()),
        })
    }

    fn destroy_pipeline(&self, pipeline: &Pipeline) {
        self.record(Call::DestroyPipeline(pipeline.pipeline));
        self.state.borrow_mut().release_resource(pipeline.pipeline.as_raw());
    }
}
