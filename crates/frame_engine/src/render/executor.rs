//! Per-frame acquire → record → submit → present protocol
//!
//! [`FrameExecutor`] owns the device, the swapchain, the frame ring, the
//! per-image render-finished semaphores, the GPU timeline and every
//! registered resource. One call to [`FrameExecutor::render`] runs one
//! iteration of the protocol:
//!
//! 1. wait on the current slot's fence (bounded by the configured timeout)
//! 2. acquire an image with the slot's acquire semaphore
//! 3. reset the fence, only after the acquire succeeded
//! 4. reset and re-record the slot's command buffer around the caller's callback
//! 5. submit: wait on the acquire semaphore, signal the image's render-finished
//!    semaphore and the slot fence
//! 6. present, waiting on the render-finished semaphore
//! 7. advance the slot index
//!
//! Out-of-date, suboptimal and resize results invalidate the swapchain; the
//! next `render()` recreates it. Every other failure is fatal.

use ash::vk;
use bytemuck::Pod;

use crate::core::config::RendererConfig;
use crate::foundation::collections::Handle;
use crate::render::backend::{FramePresentation, FrameSubmission, GpuDevice, RenderTarget};
use crate::render::error::{RenderError, RenderResult};
use crate::render::frame_ring::{FrameRingBuffer, FrameSlot, PerFrame};
use crate::render::resources::{
    Buffer, BufferDesc, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, GpuResources, GraphicsPipelineDesc, Image, ImageDesc,
    ManagedResource, Pipeline, Sampler, SamplerDesc,
};
use crate::render::swapchain::{PresentModeRequest, RecreateOutcome, SwapchainManager, SwapchainState};
use crate::render::sync::ImageBarrier;
use crate::render::timeline::GpuTimeline;
use crate::render::window::{EventQueue, WindowEvent};

/// What one `render()` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented
    Presented {
        /// Slot used for the frame
        frame_index: usize,
        /// Swapchain image rendered to
        image_index: u32,
    },
    /// Acquire reported out-of-date; nothing was submitted or presented
    SwapchainInvalidated,
    /// The framebuffer has zero area; nothing was done
    Skipped,
}

/// Counters over the executor's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Slot fence waits
    pub fence_waits: u64,
    /// Queue submissions
    pub submissions: u64,
    /// Successful presents
    pub presents: u64,
    /// Swapchain recreations
    pub recreations: u64,
    /// Frames aborted or flagged because the swapchain went out of date
    pub invalidations: u64,
    /// Frames skipped while the framebuffer had zero area
    pub skipped_frames: u64,
    /// Resources freed by deferred cleanup
    pub resources_freed: u64,
}

/// Everything the draw callback may touch while a frame is being recorded
pub struct FrameContext<'a, D: GpuDevice> {
    device: &'a D,
    resources: &'a mut GpuResources,
    command_buffer: vk::CommandBuffer,
    frame_index: usize,
    image_index: u32,
    extent: vk::Extent2D,
    delta_time: f32,
    generation: u64,
}

impl<D: GpuDevice> FrameContext<'_, D> {
    /// Command buffer in the recording state, inside the rendering pass
    pub const fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Slot index; use it to pick per-frame data
    pub const fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Swapchain image being rendered to
    pub const fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Render area
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Seconds since the previous frame, as passed to `render()`
    pub const fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Submission generation this frame will carry
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// This slot's row of `data`
    ///
    /// `None` when `data` has fewer rows than there are slots.
    pub fn frame_data<'p, T>(&self, data: &'p mut PerFrame<T>) -> Option<&'p mut T> {
        data.get_mut(self.frame_index)
    }

    /// Device, for recording commands
    pub const fn device(&self) -> &D {
        self.device
    }

    /// Look up a registered resource
    pub fn get<T: ManagedResource>(&self, handle: Handle<T>) -> Option<&T> {
        self.resources.get(handle)
    }

    /// Release a resource once this frame has retired
    pub fn enqueue_destroy<T: ManagedResource>(&mut self, handle: Handle<T>) {
        self.resources.enqueue_destroy(handle, self.generation);
    }

    /// Copy plain data into a host-visible buffer
    ///
    /// Only write rows owned by [`Self::frame_index`]; the other slots'
    /// storage may still be read by the GPU.
    pub fn write_buffer<T: Pod>(
        &self,
        handle: Handle<Buffer>,
        offset: vk::DeviceSize,
        data: &[T],
    ) -> RenderResult<()> {
        write_pod(self.device, &*self.resources, handle, offset, data)
    }
}

fn write_pod<D: GpuDevice + ?Sized, T: Pod>(
    device: &D,
    resources: &GpuResources,
    handle: Handle<Buffer>,
    offset: vk::DeviceSize,
    data: &[T],
) -> RenderResult<()> {
    // A stale handle has already been reported by the lookup.
    match resources.get(handle) {
        Some(buffer) => device.write_buffer(buffer, offset, bytemuck::cast_slice(data)),
        None => Ok(()),
    }
}

/// Drives the frame protocol and owns every GPU object it needs
pub struct FrameExecutor<D: GpuDevice> {
    device: D,
    swapchain: SwapchainManager,
    ring: FrameRingBuffer,
    render_finished: Vec<vk::Semaphore>,
    render_finished_generation: u64,
    timeline: GpuTimeline,
    resources: GpuResources,
    events: EventQueue,
    framebuffer_extent: vk::Extent2D,
    resize_pending: bool,
    close_requested: bool,
    fence_timeout_ns: u64,
    clear_color: [f32; 4],
    stats: FrameStats,
    shut_down: bool,
}

impl<D: GpuDevice> FrameExecutor<D> {
    /// Validate the configuration, create the swapchain, the frame ring and
    /// one render-finished semaphore per swapchain image
    ///
    /// Configuration errors are reported before any device object is
    /// created. The frame count is fixed from here on.
    pub fn new(
        device: D,
        surface: vk::SurfaceKHR,
        config: &RendererConfig,
        framebuffer_extent: vk::Extent2D,
    ) -> RenderResult<Self> {
        config.validate()?;

        let request = PresentModeRequest {
            preferred: config.present_mode.to_vk(),
            allow_fifo_fallback: config.allow_present_mode_fallback,
        };

        let mut swapchain = SwapchainManager::new();
        swapchain.create(&device, surface, framebuffer_extent, request)?;

        let ring = match FrameRingBuffer::new(&device, config.max_frames_in_flight) {
            Ok(ring) => ring,
            Err(error) => {
                swapchain.destroy(&device);
                return Err(error);
            }
        };

        let mut executor = Self {
            device,
            swapchain,
            ring,
            render_finished: Vec::new(),
            render_finished_generation: 0,
            timeline: GpuTimeline::new(),
            resources: GpuResources::new(),
            events: EventQueue::new(),
            framebuffer_extent,
            resize_pending: false,
            close_requested: false,
            fence_timeout_ns: config.fence_timeout_ns(),
            clear_color: config.clear_color,
            stats: FrameStats::default(),
            shut_down: false,
        };
        // Drop tears down whatever was built if this fails.
        executor.rebuild_render_finished()?;

        log::info!(
            "Frame executor ready: {} frames in flight, {} swapchain images",
            executor.ring.len(),
            executor.swapchain.image_count()
        );
        Ok(executor)
    }

    /// Run one iteration of the frame protocol
    ///
    /// `record` is invoked exactly once per presented frame, between the
    /// begin and end of the rendering pass. It is not invoked when the frame
    /// is skipped or the swapchain turns out to be out of date.
    pub fn render<F>(&mut self, delta_time: f32, record: F) -> RenderResult<FrameOutcome>
    where
        F: FnOnce(&mut FrameContext<'_, D>),
    {
        if self.shut_down {
            return Err(RenderError::Initialization(
                "render called after shutdown".to_string(),
            ));
        }

        self.process_events();

        if self.swapchain.state() == SwapchainState::Invalid {
            match self.recreate_swapchain()? {
                RecreateOutcome::Recreated => {}
                RecreateOutcome::Deferred => {
                    self.stats.skipped_frames += 1;
                    return Ok(FrameOutcome::Skipped);
                }
            }
        }

        let frame_index = self.ring.current_index();
        let slot = *self.ring.current();

        // 1. The slot's previous submission must be complete before its
        //    command buffer and semaphore are reused.
        self.wait_for_slot(frame_index, &slot)?;

        // 2. Acquire.
        let (image_index, acquire_suboptimal) = match self.device.acquire_next_image(
            self.swapchain.handle(),
            u64::MAX,
            slot.image_available,
        ) {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date during acquire; frame {} aborted", frame_index);
                self.swapchain.invalidate();
                self.stats.invalidations += 1;
                return Ok(FrameOutcome::SwapchainInvalidated);
            }
            Err(result) => {
                return Err(Self::fatal(RenderError::device_lost("vkAcquireNextImageKHR", result)))
            }
        };

        let image_slot = image_index as usize;
        let (Some(&image), Some(&view), Some(&render_finished)) = (
            self.swapchain.images().get(image_slot),
            self.swapchain.image_views().get(image_slot),
            self.render_finished.get(image_slot),
        ) else {
            return Err(Self::fatal(RenderError::device_lost(
                "vkAcquireNextImageKHR",
                vk::Result::ERROR_UNKNOWN,
            )));
        };

        // 3. Only now is a submission guaranteed to follow, so the fence
        //    may be unsignaled.
        self.device
            .reset_fence(slot.in_flight)
            .map_err(|result| Self::fatal(RenderError::device_lost("vkResetFences", result)))?;

        // 4. Record.
        let generation = self.timeline.release_generation();
        self.record_frame(&slot, frame_index, image_index, image, view, delta_time, generation, record)?;

        // 5. Submit.
        let submitted = self.timeline.next_submission();
        debug_assert_eq!(submitted, generation);
        self.device
            .queue_submit(&FrameSubmission {
                command_buffer: slot.command_buffer,
                wait_semaphore: slot.image_available,
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal_semaphore: render_finished,
                fence: slot.in_flight,
            })
            .map_err(|result| Self::fatal(RenderError::device_lost("vkQueueSubmit", result)))?;
        self.ring.current_mut().last_submission = Some(submitted);
        self.stats.submissions += 1;

        // 6. Present.
        let present = self.device.queue_present(&FramePresentation {
            swapchain: self.swapchain.handle(),
            image_index,
            wait_semaphore: render_finished,
        });
        let needs_recreate = match present {
            Ok(present_suboptimal) => {
                self.stats.presents += 1;
                present_suboptimal || acquire_suboptimal
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(result) => {
                return Err(Self::fatal(RenderError::device_lost("vkQueuePresentKHR", result)))
            }
        };
        if needs_recreate || self.resize_pending {
            log::debug!(
                "Swapchain invalidated after present (suboptimal or out of date: {}, resize: {})",
                needs_recreate,
                self.resize_pending
            );
            self.swapchain.invalidate();
            self.stats.invalidations += 1;
        }

        // 7. Advance.
        self.ring.advance();

        Ok(FrameOutcome::Presented {
            frame_index,
            image_index,
        })
    }

    fn wait_for_slot(&mut self, frame_index: usize, slot: &FrameSlot) -> RenderResult<()> {
        match self.device.wait_for_fence(slot.in_flight, self.fence_timeout_ns) {
            Ok(()) => {}
            Err(vk::Result::TIMEOUT) => {
                return Err(Self::fatal(RenderError::FenceTimeout {
                    slot: frame_index,
                    timeout_ns: self.fence_timeout_ns,
                }))
            }
            Err(result) => {
                return Err(Self::fatal(RenderError::device_lost("vkWaitForFences", result)))
            }
        }
        self.stats.fence_waits += 1;

        if let Some(generation) = slot.last_submission {
            self.timeline.retire(generation);
        }
        let freed = self.resources.try_cleanup(&self.device, self.timeline.retired());
        self.stats.resources_freed += freed as u64;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn record_frame<F>(
        &mut self,
        slot: &FrameSlot,
        frame_index: usize,
        image_index: u32,
        image: vk::Image,
        view: vk::ImageView,
        delta_time: f32,
        generation: u64,
        record: F,
    ) -> RenderResult<()>
    where
        F: FnOnce(&mut FrameContext<'_, D>),
    {
        let command_buffer = slot.command_buffer;
        let extent = self.swapchain.extent();

        self.device
            .reset_command_buffer(command_buffer)
            .map_err(|result| Self::fatal(RenderError::device_lost("vkResetCommandBuffer", result)))?;
        self.device
            .begin_command_buffer(command_buffer)
            .map_err(|result| Self::fatal(RenderError::device_lost("vkBeginCommandBuffer", result)))?;

        self.device
            .cmd_image_barrier(command_buffer, &ImageBarrier::acquired_to_color_attachment(image));
        self.device.cmd_begin_rendering(
            command_buffer,
            &RenderTarget {
                view,
                extent,
                clear_color: self.clear_color,
            },
        );

        let mut context = FrameContext {
            device: &self.device,
            resources: &mut self.resources,
            command_buffer,
            frame_index,
            image_index,
            extent,
            delta_time,
            generation,
        };
        record(&mut context);

        self.device.cmd_end_rendering(command_buffer);
        self.device
            .cmd_image_barrier(command_buffer, &ImageBarrier::color_attachment_to_present(image));

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|result| Self::fatal(RenderError::device_lost("vkEndCommandBuffer", result)))
    }

    fn process_events(&mut self) {
        let events: Vec<WindowEvent> = self.events.drain().collect();
        for event in events {
            match event {
                WindowEvent::FramebufferResized { width, height } => {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    self.framebuffer_extent = vk::Extent2D { width, height };
                    self.resize_pending = true;
                    // Nothing can be presented at zero area; skip straight to deferral.
                    if width == 0 || height == 0 {
                        self.swapchain.invalidate();
                    }
                }
                WindowEvent::CloseRequested => self.close_requested = true,
            }
        }
    }

    fn recreate_swapchain(&mut self) -> RenderResult<RecreateOutcome> {
        let outcome = self
            .swapchain
            .recreate(&self.device, self.framebuffer_extent)
            .map_err(Self::fatal)?;

        if outcome == RecreateOutcome::Recreated {
            // The recreate waited for idle: every submission has retired.
            self.timeline.retire_all();
            let freed = self.resources.try_cleanup(&self.device, self.timeline.retired());
            self.stats.resources_freed += freed as u64;
            self.rebuild_render_finished().map_err(Self::fatal)?;
            self.resize_pending = false;
            self.stats.recreations += 1;
        }
        Ok(outcome)
    }

    /// Match the render-finished semaphores to the current swapchain images
    ///
    /// Only called while the device is idle.
    fn rebuild_render_finished(&mut self) -> RenderResult<()> {
        if self.render_finished_generation == self.swapchain.generation()
            && self.render_finished.len() == self.swapchain.image_count()
        {
            return Ok(());
        }

        for semaphore in self.render_finished.drain(..) {
            self.device.destroy_semaphore(semaphore);
        }
        for _ in 0..self.swapchain.image_count() {
            let semaphore = self
                .device
                .create_semaphore()
                .map_err(|result| RenderError::creation("vkCreateSemaphore", result))?;
            self.render_finished.push(semaphore);
        }
        self.render_finished_generation = self.swapchain.generation();
        Ok(())
    }

    fn fatal(error: RenderError) -> RenderError {
        log::error!("Fatal render error: {}", error);
        error
    }

    /// Register a new buffer
    pub fn create_buffer(&mut self, desc: &BufferDesc, name: impl Into<String>) -> RenderResult<Handle<Buffer>> {
        let buffer = self.device.create_buffer(desc)?;
        Ok(self.resources.add(buffer, name))
    }

    /// Register a new image with its default view
    pub fn create_image(&mut self, desc: &ImageDesc, name: impl Into<String>) -> RenderResult<Handle<Image>> {
        let image = self.device.create_image(desc)?;
        Ok(self.resources.add(image, name))
    }

    /// Register a new sampler
    pub fn create_sampler(&mut self, desc: &SamplerDesc, name: impl Into<String>) -> RenderResult<Handle<Sampler>> {
        let sampler = self.device.create_sampler(desc)?;
        Ok(self.resources.add(sampler, name))
    }

    /// Register a new descriptor set layout
    pub fn create_descriptor_set_layout(
        &mut self,
        desc: &DescriptorSetLayoutDesc,
        name: impl Into<String>,
    ) -> RenderResult<Handle<DescriptorSetLayout>> {
        let layout = self.device.create_descriptor_set_layout(desc)?;
        Ok(self.resources.add(layout, name))
    }

    /// Register a new descriptor pool
    pub fn create_descriptor_pool(
        &mut self,
        desc: &DescriptorPoolDesc,
        name: impl Into<String>,
    ) -> RenderResult<Handle<DescriptorPool>> {
        let pool = self.device.create_descriptor_pool(desc)?;
        Ok(self.resources.add(pool, name))
    }

    /// Register a new graphics pipeline
    pub fn create_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        name: impl Into<String>,
    ) -> RenderResult<Handle<Pipeline>> {
        let pipeline = self.device.create_graphics_pipeline(desc)?;
        Ok(self.resources.add(pipeline, name))
    }

    /// Allocate one set per layout from a registered pool
    ///
    /// The sets are freed with the pool.
    pub fn allocate_descriptor_sets(
        &self,
        pool: Handle<DescriptorPool>,
        layouts: &[Handle<DescriptorSetLayout>],
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        let stale = || RenderError::creation("vkAllocateDescriptorSets", vk::Result::ERROR_UNKNOWN);
        let pool = self.resources.get(pool).ok_or_else(stale)?.handle;
        let layouts = layouts
            .iter()
            .map(|&layout| self.resources.get(layout).map(|layout| layout.handle).ok_or_else(stale))
            .collect::<RenderResult<Vec<_>>>()?;
        self.device.allocate_descriptor_sets(pool, &layouts)
    }

    /// Copy plain data into a host-visible buffer outside a frame
    pub fn write_buffer<T: Pod>(
        &self,
        handle: Handle<Buffer>,
        offset: vk::DeviceSize,
        data: &[T],
    ) -> RenderResult<()> {
        write_pod(&self.device, &self.resources, handle, offset, data)
    }

    /// Look up a registered resource
    pub fn get<T: ManagedResource>(&self, handle: Handle<T>) -> Option<&T> {
        self.resources.get(handle)
    }

    /// Release a resource once every frame that may reference it has retired
    ///
    /// The resource stays valid until then; repeated calls only warn.
    pub fn enqueue_destroy<T: ManagedResource>(&mut self, handle: Handle<T>) {
        let generation = self.timeline.release_generation();
        self.resources.enqueue_destroy(handle, generation);
    }

    /// Wait for idle and free every pending resource now
    pub fn cleanup_after_idle(&mut self) -> RenderResult<usize> {
        self.wait_idle()?;
        // Nothing is recording or executing, so every stamp counts as retired.
        let freed = self.resources.try_cleanup(&self.device, u64::MAX);
        self.stats.resources_freed += freed as u64;
        Ok(freed)
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&mut self) -> RenderResult<()> {
        self.device
            .device_wait_idle()
            .map_err(|result| RenderError::device_lost("vkDeviceWaitIdle", result))?;
        self.timeline.retire_all();
        Ok(())
    }

    /// Queue for window events; drained at the start of every `render()`
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Queue a framebuffer resize
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        self.events.push(WindowEvent::FramebufferResized { width, height });
    }

    /// True once a close request has been drained
    pub const fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Counters so far
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Device the executor drives
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Swapchain state, extent and generation
    pub const fn swapchain(&self) -> &SwapchainManager {
        &self.swapchain
    }

    /// Submission generations
    pub const fn timeline(&self) -> &GpuTimeline {
        &self.timeline
    }

    /// Registered resources
    pub const fn resources(&self) -> &GpuResources {
        &self.resources
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.ring.len()
    }

    /// Per-frame storage with one row per slot of this executor
    pub fn per_frame<T>(&self, init: impl FnMut(usize) -> T) -> PerFrame<T> {
        PerFrame::new(self.ring.len(), init)
    }

    /// Slot the next frame uses
    pub const fn current_frame(&self) -> usize {
        self.ring.current_index()
    }

    /// Render-finished semaphores, one per swapchain image
    pub fn render_finished_semaphores(&self) -> &[vk::Semaphore] {
        &self.render_finished
    }

    /// Wait for idle once, then free resources, semaphores, frame slots and
    /// the swapchain
    ///
    /// Idempotent. Objects are destroyed even if the wait reports device loss,
    /// since nothing can still be executing on a lost device; the wait error
    /// is returned afterwards.
    pub fn shutdown(&mut self) -> RenderResult<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let waited = self
            .device
            .device_wait_idle()
            .map_err(|result| RenderError::device_lost("vkDeviceWaitIdle", result));
        self.timeline.retire_all();

        let freed = self.resources.destroy_all(&self.device);
        for semaphore in self.render_finished.drain(..) {
            self.device.destroy_semaphore(semaphore);
        }
        self.ring.destroy(&self.device);
        self.swapchain.destroy(&self.device);

        log::info!(
            "Frame executor shut down after {} frames; {} resources freed at teardown",
            self.stats.presents,
            freed
        );
        waited
    }
}

impl<D: GpuDevice> Drop for FrameExecutor<D> {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            log::error!("Error during renderer teardown: {}", error);
        }
    }
}
