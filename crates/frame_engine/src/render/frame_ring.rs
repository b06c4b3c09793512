//! Frame slots for frames in flight
//!
//! The ring holds exactly N slots, N fixed at construction. Each slot owns a
//! command buffer that is reset and re-recorded every time the slot comes
//! around, an image-acquired semaphore and an in-flight fence. Fences start
//! signaled so the first wait on every slot returns immediately.
//!
//! Render-finished semaphores are deliberately not part of a slot: they are
//! indexed by swapchain image (see the frame executor), because a present may
//! still be waiting on one when the slot that signaled it comes around again.

use ash::vk;

use crate::config::ConfigError;
use crate::render::backend::GpuDevice;
use crate::render::error::{RenderError, RenderResult};

/// Per-slot command buffer and synchronization objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlot {
    /// Reset and re-recorded every frame; never reallocated
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by acquire, waited on by the submission
    pub image_available: vk::Semaphore,
    /// Signaled when the slot's last submission completes
    pub in_flight: vk::Fence,
    /// Generation of the slot's last submission, if any
    pub last_submission: Option<u64>,
}

/// Fixed ring of frame slots
#[derive(Debug)]
pub struct FrameRingBuffer {
    command_pool: vk::CommandPool,
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameRingBuffer {
    /// Allocate `frames_in_flight` slots up front
    pub fn new<D: GpuDevice + ?Sized>(device: &D, frames_in_flight: usize) -> RenderResult<Self> {
        if frames_in_flight == 0 {
            return Err(ConfigError::ZeroFramesInFlight.into());
        }
        let count = u32::try_from(frames_in_flight)
            .map_err(|_| ConfigError::Invalid(format!("{frames_in_flight} frame slots")))?;

        log::debug!("Creating frame ring with {} slots", frames_in_flight);

        let command_pool = device
            .create_command_pool()
            .map_err(|result| RenderError::creation("vkCreateCommandPool", result))?;

        let mut ring = Self {
            command_pool,
            slots: Vec::with_capacity(frames_in_flight),
            current: 0,
        };

        // On failure, release what was created so far before bailing out.
        if let Err(error) = ring.allocate_slots(device, count) {
            ring.destroy(device);
            return Err(error);
        }

        Ok(ring)
    }

    fn allocate_slots<D: GpuDevice + ?Sized>(&mut self, device: &D, count: u32) -> RenderResult<()> {
        let command_buffers = device
            .allocate_command_buffers(self.command_pool, count)
            .map_err(|result| RenderError::creation("vkAllocateCommandBuffers", result))?;

        for command_buffer in command_buffers {
            let image_available = device
                .create_semaphore()
                .map_err(|result| RenderError::creation("vkCreateSemaphore", result))?;
            let in_flight = match device.create_fence(true) {
                Ok(fence) => fence,
                Err(result) => {
                    device.destroy_semaphore(image_available);
                    return Err(RenderError::creation("vkCreateFence", result));
                }
            };
            self.slots.push(FrameSlot {
                command_buffer,
                image_available,
                in_flight,
                last_submission: None,
            });
        }
        Ok(())
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false once constructed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the slot the next frame uses
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Slot the next frame uses
    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    /// Slot the next frame uses, mutably
    pub fn current_mut(&mut self) -> &mut FrameSlot {
        &mut self.slots[self.current]
    }

    /// Slot by index
    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    /// Move to the next slot, wrapping at N
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Destroy every slot object and the command pool
    ///
    /// The caller must have waited for the device to go idle.
    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &D) {
        for slot in self.slots.drain(..) {
            device.destroy_semaphore(slot.image_available);
            device.destroy_fence(slot.in_flight);
        }
        if self.command_pool != vk::CommandPool::null() {
            // Frees the command buffers with it.
            device.destroy_command_pool(self.command_pool);
            self.command_pool = vk::CommandPool::null();
        }
        self.current = 0;
    }
}

/// Per-frame CPU data replicated once per slot
///
/// Uniform contents, descriptor bookkeeping and similar data that the CPU
/// rewrites every frame live here, one row per slot. A row is only handed out
/// for the slot whose fence the executor has just waited on, so the CPU never
/// rewrites storage the GPU may still be reading.
#[derive(Debug, Clone)]
pub struct PerFrame<T> {
    rows: Vec<T>,
}

impl<T> PerFrame<T> {
    /// Build one row per slot
    pub fn new(frames_in_flight: usize, mut init: impl FnMut(usize) -> T) -> Self {
        Self {
            rows: (0..frames_in_flight).map(&mut init).collect(),
        }
    }

    /// Row for a slot
    pub fn get(&self, frame_index: usize) -> &T {
        &self.rows[frame_index]
    }

    /// Row for a slot, mutably
    ///
    /// Crate-private: callers reach a writable row through
    /// `FrameContext::frame_data`, which only names the slot being recorded.
    pub(crate) fn get_mut(&mut self, frame_index: usize) -> Option<&mut T> {
        self.rows.get_mut(frame_index)
    }

    /// All rows, in slot order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::mock::{Call, MockDevice};

    #[test]
    fn test_allocates_n_slots_with_signaled_fences() {
        let device = MockDevice::new();
        let ring = FrameRingBuffer::new(&device, 3).unwrap();

        assert_eq!(ring.len(), 3);
        assert_eq!(device.count(|call| matches!(call, Call::CreateFence { signaled: true })), 3);
        assert_eq!(device.count(|call| matches!(call, Call::AllocateCommandBuffers(3))), 1);
    }

    #[test]
    fn test_zero_slots_is_a_config_error() {
        let device = MockDevice::new();
        let result = FrameRingBuffer::new(&device, 0);
        assert!(matches!(result, Err(RenderError::Config(ConfigError::ZeroFramesInFlight))));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_advance_wraps() {
        let device = MockDevice::new();
        let mut ring = FrameRingBuffer::new(&device, 2).unwrap();
        let sequence: Vec<usize> = (0..5)
            .map(|_| {
                let index = ring.current_index();
                ring.advance();
                index
            })
            .collect();
        assert_eq!(sequence, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let device = MockDevice::new();
        let mut ring = FrameRingBuffer::new(&device, 2).unwrap();
        ring.destroy(&device);

        assert!(ring.is_empty());
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_failed_fence_creation_cleans_up() {
        let device = MockDevice::new();
        device.fail_fence_creation_after(1, vk::Result::ERROR_OUT_OF_HOST_MEMORY);

        let result = FrameRingBuffer::new(&device, 3);
        assert!(matches!(
            result,
            Err(RenderError::ResourceCreation { operation: "vkCreateFence", .. })
        ));
        assert_eq!(device.live_object_count(), 0);
    }

    #[test]
    fn test_per_frame_rows_are_independent() {
        let mut rows = PerFrame::new(2, |index| vec![index]);
        rows.get_mut(1).unwrap().push(7);
        assert!(rows.get_mut(2).is_none());
        assert_eq!(rows.get(0), &vec![0]);
        assert_eq!(rows.get(1), &vec![1, 7]);
        assert_eq!(rows.len(), 2);
    }
}
