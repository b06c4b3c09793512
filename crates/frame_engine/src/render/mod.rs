//! Frame synchronization and GPU resource lifecycle
//!
//! The core (swapchain, frame ring, resources, executor) is written against
//! the [`backend::GpuDevice`] trait. [`vulkan`] provides the real device.

pub mod backend;
pub mod device;
pub mod error;
pub mod executor;
pub mod frame_ring;
pub mod resources;
pub mod swapchain;
pub mod sync;
pub mod timeline;
pub mod vulkan;
pub mod window;

#[cfg(test)]
mod tests;

pub use backend::GpuDevice;
pub use error::{RenderError, RenderResult};
pub use executor::{FrameContext, FrameExecutor, FrameOutcome, FrameStats};
pub use frame_ring::{FrameRingBuffer, FrameSlot, PerFrame};
pub use resources::{GpuResource, GpuResources, ManagedResource, ResourceManager};
pub use swapchain::{SwapchainManager, SwapchainState};
pub use timeline::GpuTimeline;
pub use vulkan::{create_renderer, Renderer, VulkanContext};
pub use window::{EventQueue, SurfaceProvider, WindowEvent};
