//! Vulkan backend built on `ash`

mod context;
pub mod instance;

pub use context::VulkanContext;
pub use instance::VulkanInstance;

use crate::core::config::RendererConfig;
use crate::render::error::RenderResult;
use crate::render::executor::FrameExecutor;
use crate::render::window::SurfaceProvider;

/// Frame executor driving a real device
pub type Renderer = FrameExecutor<VulkanContext>;

/// Create the device context for `window` and a frame executor on top of it
pub fn create_renderer<W: SurfaceProvider + ?Sized>(
    config: &RendererConfig,
    window: &W,
) -> RenderResult<Renderer> {
    let context = VulkanContext::new(config, window)?;
    let surface = context.surface();
    FrameExecutor::new(context, surface, config, window.framebuffer_extent())
}
