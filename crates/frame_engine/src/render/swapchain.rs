//! Swapchain ownership and recreation
//!
//! ```text
//! Uninitialized --create--> Ready --out-of-date/suboptimal/resize--> Invalid
//!                             ^                                        |
//!                             +------------- recreate -----------------+
//! any state --destroy--> Destroyed
//! ```
//!
//! Images belong to the presentation engine; only the views are created and
//! destroyed here. The image list and view list always have the same length.
//! Each successful create or recreate bumps the generation counter so
//! dependents (per-image semaphores, framebuffers) can tell when to rebuild.

use ash::vk;

use crate::render::backend::{GpuDevice, SurfaceSupport, SwapchainDesc};
use crate::render::error::{RenderError, RenderResult};

/// Lifecycle state of the managed swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// Nothing created yet
    Uninitialized,
    /// Images can be acquired and presented
    Ready,
    /// Out of date; must be recreated before the next acquire
    Invalid,
    /// Torn down; terminal
    Destroyed,
}

/// Result of a recreation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// A new chain is ready
    Recreated,
    /// The framebuffer has zero area (minimized); nothing was touched
    Deferred,
}

/// Present mode request: the preferred mode and whether FIFO may stand in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentModeRequest {
    /// Mode the application asked for
    pub preferred: vk::PresentModeKHR,
    /// Use FIFO when `preferred` is not offered instead of failing
    pub allow_fifo_fallback: bool,
}

impl PresentModeRequest {
    /// Request an exact mode
    pub const fn exact(preferred: vk::PresentModeKHR) -> Self {
        Self {
            preferred,
            allow_fifo_fallback: false,
        }
    }
}

/// Owns the swapchain handle, its image list and the image views
#[derive(Debug)]
pub struct SwapchainManager {
    state: SwapchainState,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    request: PresentModeRequest,
    generation: u64,
}

impl SwapchainManager {
    /// Manager in the `Uninitialized` state
    pub fn new() -> Self {
        Self {
            state: SwapchainState::Uninitialized,
            surface: vk::SurfaceKHR::null(),
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            request: PresentModeRequest::exact(vk::PresentModeKHR::FIFO),
            generation: 0,
        }
    }

    /// Create the first chain: `Uninitialized → Ready`
    ///
    /// Fails with `UnsupportedSurfaceConfig` when the surface offers no
    /// usable format or the present mode is not available.
    pub fn create<D: GpuDevice + ?Sized>(
        &mut self,
        device: &D,
        surface: vk::SurfaceKHR,
        extent: vk::Extent2D,
        request: PresentModeRequest,
    ) -> RenderResult<()> {
        if self.state != SwapchainState::Uninitialized {
            return Err(RenderError::Initialization(format!(
                "swapchain create called in state {:?}",
                self.state
            )));
        }

        self.surface = surface;
        self.request = request;

        let support = device
            .surface_support(surface)
            .map_err(|result| RenderError::device_lost("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", result))?;
        let extent = choose_extent(&support.capabilities, extent);
        if is_zero_area(extent) {
            return Err(RenderError::UnsupportedSurfaceConfig {
                reason: "surface has zero area".to_string(),
            });
        }

        self.build(device, &support, extent, vk::SwapchainKHR::null())?;
        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            self.extent.width,
            self.extent.height,
            self.images.len(),
            self.format.format,
            self.present_mode
        );
        Ok(())
    }

    /// Mark the chain out of date: `Ready → Invalid`
    pub fn invalidate(&mut self) {
        if self.state == SwapchainState::Ready {
            log::debug!("Swapchain generation {} invalidated", self.generation);
            self.state = SwapchainState::Invalid;
        }
    }

    /// Rebuild the chain: `Invalid → Ready`
    ///
    /// A zero-area `extent` (minimized window) returns `Deferred` without
    /// touching the device, since creating a zero-sized chain is undefined.
    /// Otherwise waits for idle, destroys the old views, builds a new chain
    /// with the old one as a hint, and bumps the generation.
    pub fn recreate<D: GpuDevice + ?Sized>(
        &mut self,
        device: &D,
        extent: vk::Extent2D,
    ) -> RenderResult<RecreateOutcome> {
        match self.state {
            SwapchainState::Ready | SwapchainState::Invalid => {}
            state => {
                return Err(RenderError::Initialization(format!(
                    "swapchain recreate called in state {state:?}"
                )))
            }
        }

        if is_zero_area(extent) {
            log::debug!("Framebuffer has zero area; deferring swapchain recreation");
            return Ok(RecreateOutcome::Deferred);
        }

        let support = device
            .surface_support(self.surface)
            .map_err(|result| RenderError::device_lost("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", result))?;
        let extent = choose_extent(&support.capabilities, extent);
        if is_zero_area(extent) {
            log::debug!("Surface reports zero area; deferring swapchain recreation");
            return Ok(RecreateOutcome::Deferred);
        }

        device
            .device_wait_idle()
            .map_err(|result| RenderError::device_lost("vkDeviceWaitIdle", result))?;

        self.destroy_views(device);
        let old_swapchain = self.swapchain;
        let result = self.build(device, &support, extent, old_swapchain);
        // The old chain is retired whether or not the rebuild got as far as a new handle.
        if old_swapchain != vk::SwapchainKHR::null() {
            if self.swapchain == old_swapchain {
                self.swapchain = vk::SwapchainKHR::null();
            }
            device.destroy_swapchain(old_swapchain);
        }
        result?;

        log::info!(
            "Swapchain recreated: {}x{}, {} images, generation {}",
            self.extent.width,
            self.extent.height,
            self.images.len(),
            self.generation
        );
        Ok(RecreateOutcome::Recreated)
    }

    /// Tear down views and chain: any state → `Destroyed`
    ///
    /// The caller must have waited for the device to go idle.
    pub fn destroy<D: GpuDevice + ?Sized>(&mut self, device: &D) {
        self.destroy_views(device);
        if self.swapchain != vk::SwapchainKHR::null() {
            device.destroy_swapchain(self.swapchain);
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.state = SwapchainState::Destroyed;
    }

    fn destroy_views<D: GpuDevice + ?Sized>(&mut self, device: &D) {
        for view in self.image_views.drain(..) {
            device.destroy_image_view(view);
        }
        // Images are owned by the presentation engine; forget them with the views.
        self.images.clear();
    }

    fn build<D: GpuDevice + ?Sized>(
        &mut self,
        device: &D,
        support: &SurfaceSupport,
        extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> RenderResult<()> {
        let format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, self.request)?;
        let min_image_count = choose_image_count(&support.capabilities);

        let desc = SwapchainDesc {
            surface: self.surface,
            min_image_count,
            format,
            extent,
            present_mode,
            pre_transform: support.capabilities.current_transform,
            old_swapchain,
        };

        let swapchain = device
            .create_swapchain(&desc)
            .map_err(|result| RenderError::creation("vkCreateSwapchainKHR", result))?;
        self.swapchain = swapchain;

        let images = device
            .swapchain_images(swapchain)
            .map_err(|result| RenderError::creation("vkGetSwapchainImagesKHR", result))?;

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match device.create_image_view(image, format.format) {
                Ok(view) => image_views.push(view),
                Err(result) => {
                    for view in image_views {
                        device.destroy_image_view(view);
                    }
                    return Err(RenderError::creation("vkCreateImageView", result));
                }
            }
        }

        self.images = images;
        self.image_views = image_views;
        self.format = format;
        self.extent = extent;
        self.present_mode = present_mode;
        self.generation += 1;
        self.state = SwapchainState::Ready;
        Ok(())
    }

    /// Current lifecycle state
    pub const fn state(&self) -> SwapchainState {
        self.state
    }

    /// Incremented on every successful create or recreate
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Swapchain handle
    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Presentable images
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images in the chain
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Image format and color space
    pub const fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Present mode in use
    pub const fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }
}

impl Default for SwapchainManager {
    fn default() -> Self {
        Self::new()
    }
}

const fn is_zero_area(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Prefer BGRA8 sRGB with a non-linear sRGB color space, else the first offered
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RenderResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| {
            sf.format == vk::Format::B8G8R8A8_SRGB
                && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| RenderError::UnsupportedSurfaceConfig {
            reason: "surface reports no formats".to_string(),
        })
}

/// Validate the requested present mode against what the surface offers
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    request: PresentModeRequest,
) -> RenderResult<vk::PresentModeKHR> {
    if modes.contains(&request.preferred) {
        return Ok(request.preferred);
    }
    if request.allow_fifo_fallback && modes.contains(&vk::PresentModeKHR::FIFO) {
        log::debug!("Present mode {:?} unsupported; using FIFO", request.preferred);
        return Ok(vk::PresentModeKHR::FIFO);
    }
    Err(RenderError::UnsupportedSurfaceConfig {
        reason: format!("present mode {:?} not supported", request.preferred),
    })
}

/// Use the surface's fixed extent when it has one, otherwise clamp the
/// framebuffer size into the surface limits
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum (0 means unbounded)
pub const fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && desired > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        desired
    }
}
