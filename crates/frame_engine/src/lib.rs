//! # Frame Engine
//!
//! Vulkan frame synchronization and GPU resource lifecycle core.
//!
//! ## Features
//!
//! - **Frames in flight**: per-slot fences and command buffers, per-image
//!   render-finished semaphores
//! - **Swapchain recreation**: out-of-date, suboptimal and resize handling,
//!   deferred while the window is minimized
//! - **Deferred destruction**: resources are freed only once the GPU has
//!   retired every frame that may reference them
//! - **Configuration**: TOML or RON files via serde
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_engine::prelude::*;
//!
//! fn run(window: &impl SurfaceProvider) -> Result<(), RenderError> {
//!     frame_engine::foundation::logging::init();
//!     let config = RendererConfig::new("demo").with_max_frames_in_flight(2);
//!     let mut renderer = create_renderer(&config, window)?;
//!
//!     while !renderer.close_requested() {
//!         renderer.render(0.016, |frame| {
//!             let _ = frame.command_buffer();
//!         })?;
//!     }
//!     renderer.shutdown()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{ApplicationConfig, PresentModePreference, RendererConfig},
        foundation::{collections::Handle, version::ApiVersion},
        render::{
            create_renderer,
            resources::{BufferDesc, ImageDesc, SamplerDesc},
            FrameContext, FrameExecutor, FrameOutcome, FrameStats, GpuDevice, RenderError,
            RenderResult, Renderer, SurfaceProvider, WindowEvent,
        },
    };
}
