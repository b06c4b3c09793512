//! Window-side inputs to the renderer
//!
//! The windowing layer never mutates renderer state from its callbacks.
//! It pushes [`WindowEvent`]s onto an [`EventQueue`], and the frame executor
//! drains the queue once at the start of every `render()` call.

use std::collections::VecDeque;

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

/// Something the window reported since the last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Framebuffer size changed; zero means minimized
    FramebufferResized {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
    /// The user asked to close the window
    CloseRequested,
}

/// FIFO of window events, drained once per frame
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<WindowEvent>,
}

impl EventQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&mut self, event: WindowEvent) {
        self.events.push_back(event);
    }

    /// Remove and return every queued event in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = WindowEvent> + '_ {
        self.events.drain(..)
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// A window the renderer can present to
///
/// Surface creation goes through the raw handles; the framebuffer size is
/// queried once at startup, and later changes arrive as events.
pub trait SurfaceProvider: HasRawWindowHandle + HasRawDisplayHandle {
    /// Current framebuffer size in pixels
    fn framebuffer_extent(&self) -> vk::Extent2D;
}
