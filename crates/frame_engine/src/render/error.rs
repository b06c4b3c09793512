//! Renderer error types

use ash::vk;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the renderer core
///
/// Recoverable presentation results (out-of-date, suboptimal, resize) never
/// become a `RenderError`; they are handled by swapchain recreation. Every
/// variant here stops the frame loop.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Invalid configuration, detected before any device object exists
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No enumerated GPU passed the suitability predicate
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// The driver rejected logical device creation
    #[error("Device creation failed: {result:?}")]
    DeviceCreation {
        /// Driver result code
        result: vk::Result,
    },

    /// The surface cannot provide the requested format or present mode
    #[error("Unsupported surface configuration: {reason}")]
    UnsupportedSurfaceConfig {
        /// What was requested and not offered
        reason: String,
    },

    /// A create or allocate call was rejected
    #[error("{operation} failed: {result:?}")]
    ResourceCreation {
        /// Driver entry point that failed
        operation: &'static str,
        /// Driver result code
        result: vk::Result,
    },

    /// Unrecoverable device state during acquire, record, submit or present
    #[error("Graphics device lost during {operation}: {result:?}")]
    DeviceLost {
        /// Driver entry point that failed
        operation: &'static str,
        /// Driver result code
        result: vk::Result,
    },

    /// The per-frame fence did not signal within the configured timeout
    #[error("Fence for frame slot {slot} did not signal within {timeout_ns} ns")]
    FenceTimeout {
        /// Frame slot whose fence timed out
        slot: usize,
        /// Timeout that was exceeded
        timeout_ns: u64,
    },

    /// Loader, instance or surface setup failed
    #[error("Initialization failed: {0}")]
    Initialization(String),
}

impl RenderError {
    /// Wrap a failed create/allocate call
    pub const fn creation(operation: &'static str, result: vk::Result) -> Self {
        Self::ResourceCreation { operation, result }
    }

    /// Wrap a failed frame-protocol call
    pub const fn device_lost(operation: &'static str, result: vk::Result) -> Self {
        Self::DeviceLost { operation, result }
    }

    /// Whether the frame loop must stop
    ///
    /// Always true: recoverable presentation results are handled by
    /// swapchain recreation and never become a `RenderError`.
    #[allow(clippy::unused_self)]
    pub const fn is_fatal(&self) -> bool {
        true
    }

    /// Driver result code carried by this error, if any
    pub const fn result_code(&self) -> Option<vk::Result> {
        match self {
            Self::DeviceCreation { result }
            | Self::ResourceCreation { result, .. }
            | Self::DeviceLost { result, .. } => Some(*result),
            Self::FenceTimeout { .. } => Some(vk::Result::TIMEOUT),
            _ => None,
        }
    }
}

/// Result type for renderer operations
pub type RenderResult<T> = Result<T, RenderError>;
