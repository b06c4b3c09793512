//! # Unified Configuration
//!
//! Configuration for the renderer core and the application shell around it.
//! Everything here is plain data: it is validated once at setup, before any
//! device object exists, and is immutable once the frame executor is built.
//!
//! ## Configuration Categories
//!
//! - **Renderer**: frames in flight, present mode, extensions, fence timeout
//! - **Validation**: debug-only layers and debug-messenger filters
//! - **Application**: log filter plus the renderer section

use ash::vk;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::version::ApiVersion;

/// Upper bound on frame slots; more only adds latency
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Presentation mode requested for the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Vertical sync; always supported by conforming drivers
    Fifo,
    /// Vertical sync that tears when a frame is late
    FifoRelaxed,
    /// Triple-buffered low latency without tearing
    Mailbox,
    /// No vertical sync
    Immediate,
}

impl PresentModePreference {
    /// Driver enum for this preference
    pub const fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

impl Default for PresentModePreference {
    fn default() -> Self {
        Self::Fifo
    }
}

bitflags! {
    /// Debug-messenger severity filter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DebugSeverity: u32 {
        /// Diagnostic chatter
        const VERBOSE = 1 << 0;
        /// Informational messages
        const INFO = 1 << 1;
        /// Likely bugs
        const WARNING = 1 << 2;
        /// Invalid API usage
        const ERROR = 1 << 3;
    }
}

impl DebugSeverity {
    /// Matching driver flags
    pub fn to_vk(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        let mut flags = vk::DebugUtilsMessageSeverityFlagsEXT::empty();
        if self.contains(Self::VERBOSE) {
            flags |= vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
        }
        if self.contains(Self::INFO) {
            flags |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
        }
        if self.contains(Self::WARNING) {
            flags |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
        }
        if self.contains(Self::ERROR) {
            flags |= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
        }
        flags
    }
}

bitflags! {
    /// Debug-messenger message type filter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DebugMessageTypes: u32 {
        /// Events unrelated to API usage
        const GENERAL = 1 << 0;
        /// Rule violations caught by the layers
        const VALIDATION = 1 << 1;
        /// Non-optimal API usage
        const PERFORMANCE = 1 << 2;
    }
}

impl DebugMessageTypes {
    /// Matching driver flags
    pub fn to_vk(self) -> vk::DebugUtilsMessageTypeFlagsEXT {
        let mut flags = vk::DebugUtilsMessageTypeFlagsEXT::empty();
        if self.contains(Self::GENERAL) {
            flags |= vk::DebugUtilsMessageTypeFlagsEXT::GENERAL;
        }
        if self.contains(Self::VALIDATION) {
            flags |= vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION;
        }
        if self.contains(Self::PERFORMANCE) {
            flags |= vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
        }
        flags
    }
}

/// # Validation Configuration
///
/// Validation layers are a development aid. They are never enabled in
/// release builds, whatever the file says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// `None` means "on whenever debug assertions are on"
    pub enabled: Option<bool>,
    /// Instance layers to enable
    pub layers: Vec<String>,
    /// Severities forwarded to the log
    pub severity: DebugSeverity,
    /// Message types forwarded to the log
    pub message_types: DebugMessageTypes,
}

impl ValidationConfig {
    /// Whether validation should actually be turned on for this build
    pub fn is_active(&self) -> bool {
        cfg!(debug_assertions) && self.enabled.unwrap_or(true)
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            severity: DebugSeverity::WARNING | DebugSeverity::ERROR,
            message_types: DebugMessageTypes::all(),
        }
    }
}

/// # Renderer Configuration
///
/// Configuration specific to the Vulkan frame core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Number of frame slots; fixed once the executor exists
    pub max_frames_in_flight: usize,
    /// Requested swapchain present mode
    pub present_mode: PresentModePreference,
    /// Fall back to FIFO instead of failing when `present_mode` is unsupported
    pub allow_present_mode_fallback: bool,
    /// Instance extensions beyond what the surface needs
    pub required_instance_extensions: Vec<String>,
    /// Device extensions beyond the swapchain extension
    pub required_device_extensions: Vec<String>,
    /// Upper bound on the per-frame fence wait
    pub fence_timeout_ms: u64,
    /// Color the render target is cleared to each frame
    pub clear_color: [f32; 4],
    // Table-valued fields stay last so TOML output keeps scalars ahead of tables.
    /// Application version reported to the driver
    pub application_version: ApiVersion,
    /// Validation layer settings
    pub validation: ValidationConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: ApiVersion::default(),
            max_frames_in_flight: 2,
            present_mode: PresentModePreference::Fifo,
            allow_present_mode_fallback: false,
            required_instance_extensions: Vec::new(),
            required_device_extensions: Vec::new(),
            validation: ValidationConfig::default(),
            fence_timeout_ms: 1000,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Set application version
    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.application_version = version;
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set the requested present mode
    pub fn with_present_mode(mut self, mode: PresentModePreference) -> Self {
        self.present_mode = mode;
        self
    }

    /// Accept FIFO when the requested present mode is unavailable
    pub fn with_present_mode_fallback(mut self, allow: bool) -> Self {
        self.allow_present_mode_fallback = allow;
        self
    }

    /// Require an additional device extension
    pub fn with_device_extension(mut self, name: impl Into<String>) -> Self {
        self.required_device_extensions.push(name.into());
        self
    }

    /// Require an additional instance extension
    pub fn with_instance_extension(mut self, name: impl Into<String>) -> Self {
        self.required_instance_extensions.push(name.into());
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation.enabled = Some(enabled);
        self
    }

    /// Set the fence wait timeout
    pub fn with_fence_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.fence_timeout_ms = timeout_ms;
        self
    }

    /// Fence timeout in the nanoseconds the driver expects
    pub const fn fence_timeout_ns(&self) -> u64 {
        self.fence_timeout_ms.saturating_mul(1_000_000)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }

        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::ZeroFramesInFlight);
        }

        if self.max_frames_in_flight > MAX_FRAMES_IN_FLIGHT_LIMIT {
            return Err(ConfigError::TooManyFramesInFlight {
                requested: self.max_frames_in_flight,
                max: MAX_FRAMES_IN_FLIGHT_LIMIT,
            });
        }

        if self.fence_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fence timeout must be non-zero".to_string()));
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("clear color must be finite".to_string()));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Frame Engine Application")
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration applications load from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// `env_logger` filter string
    pub log_level: String,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            log_level: "info".to_string(),
            renderer: RendererConfig::new(app_name),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate()
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::new("Frame Engine Application")
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let config = RendererConfig::default().with_max_frames_in_flight(0);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFramesInFlight)));
    }

    #[test]
    fn test_too_many_frames_in_flight_rejected() {
        let config = RendererConfig::default().with_max_frames_in_flight(9);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyFramesInFlight { requested: 9, max: 8 })
        ));
    }

    #[test]
    fn test_fence_timeout_conversion() {
        let config = RendererConfig::default().with_fence_timeout_ms(250);
        assert_eq!(config.fence_timeout_ns(), 250_000_000);
        assert!(RendererConfig::default().with_fence_timeout_ms(0).validate().is_err());
    }

    #[test]
    fn test_debug_filters_map_to_vk() {
        let severity = DebugSeverity::WARNING | DebugSeverity::ERROR;
        assert_eq!(
            severity.to_vk(),
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        );
        assert_eq!(
            DebugMessageTypes::VALIDATION.to_vk(),
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        );
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let mut config = ApplicationConfig::new("Round Trip");
        config.renderer = config
            .renderer
            .with_max_frames_in_flight(3)
            .with_present_mode(PresentModePreference::Mailbox)
            .with_device_extension("VK_KHR_maintenance1");
        config.save_to_file(&path).unwrap();

        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.ron");

        let config = ApplicationConfig::new("Ron");
        config.save_to_file(&path).unwrap();
        assert_eq!(ApplicationConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[renderer]\nmax_frames_in_flight = 3\n").unwrap();

        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.renderer.max_frames_in_flight, 3);
        assert_eq!(loaded.renderer.fence_timeout_ms, 1000);
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_present_mode_fallback_is_opt_in() {
        assert!(!RendererConfig::default().allow_present_mode_fallback);
        assert!(!ApplicationConfig::default().renderer.allow_present_mode_fallback);
        assert!(RendererConfig::default()
            .with_present_mode_fallback(true)
            .allow_present_mode_fallback);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = ApplicationConfig::load_from_file("engine.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_)) | Err(ConfigError::UnsupportedFormat(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "log_level: info").unwrap();
        assert!(matches!(
            ApplicationConfig::load_from_file(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
