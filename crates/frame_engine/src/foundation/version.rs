//! Packed API version numbers
//!
//! Vulkan encodes versions as a single `u32` with four bit fields:
//!
//! ```text
//!  31..29   28..22   21..12   11..0
//! release   major    minor    hotfix
//! ```
//!
//! [`ApiVersion`] keeps the fields separate for configuration files and logs
//! and converts to the packed form at the driver boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

const RELEASE_BITS: u32 = 3;
const MAJOR_BITS: u32 = 7;
const MINOR_BITS: u32 = 10;
const HOTFIX_BITS: u32 = 12;

const HOTFIX_SHIFT: u32 = 0;
const MINOR_SHIFT: u32 = HOTFIX_SHIFT + HOTFIX_BITS;
const MAJOR_SHIFT: u32 = MINOR_SHIFT + MINOR_BITS;
const RELEASE_SHIFT: u32 = MAJOR_SHIFT + MAJOR_BITS;

const fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

/// Version number split into its release/major/minor/hotfix fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion {
    /// Release (variant) field, 3 bits
    pub release: u32,
    /// Major version, 7 bits
    pub major: u32,
    /// Minor version, 10 bits
    pub minor: u32,
    /// Hotfix (patch) number, 12 bits
    pub hotfix: u32,
}

impl ApiVersion {
    /// Largest value of the release field
    pub const MAX_RELEASE: u32 = mask(RELEASE_BITS);
    /// Largest value of the major field
    pub const MAX_MAJOR: u32 = mask(MAJOR_BITS);
    /// Largest value of the minor field
    pub const MAX_MINOR: u32 = mask(MINOR_BITS);
    /// Largest value of the hotfix field
    pub const MAX_HOTFIX: u32 = mask(HOTFIX_BITS);

    /// Vulkan 1.0
    pub const VULKAN_1_0: Self = Self { release: 0, major: 1, minor: 0, hotfix: 0 };
    /// Vulkan 1.3, the minimum for dynamic rendering in core
    pub const VULKAN_1_3: Self = Self { release: 0, major: 1, minor: 3, hotfix: 0 };

    /// Create a version, returning `None` if any field overflows its bit width
    pub const fn new(release: u32, major: u32, minor: u32, hotfix: u32) -> Option<Self> {
        if release > Self::MAX_RELEASE
            || major > Self::MAX_MAJOR
            || minor > Self::MAX_MINOR
            || hotfix > Self::MAX_HOTFIX
        {
            return None;
        }
        Some(Self { release, major, minor, hotfix })
    }

    /// Pack into the single-integer driver representation
    ///
    /// Fields wider than their slot are masked, so an out-of-range value
    /// built by hand cannot bleed into its neighbour.
    pub const fn pack(self) -> u32 {
        ((self.release & Self::MAX_RELEASE) << RELEASE_SHIFT)
            | ((self.major & Self::MAX_MAJOR) << MAJOR_SHIFT)
            | ((self.minor & Self::MAX_MINOR) << MINOR_SHIFT)
            | ((self.hotfix & Self::MAX_HOTFIX) << HOTFIX_SHIFT)
    }

    /// Split a packed driver version into its fields
    pub const fn unpack(packed: u32) -> Self {
        Self {
            release: (packed >> RELEASE_SHIFT) & Self::MAX_RELEASE,
            major: (packed >> MAJOR_SHIFT) & Self::MAX_MAJOR,
            minor: (packed >> MINOR_SHIFT) & Self::MAX_MINOR,
            hotfix: (packed >> HOTFIX_SHIFT) & Self::MAX_HOTFIX,
        }
    }

    /// True when `self` is at least `required`, ignoring the hotfix number
    pub const fn supports(self, required: Self) -> bool {
        if self.release != required.release {
            return false;
        }
        self.major > required.major
            || (self.major == required.major && self.minor >= required.minor)
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self { release: 0, major: 1, minor: 0, hotfix: 0 }
    }
}

impl From<ApiVersion> for u32 {
    fn from(version: ApiVersion) -> Self {
        version.pack()
    }
}

impl From<u32> for ApiVersion {
    fn from(packed: u32) -> Self {
        Self::unpack(packed)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.hotfix)?;
        if self.release != 0 {
            write!(f, " (release {})", self.release)?;
        }
        Ok(())
    }
}
