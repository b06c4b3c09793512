//! Foundation utilities shared by the renderer core

pub mod collections;
pub mod logging;
pub mod version;
