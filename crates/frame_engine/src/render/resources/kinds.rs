//! Resource kinds and their creation descriptors
//!
//! Each kind is a plain bundle of driver handles. Ownership is expressed by
//! registration in exactly one [`super::ResourceManager`]; the structs
//! themselves never free anything on drop.

use ash::vk;

use super::GpuResource;
use crate::render::backend::GpuDevice;

/// Buffer creation parameters
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: vk::DeviceSize,
    /// Buffer usage flags
    pub usage: vk::BufferUsageFlags,
    /// Required memory properties
    pub memory: vk::MemoryPropertyFlags,
}

impl BufferDesc {
    /// Host-visible, coherent uniform buffer
    pub fn uniform(size: vk::DeviceSize) -> Self {
        Self {
            size,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            memory: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        }
    }

    /// Device-local vertex buffer filled by transfer
    pub fn vertex(size: vk::DeviceSize) -> Self {
        Self {
            size,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            memory: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }

    /// Host-visible staging buffer
    pub fn staging(size: vk::DeviceSize) -> Self {
        Self {
            size,
            usage: vk::BufferUsageFlags::TRANSFER_SRC,
            memory: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        }
    }
}

/// GPU buffer and its memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Buffer {
    /// Buffer handle
    pub handle: vk::Buffer,
    /// Bound memory
    pub memory: vk::DeviceMemory,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

impl GpuResource for Buffer {
    const KIND: &'static str = "buffer";

    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D) {
        device.destroy_buffer(self);
    }
}

/// Image creation parameters
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Width and height
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Image usage flags
    pub usage: vk::ImageUsageFlags,
    /// Aspect covered by the default view
    pub aspect: vk::ImageAspectFlags,
    /// Number of mip levels
    pub mip_levels: u32,
}

impl ImageDesc {
    /// Sampled color texture
    pub fn texture(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
        }
    }

    /// Depth attachment
    pub fn depth(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            format: vk::Format::D32_SFLOAT,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            mip_levels: 1,
        }
    }
}

/// Device-local image with memory and a default view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image {
    /// Image handle
    pub image: vk::Image,
    /// Bound memory
    pub memory: vk::DeviceMemory,
    /// Default view over all mips
    pub view: vk::ImageView,
    /// Texel format
    pub format: vk::Format,
    /// Width and height
    pub extent: vk::Extent2D,
}

impl GpuResource for Image {
    const KIND: &'static str = "image";

    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D) {
        device.destroy_image(self);
    }
}

/// Sampler creation parameters
#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    /// Magnification filter
    pub mag_filter: vk::Filter,
    /// Minification filter
    pub min_filter: vk::Filter,
    /// Addressing mode on all axes
    pub address_mode: vk::SamplerAddressMode,
    /// Anisotropy level, `None` to disable
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: None,
        }
    }
}

/// Texture sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampler {
    /// Sampler handle
    pub handle: vk::Sampler,
}

impl GpuResource for Sampler {
    const KIND: &'static str = "sampler";

    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D) {
        device.destroy_sampler(self);
    }
}

/// One binding in a descriptor set layout
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBinding {
    /// Binding number
    pub binding: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
    /// Array length
    pub count: u32,
    /// Shader stages that read it
    pub stages: vk::ShaderStageFlags,
}

/// Descriptor set layout creation parameters
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutDesc {
    /// Bindings in the set
    pub bindings: Vec<DescriptorBinding>,
}

/// Descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetLayout {
    /// Layout handle
    pub handle: vk::DescriptorSetLayout,
}

impl GpuResource for DescriptorSetLayout {
    const KIND: &'static str = "descriptor set layout";

    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D) {
        device.destroy_descriptor_set_layout(self);
    }
}

/// Descriptor pool creation parameters
#[derive(Debug, Clone, Default)]
pub struct DescriptorPoolDesc {
    /// Maximum number of sets
    pub max_sets: u32,
    /// Descriptor counts by type
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
}

/// Descriptor pool; its sets are freed with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPool {
    /// Pool handle
    pub handle: vk::DescriptorPool,
}

impl GpuResource for DescriptorPool {
    const KIND: &'static str = "descriptor pool";

    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D) {
        device.destroy_descriptor_pool(self);
    }
}

/// Graphics pipeline creation parameters for dynamic rendering
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    /// Vertex shader SPIR-V words
    pub vertex_spirv: Vec<u32>,
    /// Fragment shader SPIR-V words
    pub fragment_spirv: Vec<u32>,
    /// Color attachment format
    pub color_format: vk::Format,
    /// Depth attachment format, if any
    pub depth_format: Option<vk::Format>,
    /// Descriptor set layouts, in set order
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Push constant ranges
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    /// Vertex buffer bindings
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex attributes
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
}

/// Graphics pipeline and its layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    /// Pipeline handle
    pub pipeline: vk::Pipeline,
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
}

impl GpuResource for Pipeline {
    const KIND: &'static str = "pipeline";

    fn destroy<D: GpuDevice + ?Sized>(&self, device: &D) {
        device.destroy_pipeline(self);
    }
}
