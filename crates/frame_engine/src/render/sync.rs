//! Image layout transitions for the frame protocol
//!
//! The frame renders straight into the acquired swapchain image with dynamic
//! rendering, so the two layout changes a render pass would normally do are
//! recorded explicitly: undefined → color attachment before drawing, color
//! attachment → present afterwards.

use ash::vk;

/// Image memory barrier with the stages and access masks it synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    /// Image being transitioned
    pub image: vk::Image,
    /// Layout the image is in before the barrier
    pub old_layout: vk::ImageLayout,
    /// Layout the image is in after the barrier
    pub new_layout: vk::ImageLayout,
    /// Stages that must finish before the transition
    pub src_stage: vk::PipelineStageFlags,
    /// Stages that wait for the transition
    pub dst_stage: vk::PipelineStageFlags,
    /// Writes made available by the barrier
    pub src_access: vk::AccessFlags,
    /// Accesses the barrier makes visible
    pub dst_access: vk::AccessFlags,
    /// Aspect of the image affected
    pub aspect: vk::ImageAspectFlags,
}

impl ImageBarrier {
    /// Acquired image → color attachment
    ///
    /// The source stage matches the acquire semaphore's wait stage, so the
    /// transition cannot start before the presentation engine releases the
    /// image. Previous contents are discarded.
    pub const fn acquired_to_color_attachment(image: vk::Image) -> Self {
        Self {
            image,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// Color attachment → presentable
    pub const fn color_attachment_to_present(image: vk::Image) -> Self {
        Self {
            image,
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            src_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            src_access: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dst_access: vk::AccessFlags::empty(),
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// Driver barrier struct covering the first mip level and array layer
    pub fn to_vk(&self) -> vk::ImageMemoryBarrier {
        vk::ImageMemoryBarrier::builder()
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build()
    }
}
