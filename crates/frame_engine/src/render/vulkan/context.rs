//! Device context: the ash implementation of [`GpuDevice`]

use std::ffi::CStr;

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use super::instance::VulkanInstance;
use crate::core::config::RendererConfig;
use crate::foundation::version::ApiVersion;
use crate::render::backend::{
    FramePresentation, FrameSubmission, GpuDevice, RenderTarget, SurfaceSupport, SwapchainDesc,
};
use crate::render::device::logical::name_from_raw;
use crate::render::device::{
    default_score, device_extension_names, pick_best_gpu, DeviceRequirements, LogicalDevice,
    PhysicalDeviceInfo, QueueRoles,
};
use crate::render::error::{RenderError, RenderResult};
use crate::render::resources::{
    Buffer, BufferDesc, DescriptorPool, DescriptorPoolDesc, DescriptorSetLayout,
    DescriptorSetLayoutDesc, GraphicsPipelineDesc, Image, ImageDesc, Pipeline, Sampler,
    SamplerDesc,
};
use crate::render::sync::ImageBarrier;
use crate::render::window::SurfaceProvider;

// SAFETY: literal is NUL-terminated with no interior NUL.
const SHADER_ENTRY: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Instance, surface, selected GPU and logical device
pub struct VulkanContext {
    /// Logical device and queues; dropped before the instance
    device: LogicalDevice,
    physical: PhysicalDeviceInfo,
    surface: vk::SurfaceKHR,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create everything up to and including the logical device for `window`
    pub fn new<W: SurfaceProvider + ?Sized>(config: &RendererConfig, window: &W) -> RenderResult<Self> {
        config.validate()?;

        let instance = VulkanInstance::new(config, window.raw_display_handle())?;

        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .map_err(|result| RenderError::Initialization(format!("Surface creation failed: {result:?}")))?;

        let extensions = device_extension_names(&config.required_device_extensions);
        let selected = Self::select_physical_device(&instance, surface, &extensions);
        let physical = match selected {
            Ok(physical) => physical,
            Err(error) => {
                unsafe { instance.surface_loader.destroy_surface(surface, None) };
                return Err(error);
            }
        };

        let device = match LogicalDevice::new(&instance.instance, &physical, &extensions) {
            Ok(device) => device,
            Err(error) => {
                unsafe { instance.surface_loader.destroy_surface(surface, None) };
                return Err(error);
            }
        };

        Ok(Self {
            device,
            physical,
            surface,
            instance,
        })
    }

    fn select_physical_device(
        instance: &VulkanInstance,
        surface: vk::SurfaceKHR,
        extensions: &[String],
    ) -> RenderResult<PhysicalDeviceInfo> {
        let handles = unsafe { instance.instance.enumerate_physical_devices() }
            .map_err(|result| RenderError::Initialization(format!("GPU enumeration failed: {result:?}")))?;

        let candidates = handles
            .into_iter()
            .map(|handle| describe_physical_device(instance, surface, handle))
            .collect::<RenderResult<Vec<_>>>()?;

        let requirements = DeviceRequirements::new(extensions.to_vec());
        let best = pick_best_gpu(&candidates, |info| requirements.is_suitable(info), default_score)?;
        log::info!(
            "Selected GPU: {} ({:?}, API {})",
            best.name,
            best.device_type,
            best.api_version
        );
        Ok(best.clone())
    }

    /// Presentation surface
    pub const fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Selected GPU
    pub const fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Logical device and queues
    pub const fn logical_device(&self) -> &LogicalDevice {
        &self.device
    }

    fn raw(&self) -> &ash::Device {
        &self.device.device
    }

    fn allocate_memory(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<vk::DeviceMemory> {
        let memory_type = self
            .physical
            .find_memory_type(requirements.memory_type_bits, properties)
            .ok_or_else(|| RenderError::creation("vkAllocateMemory", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))?;
        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        unsafe { self.raw().allocate_memory(&info, None) }
            .map_err(|result| RenderError::creation("vkAllocateMemory", result))
    }

    fn create_shader_module(&self, words: &[u32]) -> RenderResult<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::builder().code(words);
        unsafe { self.raw().create_shader_module(&info, None) }
            .map_err(|result| RenderError::creation("vkCreateShaderModule", result))
    }

    fn build_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        vertex: vk::ShaderModule,
        fragment: vk::ShaderModule,
        layout: vk::PipelineLayout,
    ) -> RenderResult<vk::Pipeline> {
        let entry = SHADER_ENTRY;
        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex)
                .name(entry)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment)
                .name(entry)
                .build(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&desc.vertex_bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder().topology(desc.topology);
        let viewport = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(desc.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .build()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder().attachments(&blend_attachments);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_format.is_some())
            .depth_write_enable(desc.depth_format.is_some())
            .depth_compare_op(vk::CompareOp::LESS);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let color_formats = [desc.color_format];
        let mut rendering = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(desc.depth_format.unwrap_or(vk::Format::UNDEFINED));

        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .depth_stencil_state(&depth_stencil)
            .dynamic_state(&dynamic)
            .layout(layout)
            .push_next(&mut rendering)
            .build();

        let pipelines = unsafe {
            self.raw()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
        }
        .map_err(|(_, result)| RenderError::creation("vkCreateGraphicsPipelines", result))?;
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::creation("vkCreateGraphicsPipelines", vk::Result::ERROR_UNKNOWN))
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.instance.surface_loader.destroy_surface(self.surface, None);
        }
        // Fields drop in declaration order: device, then instance.
    }
}

fn describe_physical_device(
    instance: &VulkanInstance,
    surface: vk::SurfaceKHR,
    handle: vk::PhysicalDevice,
) -> RenderResult<PhysicalDeviceInfo> {
    let raw = &instance.instance;
    let properties = unsafe { raw.get_physical_device_properties(handle) };
    let api_version = ApiVersion::from(properties.api_version);

    let (sampler_anisotropy, dynamic_rendering) = if api_version.supports(ApiVersion::VULKAN_1_3) {
        let mut vulkan13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut vulkan13).build();
        unsafe { raw.get_physical_device_features2(handle, &mut features2) };
        let anisotropy = features2.features.sampler_anisotropy == vk::TRUE;
        (anisotropy, vulkan13.dynamic_rendering == vk::TRUE)
    } else {
        let features = unsafe { raw.get_physical_device_features(handle) };
        (features.sampler_anisotropy == vk::TRUE, false)
    };

    let families = unsafe { raw.get_physical_device_queue_family_properties(handle) };
    let present_support: Vec<bool> = (0_u32..)
        .zip(families.iter())
        .map(|(index, _)| {
            unsafe {
                instance
                    .surface_loader
                    .get_physical_device_surface_support(handle, index, surface)
            }
            .unwrap_or(false)
        })
        .collect();
    let queue_roles = QueueRoles::find(&families, |index| {
        present_support.get(index as usize).copied().unwrap_or(false)
    });

    let extensions = unsafe { raw.enumerate_device_extension_properties(handle) }
        .map_err(|result| RenderError::Initialization(format!("Device extension query failed: {result:?}")))?
        .iter()
        .map(|properties| name_from_raw(&properties.extension_name))
        .collect();

    let memory = unsafe { raw.get_physical_device_memory_properties(handle) };
    let memory_types = memory.memory_types[..memory.memory_type_count as usize].to_vec();

    let info = PhysicalDeviceInfo {
        handle,
        name: name_from_raw(&properties.device_name),
        device_type: properties.device_type,
        api_version,
        max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        queue_roles,
        extensions,
        dynamic_rendering,
        sampler_anisotropy,
        memory_types,
    };
    log::debug!(
        "Found GPU: {} ({:?}, API {}, score {})",
        info.name,
        info.device_type,
        info.api_version,
        default_score(&info)
    );
    Ok(info)
}

impl GpuDevice for VulkanContext {
    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        unsafe { self.raw().create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.raw().destroy_semaphore(semaphore, None) };
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.raw().create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.raw().destroy_fence(fence, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> VkResult<()> {
        unsafe { self.raw().wait_for_fences(&[fence], true, timeout_ns) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.raw().reset_fences(&[fence]) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.raw().device_wait_idle() }
    }

    fn create_command_pool(&self) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.device.roles.graphics);
        unsafe { self.raw().create_command_pool(&info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.raw().destroy_command_pool(pool, None) };
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.raw().allocate_command_buffers(&info) }
    }

    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.raw()
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.raw().begin_command_buffer(command_buffer, &info) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.raw().end_command_buffer(command_buffer) }
    }

    fn cmd_image_barrier(&self, command_buffer: vk::CommandBuffer, barrier: &ImageBarrier) {
        unsafe {
            self.raw().cmd_pipeline_barrier(
                command_buffer,
                barrier.src_stage,
                barrier.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.to_vk()],
            );
        }
    }

    fn cmd_begin_rendering(&self, command_buffer: vk::CommandBuffer, target: &RenderTarget) {
        let color_attachments = [vk::RenderingAttachmentInfo::builder()
            .image_view(target.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: target.clear_color,
                },
            })
            .build()];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        };
        let info = vk::RenderingInfo::builder()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);

        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: target.extent.width as f32,
            height: target.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.raw().cmd_begin_rendering(command_buffer, &info);
            self.raw().cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.raw().cmd_set_scissor(command_buffer, 0, &[render_area]);
        }
    }

    fn cmd_end_rendering(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.raw().cmd_end_rendering(command_buffer) };
    }

    fn queue_submit(&self, submission: &FrameSubmission) -> VkResult<()> {
        let wait_semaphores = [submission.wait_semaphore];
        let wait_stages = [submission.wait_stage];
        let command_buffers = [submission.command_buffer];
        let signal_semaphores = [submission.signal_semaphore];
        let info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();
        unsafe {
            self.raw()
                .queue_submit(self.device.graphics_queue, &[info], submission.fence)
        }
    }

    fn queue_present(&self, presentation: &FramePresentation) -> VkResult<bool> {
        let wait_semaphores = [presentation.wait_semaphore];
        let swapchains = [presentation.swapchain];
        let image_indices = [presentation.image_index];
        let info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.present_queue, &info)
        }
    }

    fn surface_support(&self, surface: vk::SurfaceKHR) -> VkResult<SurfaceSupport> {
        let loader = &self.instance.surface_loader;
        let handle = self.physical.handle;
        unsafe {
            Ok(SurfaceSupport {
                capabilities: loader.get_physical_device_surface_capabilities(handle, surface)?,
                formats: loader.get_physical_device_surface_formats(handle, surface)?,
                present_modes: loader.get_physical_device_surface_present_modes(handle, surface)?,
            })
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let roles = self.device.roles;
        let shared_families = [roles.graphics, roles.present];
        let mut info = vk::SwapchainCreateInfoKHR::builder()
            .surface(desc.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.format.format)
            .image_color_space(desc.format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(desc.old_swapchain);
        info = if roles.graphics == roles.present {
            info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            info.image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&shared_families)
        };
        unsafe { self.device.swapchain_loader.create_swapchain(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.device.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.device.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(color_range(1));
        unsafe { self.raw().create_image_view(&info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.raw().destroy_image_view(view, None) };
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.device
                .swapchain_loader
                .acquire_next_image(swapchain, timeout_ns, semaphore, vk::Fence::null())
        }
    }

    fn create_buffer(&self, desc: &BufferDesc) -> RenderResult<Buffer> {
        let info = vk::BufferCreateInfo::builder()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = unsafe { self.raw().create_buffer(&info, None) }
            .map_err(|result| RenderError::creation("vkCreateBuffer", result))?;

        let requirements = unsafe { self.raw().get_buffer_memory_requirements(handle) };
        let memory = match self.allocate_memory(requirements, desc.memory) {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { self.raw().destroy_buffer(handle, None) };
                return Err(error);
            }
        };
        if let Err(result) = unsafe { self.raw().bind_buffer_memory(handle, memory, 0) } {
            unsafe {
                self.raw().destroy_buffer(handle, None);
                self.raw().free_memory(memory, None);
            }
            return Err(RenderError::creation("vkBindBufferMemory", result));
        }

        Ok(Buffer {
            handle,
            memory,
            size: desc.size,
        })
    }

    fn destroy_buffer(&self, buffer: &Buffer) {
        unsafe {
            self.raw().destroy_buffer(buffer.handle, None);
            self.raw().free_memory(buffer.memory, None);
        }
    }

    fn write_buffer(&self, buffer: &Buffer, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()> {
        let len = data.len() as vk::DeviceSize;
        if offset.checked_add(len).map_or(true, |end| end > buffer.size) {
            return Err(RenderError::creation("vkMapMemory", vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        unsafe {
            let mapped = self
                .raw()
                .map_memory(buffer.memory, offset, len, vk::MemoryMapFlags::empty())
                .map_err(|result| RenderError::creation("vkMapMemory", result))?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
            self.raw().unmap_memory(buffer.memory);
        }
        Ok(())
    }

    fn create_image(&self, desc: &ImageDesc) -> RenderResult<Image> {
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let image = unsafe { self.raw().create_image(&info, None) }
            .map_err(|result| RenderError::creation("vkCreateImage", result))?;

        let requirements = unsafe { self.raw().get_image_memory_requirements(image) };
        let memory = match self.allocate_memory(requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(error) => {
                unsafe { self.raw().destroy_image(image, None) };
                return Err(error);
            }
        };

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: desc.aspect,
                base_mip_level: 0,
                level_count: desc.mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view = unsafe {
            self.raw()
                .bind_image_memory(image, memory, 0)
                .map_err(|result| RenderError::creation("vkBindImageMemory", result))
                .and_then(|()| {
                    self.raw()
                        .create_image_view(&view_info, None)
                        .map_err(|result| RenderError::creation("vkCreateImageView", result))
                })
        };
        let view = match view {
            Ok(view) => view,
            Err(error) => {
                unsafe {
                    self.raw().destroy_image(image, None);
                    self.raw().free_memory(memory, None);
                }
                return Err(error);
            }
        };

        Ok(Image {
            image,
            memory,
            view,
            format: desc.format,
            extent: desc.extent,
        })
    }

    fn destroy_image(&self, image: &Image) {
        unsafe {
            self.raw().destroy_image_view(image.view, None);
            self.raw().destroy_image(image.image, None);
            self.raw().free_memory(image.memory, None);
        }
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> RenderResult<Sampler> {
        let anisotropy = desc.max_anisotropy.filter(|_| self.physical.sampler_anisotropy);
        let info = vk::SamplerCreateInfo::builder()
            .mag_filter(desc.mag_filter)
            .min_filter(desc.min_filter)
            .address_mode_u(desc.address_mode)
            .address_mode_v(desc.address_mode)
            .address_mode_w(desc.address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .max_lod(vk::LOD_CLAMP_NONE);
        let handle = unsafe { self.raw().create_sampler(&info, None) }
            .map_err(|result| RenderError::creation("vkCreateSampler", result))?;
        Ok(Sampler { handle })
    }

    fn destroy_sampler(&self, sampler: &Sampler) {
        unsafe { self.raw().destroy_sampler(sampler.handle, None) };
    }

    fn create_descriptor_set_layout(
        &self,
        desc: &DescriptorSetLayoutDesc,
    ) -> RenderResult<DescriptorSetLayout> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(binding.binding)
                    .descriptor_type(binding.descriptor_type)
                    .descriptor_count(binding.count)
                    .stage_flags(binding.stages)
                    .build()
            })
            .collect();
        let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let handle = unsafe { self.raw().create_descriptor_set_layout(&info, None) }
            .map_err(|result| RenderError::creation("vkCreateDescriptorSetLayout", result))?;
        Ok(DescriptorSetLayout { handle })
    }

    fn destroy_descriptor_set_layout(&self, layout: &DescriptorSetLayout) {
        unsafe { self.raw().destroy_descriptor_set_layout(layout.handle, None) };
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> RenderResult<DescriptorPool> {
        let info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(desc.max_sets)
            .pool_sizes(&desc.pool_sizes);
        let handle = unsafe { self.raw().create_descriptor_pool(&info, None) }
            .map_err(|result| RenderError::creation("vkCreateDescriptorPool", result))?;
        Ok(DescriptorPool { handle })
    }

    fn destroy_descriptor_pool(&self, pool: &DescriptorPool) {
        unsafe { self.raw().destroy_descriptor_pool(pool.handle, None) };
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(layouts);
        unsafe { self.raw().allocate_descriptor_sets(&info) }
            .map_err(|result| RenderError::creation("vkAllocateDescriptorSets", result))
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> RenderResult<Pipeline> {
        let vertex = self.create_shader_module(&desc.vertex_spirv)?;
        let fragment = match self.create_shader_module(&desc.fragment_spirv) {
            Ok(module) => module,
            Err(error) => {
                unsafe { self.raw().destroy_shader_module(vertex, None) };
                return Err(error);
            }
        };

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&desc.set_layouts)
            .push_constant_ranges(&desc.push_constant_ranges);
        let result = unsafe { self.raw().create_pipeline_layout(&layout_info, None) }
            .map_err(|result| RenderError::creation("vkCreatePipelineLayout", result))
            .and_then(|layout| match self.build_pipeline(desc, vertex, fragment, layout) {
                Ok(pipeline) => Ok(Pipeline { pipeline, layout }),
                Err(error) => {
                    unsafe { self.raw().destroy_pipeline_layout(layout, None) };
                    Err(error)
                }
            });

        // Modules are only needed while the pipeline is being built.
        unsafe {
            self.raw().destroy_shader_module(vertex, None);
            self.raw().destroy_shader_module(fragment, None);
        }
        result
    }

    fn destroy_pipeline(&self, pipeline: &Pipeline) {
        unsafe {
            self.raw().destroy_pipeline(pipeline.pipeline, None);
            self.raw().destroy_pipeline_layout(pipeline.layout, None);
        }
    }
}

const fn color_range(level_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count,
        base_array_layer: 0,
        layer_count: 1,
    }
}
