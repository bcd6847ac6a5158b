//! Vulkan shader module, render pass and pipeline creation.

use std::ffi::CString;

use ash::vk;

use crate::error::GraphicsError;
use crate::types::{
    ColorAttachmentState, GraphicsPipelineDesc, PushConstantRange, RenderPassDescriptor,
};

use super::conversion::{
    convert_blend_factor, convert_blend_op, convert_color_writes, convert_compare_op,
    convert_cull_mode, convert_dynamic_state, convert_front_face, convert_image_format,
    convert_polygon_mode, convert_sample_count, convert_shader_stage, convert_shader_stages,
    convert_topology, convert_vertex_format,
};

/// Create a shader module from SPIR-V words.
pub fn create_shader_module(
    device: &ash::Device,
    spirv: &[u32],
) -> Result<vk::ShaderModule, GraphicsError> {
    if spirv.is_empty() {
        return Err(GraphicsError::InvalidParameter(
            "Shader module needs SPIR-V code".to_string(),
        ));
    }
    let create_info = vk::ShaderModuleCreateInfo::default().code(spirv);
    unsafe { device.create_shader_module(&create_info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create shader module: {:?}", e))
    })
}

/// Create a single-subpass render pass.
///
/// Attachments are cleared on load and stored; color attachments end in
/// `SHADER_READ_ONLY_OPTIMAL`, depth in `DEPTH_STENCIL_ATTACHMENT_OPTIMAL`.
pub fn create_render_pass(
    device: &ash::Device,
    descriptor: &RenderPassDescriptor,
) -> Result<vk::RenderPass, GraphicsError> {
    let samples = convert_sample_count(descriptor.samples);

    let mut attachments: Vec<vk::AttachmentDescription> = descriptor
        .color_formats
        .iter()
        .map(|format| {
            vk::AttachmentDescription::default()
                .format(convert_image_format(*format))
                .samples(samples)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
        })
        .collect();

    let color_refs: Vec<vk::AttachmentReference> = (0..descriptor.color_formats.len())
        .map(|i| {
            vk::AttachmentReference::default()
                .attachment(i as u32)
                .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        })
        .collect();

    let depth_ref = descriptor.depth_format.map(|format| {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(convert_image_format(format))
                .samples(samples)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        );
        vk::AttachmentReference::default()
            .attachment(descriptor.color_formats.len() as u32)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
    });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth_ref) = depth_ref.as_ref() {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }
    let subpasses = [subpass];

    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&create_info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create render pass: {:?}", e))
    })
}

/// Create a pipeline layout.
pub fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constants: &[PushConstantRange],
) -> Result<vk::PipelineLayout, GraphicsError> {
    let ranges: Vec<vk::PushConstantRange> = push_constants
        .iter()
        .map(|range| {
            vk::PushConstantRange::default()
                .stage_flags(convert_shader_stages(range.stages))
                .offset(range.offset)
                .size(range.size)
        })
        .collect();

    let create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(set_layouts)
        .push_constant_ranges(&ranges);

    unsafe { device.create_pipeline_layout(&create_info, None) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to create pipeline layout: {:?}", e))
    })
}

fn color_blend_attachment(state: &ColorAttachmentState) -> vk::PipelineColorBlendAttachmentState {
    let attachment = vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(convert_color_writes(state.write_mask));

    match state.blend {
        Some(blend) => attachment
            .blend_enable(true)
            .src_color_blend_factor(convert_blend_factor(blend.color.src_factor))
            .dst_color_blend_factor(convert_blend_factor(blend.color.dst_factor))
            .color_blend_op(convert_blend_op(blend.color.operation))
            .src_alpha_blend_factor(convert_blend_factor(blend.alpha.src_factor))
            .dst_alpha_blend_factor(convert_blend_factor(blend.alpha.dst_factor))
            .alpha_blend_op(convert_blend_op(blend.alpha.operation)),
        None => attachment.blend_enable(false),
    }
}

/// Create a graphics pipeline.
///
/// `shader_modules` holds the native module for each entry of
/// `desc.shaders()`, in the same order.
pub fn create_graphics_pipeline(
    device: &ash::Device,
    desc: &GraphicsPipelineDesc,
    shader_modules: &[vk::ShaderModule],
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    subpass: u32,
) -> Result<vk::Pipeline, GraphicsError> {
    let entry_points = desc
        .shaders()
        .iter()
        .map(|shader| {
            CString::new(shader.entry_point.as_str()).map_err(|e| {
                GraphicsError::InvalidParameter(format!(
                    "Invalid entry point name for shader '{}' (contains null byte): {}",
                    shader.name, e
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = desc
        .shaders()
        .iter()
        .zip(shader_modules)
        .zip(&entry_points)
        .map(|((shader, module), entry)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(convert_shader_stage(shader.stage))
                .module(*module)
                .name(entry)
        })
        .collect();

    let (binding_descriptions, attribute_descriptions) = match desc.vertex_layout() {
        Some(layout) => (
            vec![
                vk::VertexInputBindingDescription::default()
                    .binding(0)
                    .stride(layout.stride)
                    .input_rate(vk::VertexInputRate::VERTEX),
            ],
            layout
                .attributes
                .iter()
                .map(|attr| {
                    vk::VertexInputAttributeDescription::default()
                        .location(attr.location)
                        .binding(0)
                        .format(convert_vertex_format(attr.format))
                        .offset(attr.offset)
                })
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&binding_descriptions)
        .vertex_attribute_descriptions(&attribute_descriptions);

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(convert_topology(desc.topology()))
        .primitive_restart_enable(desc.primitive_restart());

    let viewports: Vec<vk::Viewport> = desc
        .static_viewports()
        .iter()
        .map(|v| vk::Viewport {
            x: v.x,
            y: v.y,
            width: v.width,
            height: v.height,
            min_depth: v.min_depth,
            max_depth: v.max_depth,
        })
        .collect();
    let scissors: Vec<vk::Rect2D> = desc
        .static_scissors()
        .iter()
        .map(|r| vk::Rect2D {
            offset: vk::Offset2D { x: r.x, y: r.y },
            extent: vk::Extent2D {
                width: r.width,
                height: r.height,
            },
        })
        .collect();

    let mut viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(desc.viewport_count())
        .scissor_count(desc.scissor_count());
    if !viewports.is_empty() {
        viewport_state = viewport_state.viewports(&viewports);
    }
    if !scissors.is_empty() {
        viewport_state = viewport_state.scissors(&scissors);
    }

    let rasterizer = desc.rasterizer();
    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(rasterizer.depth_clamp)
        .rasterizer_discard_enable(false)
        .polygon_mode(convert_polygon_mode(rasterizer.polygon_mode))
        .line_width(rasterizer.line_width)
        .cull_mode(convert_cull_mode(rasterizer.cull_mode))
        .front_face(convert_front_face(rasterizer.front_face))
        .depth_bias_enable(rasterizer.depth_bias);

    let multisample = desc.multisample();
    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(convert_sample_count(multisample.samples))
        .sample_shading_enable(multisample.sample_shading.is_some())
        .min_sample_shading(multisample.sample_shading.unwrap_or(0.0))
        .alpha_to_coverage_enable(multisample.alpha_to_coverage);

    let depth = desc.depth_stencil();
    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(depth.depth_test)
        .depth_write_enable(depth.depth_write)
        .depth_compare_op(convert_compare_op(depth.compare))
        .depth_bounds_test_enable(false)
        .stencil_test_enable(depth.stencil_test);

    let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = desc
        .color_attachments()
        .iter()
        .map(color_blend_attachment)
        .collect();

    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states: Vec<vk::DynamicState> = desc
        .dynamic_states()
        .iter()
        .map(|state| convert_dynamic_state(*state))
        .collect();
    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(subpass);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    }
    .map_err(|(_, e)| {
        GraphicsError::ResourceCreationFailed(format!(
            "Failed to create graphics pipeline '{}': {:?}",
            desc.name(),
            e
        ))
    })?;

    pipelines.into_iter().next().ok_or_else(|| {
        GraphicsError::Internal("Pipeline creation returned nothing".to_string())
    })
}
