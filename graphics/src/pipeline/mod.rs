//! Graphics pipeline creation.
//!
//! A pipeline is described by an immutable [`GraphicsPipelineDesc`] and
//! turned into native objects by [`build_graphics_pipeline`]:
//!
//! ```text
//! GraphicsPipelineDesc ──validate against──▶ DeviceLimits / DeviceFeatures
//!         │
//!         ├──▶ create_pipeline_layout   (descriptor layouts + push constants)
//!         └──▶ create_graphics_pipeline (shaders, fixed function state)
//!                      │
//!                      ▼
//!                  Pipeline { pipeline, layout, info }
//! ```
//!
//! Validation failures are caller bugs and are fatal. Driver failures are
//! returned as [`GraphicsError`].
//!
//! # Example
//!
//! ```ignore
//! let desc = GraphicsPipelineDesc::new("mesh")
//!     .with_shader(ShaderStage::Vertex, vs, "main", "mesh.vert")
//!     .with_shader(ShaderStage::Fragment, fs, "main", "mesh.frag")
//!     .with_vertex_layout(32, attributes)
//!     .with_color_attachments(vec![ColorAttachmentState::replace(ImageFormat::Rgba8Unorm)]);
//! let pipeline = build_graphics_pipeline(backend.as_ref(), &desc, render_pass, 0)?;
//! ```

use crate::backend::{DebugObject, GpuBackend, GpuPipeline, GpuPipelineLayout, GpuRenderPass};
use crate::error::{GraphicsError, fatal};
use crate::resources::{DeferredDestructor, DeferredResource};
use crate::types::{
    DepthStencilState, GraphicsPipelineDesc, ImageFormat, PolygonMode, PrimitiveTopology,
    PushConstantRange, ShaderStage, VertexLayout,
};

/// Summary of how a pipeline was built, kept for tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInfo {
    pub name: String,
    /// Stage and module name of every shader.
    pub shaders: Vec<(ShaderStage, String)>,
    pub vertex_layout: Option<VertexLayout>,
    pub topology: PrimitiveTopology,
    /// Formats of the color attachments.
    pub color_attachments: Vec<ImageFormat>,
    pub depth_stencil: DepthStencilState,
    pub push_constants: Vec<PushConstantRange>,
    pub descriptor_layout_count: usize,
}

impl PipelineInfo {
    fn from_desc(desc: &GraphicsPipelineDesc) -> Self {
        Self {
            name: desc.name().to_string(),
            shaders: desc
                .shaders()
                .iter()
                .map(|shader| (shader.stage, shader.name.clone()))
                .collect(),
            vertex_layout: desc.vertex_layout().cloned(),
            topology: desc.topology(),
            color_attachments: desc
                .color_attachments()
                .iter()
                .map(|attachment| attachment.format)
                .collect(),
            depth_stencil: *desc.depth_stencil(),
            push_constants: desc.push_constants().to_vec(),
            descriptor_layout_count: desc.descriptor_layouts().len(),
        }
    }
}

/// A built graphics pipeline and its layout.
#[derive(Debug)]
pub struct Pipeline {
    pub pipeline: GpuPipeline,
    pub layout: GpuPipelineLayout,
    pub info: PipelineInfo,
}

impl Pipeline {
    /// Hand both native objects to the deferred destructor.
    pub fn destroy(self, deferred: &DeferredDestructor) {
        log::trace!("Destroying pipeline '{}'", self.info.name);
        deferred.queue(DeferredResource::Pipeline(self.pipeline));
        deferred.queue(DeferredResource::PipelineLayout(self.layout));
    }
}

/// Check a pipeline description against the device.
///
/// # Panics
///
/// Panics on the first violated limit or missing feature.
pub fn validate_pipeline_desc(backend: &dyn GpuBackend, desc: &GraphicsPipelineDesc) {
    let limits = backend.limits();
    let features = backend.features();

    let polygon_mode = desc.rasterizer().polygon_mode;
    if polygon_mode != PolygonMode::Fill && !features.fill_mode_non_solid {
        fatal!(
            "pipeline '{}': polygon mode {:?} requires the fillModeNonSolid feature",
            desc.name(),
            polygon_mode
        );
    }

    let push_constant_bytes = desc.push_constant_bytes();
    if push_constant_bytes > u64::from(limits.max_push_constants_size) {
        fatal!(
            "pipeline '{}': push constants use {} bytes, device limit is {}",
            desc.name(),
            push_constant_bytes,
            limits.max_push_constants_size
        );
    }

    let viewports = desc.viewports().len();
    let scissors = desc.scissors().len();
    if viewports != scissors {
        fatal!(
            "pipeline '{}': {} viewports but {} scissors",
            desc.name(),
            viewports,
            scissors
        );
    }

    let viewport_count = desc.viewport_count();
    if viewport_count > 1 && !features.multi_viewport {
        fatal!(
            "pipeline '{}': {} viewports require the multiViewport feature",
            desc.name(),
            viewport_count
        );
    }
    if viewport_count > limits.max_viewports {
        fatal!(
            "pipeline '{}': {} viewports, device limit is {}",
            desc.name(),
            viewport_count,
            limits.max_viewports
        );
    }
}

/// Validate `desc` and create its pipeline layout and pipeline.
///
/// The pipeline is built for `subpass` of `render_pass`. Both objects are
/// named after the pipeline for debug tooling.
pub fn build_graphics_pipeline(
    backend: &dyn GpuBackend,
    desc: &GraphicsPipelineDesc,
    render_pass: GpuRenderPass,
    subpass: u32,
) -> Result<Pipeline, GraphicsError> {
    validate_pipeline_desc(backend, desc);

    let layout = backend.create_pipeline_layout(desc.descriptor_layouts(), desc.push_constants())?;
    let pipeline = match backend.create_graphics_pipeline(desc, layout, render_pass, subpass) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            backend.destroy_pipeline_layout(layout);
            return Err(e);
        }
    };

    backend.set_debug_name(
        DebugObject::PipelineLayout(layout),
        &format!("{} layout", desc.name()),
    );
    backend.set_debug_name(DebugObject::Pipeline(pipeline), desc.name());

    log::debug!(
        "Built pipeline '{}' ({} stages, {} descriptor layouts)",
        desc.name(),
        desc.shaders().len(),
        desc.descriptor_layouts().len()
    );

    Ok(Pipeline {
        pipeline,
        layout,
        info: PipelineInfo::from_desc(desc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceFeatures, DeviceLimits, DummyBackend};
    use crate::types::{
        ColorAttachmentState, RasterizerState, Rect2d, RenderPassDescriptor, ShaderStages,
        Viewport,
    };

    fn shaders(backend: &DummyBackend) -> GraphicsPipelineDesc {
        let vs = backend.create_shader_module(&[0x0723_0203]).unwrap();
        let fs = backend.create_shader_module(&[0x0723_0203]).unwrap();
        GraphicsPipelineDesc::new("test")
            .with_shader(ShaderStage::Vertex, vs, "main", "test.vert")
            .with_shader(ShaderStage::Fragment, fs, "main", "test.frag")
            .with_color_attachments(vec![ColorAttachmentState::replace(ImageFormat::Rgba8Unorm)])
    }

    fn render_pass(backend: &DummyBackend) -> GpuRenderPass {
        backend
            .create_render_pass(&RenderPassDescriptor::new(vec![ImageFormat::Rgba8Unorm]))
            .unwrap()
    }

    #[test]
    fn test_build_names_both_objects() {
        let backend = DummyBackend::new();
        let pipeline =
            build_graphics_pipeline(&backend, &shaders(&backend), render_pass(&backend), 0)
                .unwrap();

        assert_eq!(
            backend.debug_name(pipeline.pipeline.dummy_id().unwrap()).as_deref(),
            Some("test")
        );
        assert_eq!(
            backend.debug_name(pipeline.layout.dummy_id().unwrap()).as_deref(),
            Some("test layout")
        );
        assert_eq!(pipeline.info.shaders.len(), 2);
        assert_eq!(pipeline.info.color_attachments, vec![ImageFormat::Rgba8Unorm]);
    }

    #[test]
    fn test_failed_pipeline_releases_layout() {
        let backend = DummyBackend::new();
        let result = build_graphics_pipeline(
            &backend,
            &GraphicsPipelineDesc::new("empty"),
            render_pass(&backend),
            0,
        );
        assert!(result.is_err());
        assert_eq!(backend.live_objects().pipeline_layouts, 0);
    }

    #[test]
    #[should_panic(expected = "fillModeNonSolid")]
    fn test_wireframe_without_feature_is_fatal() {
        let features = DeviceFeatures {
            fill_mode_non_solid: false,
            ..DeviceFeatures::default()
        };
        let backend = DummyBackend::with_limits(DeviceLimits::default(), features);
        let desc = shaders(&backend).with_rasterizer(RasterizerState {
            polygon_mode: PolygonMode::Line,
            ..RasterizerState::default()
        });
        let _ = build_graphics_pipeline(&backend, &desc, render_pass(&backend), 0);
    }

    #[test]
    #[should_panic(expected = "device limit is 128")]
    fn test_push_constant_limit_is_fatal() {
        let backend = DummyBackend::new();
        let desc = shaders(&backend).with_push_constants(vec![PushConstantRange {
            stages: ShaderStages::VERTEX,
            offset: 64,
            size: 128,
        }]);
        let _ = build_graphics_pipeline(&backend, &desc, render_pass(&backend), 0);
    }

    #[test]
    #[should_panic(expected = "push constants use 4294967312 bytes")]
    fn test_push_constant_range_past_u32_is_fatal() {
        let backend = DummyBackend::new();
        let desc = shaders(&backend).with_push_constants(vec![PushConstantRange {
            stages: ShaderStages::VERTEX,
            offset: u32::MAX - 15,
            size: 32,
        }]);
        let _ = build_graphics_pipeline(&backend, &desc, render_pass(&backend), 0);
    }

    #[test]
    #[should_panic(expected = "2 viewports but 1 scissors")]
    fn test_viewport_scissor_mismatch_is_fatal() {
        let backend = DummyBackend::new();
        let desc = shaders(&backend).with_viewports(
            vec![Viewport::new(64.0, 64.0), Viewport::new(32.0, 32.0)],
            vec![Rect2d::new(64, 64)],
        );
        let _ = build_graphics_pipeline(&backend, &desc, render_pass(&backend), 0);
    }

    #[test]
    #[should_panic(expected = "multiViewport")]
    fn test_multi_viewport_without_feature_is_fatal() {
        let features = DeviceFeatures {
            multi_viewport: false,
            ..DeviceFeatures::default()
        };
        let backend = DummyBackend::with_limits(DeviceLimits::default(), features);
        let desc = shaders(&backend).with_viewports(
            vec![Viewport::new(64.0, 64.0), Viewport::new(32.0, 32.0)],
            vec![Rect2d::new(64, 64), Rect2d::new(32, 32)],
        );
        let _ = build_graphics_pipeline(&backend, &desc, render_pass(&backend), 0);
    }

    #[test]
    fn test_destroy_goes_through_deferred_queue() {
        let backend = std::sync::Arc::new(DummyBackend::new());
        let deferred = DeferredDestructor::new(backend.clone(), 1);
        let pipeline = build_graphics_pipeline(
            backend.as_ref(),
            &shaders(&backend),
            render_pass(&backend),
            0,
        )
        .unwrap();

        pipeline.destroy(&deferred);
        assert_eq!(backend.live_objects().pipelines, 1);
        deferred.advance_frame();
        assert_eq!(backend.live_objects().pipelines, 0);
        assert_eq!(backend.live_objects().pipeline_layouts, 0);
    }
}
