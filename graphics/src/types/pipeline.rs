//! Graphics pipeline state.
//!
//! [`GraphicsPipelineDesc`] is an immutable value: every `with_*` method
//! consumes the description and returns an updated one, so there is no
//! builder state to reset between independent pipelines.

use bitflags::bitflags;

use crate::backend::{GpuDescriptorSetLayout, GpuShaderModule};
use crate::error::fatal;

use super::ImageFormat;

/// A single programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// The stage as a flag set.
    pub fn flag(self) -> ShaderStages {
        match self {
            Self::Vertex => ShaderStages::VERTEX,
            Self::TessellationControl => ShaderStages::TESSELLATION_CONTROL,
            Self::TessellationEvaluation => ShaderStages::TESSELLATION_EVALUATION,
            Self::Geometry => ShaderStages::GEOMETRY,
            Self::Fragment => ShaderStages::FRAGMENT,
            Self::Compute => ShaderStages::COMPUTE,
        }
    }
}

bitflags! {
    /// Set of shader stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const TESSELLATION_CONTROL = 1 << 1;
        const TESSELLATION_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits();
    }
}

/// Shader module bound to one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageDesc {
    /// Stage the module runs in.
    pub stage: ShaderStage,
    /// Native shader module.
    pub module: GpuShaderModule,
    /// Entry point name.
    pub entry_point: String,
    /// Module name, for diagnostics.
    pub name: String,
}

/// Format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Unorm8x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::Float32 | Self::Uint32 | Self::Unorm8x4 => 4,
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// One vertex attribute read from binding 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset inside a vertex.
    pub offset: u32,
}

/// Interleaved vertex input at binding 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// Bytes per vertex.
    pub stride: u32,
    /// Attributes inside a vertex.
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

/// How polygons are rasterized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
    Point,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    FrontAndBack,
}

/// Winding order of front faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Rasterizer state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: f32,
    pub depth_clamp: bool,
    pub depth_bias: bool,
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
            line_width: 1.0,
            depth_clamp: false,
            depth_bias: false,
        }
    }
}

/// Multisample state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultisampleState {
    /// Samples per pixel (1, 2, 4, 8...).
    pub samples: u32,
    /// Minimum sample shading fraction, `None` disables sample shading.
    pub sample_shading: Option<f32>,
    pub alpha_to_coverage: bool,
}

impl Default for MultisampleState {
    fn default() -> Self {
        Self {
            samples: 1,
            sample_shading: None,
            alpha_to_coverage: false,
        }
    }
}

/// Comparison function for depth testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    #[default]
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

/// Depth/stencil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthStencilState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub compare: CompareOp,
    pub stencil_test: bool,
}

impl DepthStencilState {
    /// Depth test and write with `LessOrEqual`.
    pub fn depth_read_write() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            compare: CompareOp::LessOrEqual,
            stencil_test: false,
        }
    }
}

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
}

/// Blend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend equation for one channel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOp,
}

/// Blend state for a color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Standard premultiplied-free alpha blending.
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOp::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOp::Add,
        },
    };

    /// Additive blending.
    pub const ADDITIVE: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOp::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::One,
            operation: BlendOp::Add,
        },
    };
}

bitflags! {
    /// Color channels written by an attachment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Per-attachment color output state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorAttachmentState {
    pub format: ImageFormat,
    /// `None` replaces the destination.
    pub blend: Option<BlendState>,
    pub write_mask: ColorWrites,
}

impl ColorAttachmentState {
    /// Opaque output to an attachment of `format`.
    pub fn replace(format: ImageFormat) -> Self {
        Self {
            format,
            blend: None,
            write_mask: ColorWrites::ALL,
        }
    }

    /// Set the blend state.
    pub fn with_blend(mut self, blend: BlendState) -> Self {
        self.blend = Some(blend);
        self
    }
}

/// Push-constant range visible to a set of stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    pub stages: ShaderStages,
    pub offset: u32,
    pub size: u32,
}

impl PushConstantRange {
    /// Byte just past the end of the range. Widened so that no range can
    /// wrap around.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

/// Pipeline state that can be changed at record time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicState {
    Viewport,
    Scissor,
    LineWidth,
    DepthBias,
    BlendConstants,
}

/// Viewport rectangle and depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `width` x `height` from the origin.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Integer rectangle, used for scissors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect2d {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2d {
    /// Rectangle covering `width` x `height` from the origin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Descriptor for a single-subpass render pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_formats: Vec<ImageFormat>,
    pub depth_format: Option<ImageFormat>,
    pub samples: u32,
}

impl RenderPassDescriptor {
    /// Render pass with the given color attachments and no depth.
    pub fn new(color_formats: Vec<ImageFormat>) -> Self {
        Self {
            label: None,
            color_formats,
            depth_format: None,
            samples: 1,
        }
    }

    /// Add a depth attachment.
    pub fn with_depth(mut self, format: ImageFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Complete description of a graphics pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    name: String,
    shaders: Vec<ShaderStageDesc>,
    vertex_layout: Option<VertexLayout>,
    topology: PrimitiveTopology,
    primitive_restart: bool,
    rasterizer: RasterizerState,
    multisample: MultisampleState,
    depth_stencil: DepthStencilState,
    color_attachments: Vec<ColorAttachmentState>,
    descriptor_layouts: Vec<GpuDescriptorSetLayout>,
    push_constants: Vec<PushConstantRange>,
    dynamic_states: Vec<DynamicState>,
    viewports: Vec<Viewport>,
    scissors: Vec<Rect2d>,
}

impl GraphicsPipelineDesc {
    /// Start a description. Viewport and scissor are dynamic by default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shaders: Vec::new(),
            vertex_layout: None,
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
            rasterizer: RasterizerState::default(),
            multisample: MultisampleState::default(),
            depth_stencil: DepthStencilState::default(),
            color_attachments: Vec::new(),
            descriptor_layouts: Vec::new(),
            push_constants: Vec::new(),
            dynamic_states: vec![DynamicState::Viewport, DynamicState::Scissor],
            viewports: Vec::new(),
            scissors: Vec::new(),
        }
    }

    /// Attach a shader module to a stage.
    ///
    /// # Panics
    ///
    /// Panics if the stage already has a module.
    pub fn with_shader(
        mut self,
        stage: ShaderStage,
        module: GpuShaderModule,
        entry_point: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        if let Some(existing) = self.shaders.iter().find(|s| s.stage == stage) {
            fatal!(
                "pipeline '{}': {:?} stage already set to '{}', cannot set it to '{}'",
                self.name,
                stage,
                existing.name,
                name
            );
        }
        self.shaders.push(ShaderStageDesc {
            stage,
            module,
            entry_point: entry_point.into(),
            name,
        });
        self
    }

    /// Set the vertex input layout. A stride of zero disables vertex input.
    pub fn with_vertex_layout(mut self, stride: u32, attributes: Vec<VertexAttribute>) -> Self {
        self.vertex_layout = (stride != 0).then_some(VertexLayout { stride, attributes });
        self
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology, primitive_restart: bool) -> Self {
        self.topology = topology;
        self.primitive_restart = primitive_restart;
        self
    }

    /// Set the rasterizer state.
    pub fn with_rasterizer(mut self, rasterizer: RasterizerState) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Set the multisample state.
    pub fn with_multisampling(mut self, multisample: MultisampleState) -> Self {
        self.multisample = multisample;
        self
    }

    /// Set the depth/stencil state.
    pub fn with_depth_stencil(mut self, depth_stencil: DepthStencilState) -> Self {
        self.depth_stencil = depth_stencil;
        self
    }

    /// Set the color attachments and their blend states.
    pub fn with_color_attachments(mut self, attachments: Vec<ColorAttachmentState>) -> Self {
        self.color_attachments = attachments;
        self
    }

    /// Set the descriptor set layouts, in set order.
    pub fn with_descriptor_layouts(mut self, layouts: Vec<GpuDescriptorSetLayout>) -> Self {
        self.descriptor_layouts = layouts;
        self
    }

    /// Set the push-constant ranges.
    pub fn with_push_constants(mut self, ranges: Vec<PushConstantRange>) -> Self {
        self.push_constants = ranges;
        self
    }

    /// Set which state is dynamic. Replaces the default dynamic viewport and scissor.
    pub fn with_dynamic_states(mut self, states: Vec<DynamicState>) -> Self {
        self.dynamic_states = states;
        self
    }

    /// Set the viewports and scissors.
    pub fn with_viewports(mut self, viewports: Vec<Viewport>, scissors: Vec<Rect2d>) -> Self {
        self.viewports = viewports;
        self.scissors = scissors;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shaders(&self) -> &[ShaderStageDesc] {
        &self.shaders
    }

    /// Vertex input, `None` when the pipeline takes no vertex buffers.
    pub fn vertex_layout(&self) -> Option<&VertexLayout> {
        self.vertex_layout.as_ref()
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn primitive_restart(&self) -> bool {
        self.primitive_restart
    }

    pub fn rasterizer(&self) -> &RasterizerState {
        &self.rasterizer
    }

    pub fn multisample(&self) -> &MultisampleState {
        &self.multisample
    }

    pub fn depth_stencil(&self) -> &DepthStencilState {
        &self.depth_stencil
    }

    pub fn color_attachments(&self) -> &[ColorAttachmentState] {
        &self.color_attachments
    }

    pub fn descriptor_layouts(&self) -> &[GpuDescriptorSetLayout] {
        &self.descriptor_layouts
    }

    pub fn push_constants(&self) -> &[PushConstantRange] {
        &self.push_constants
    }

    pub fn dynamic_states(&self) -> &[DynamicState] {
        &self.dynamic_states
    }

    /// Whether a piece of state is dynamic.
    pub fn is_dynamic(&self, state: DynamicState) -> bool {
        self.dynamic_states.contains(&state)
    }

    /// Viewports as configured, including ones overridden by dynamic state.
    pub fn viewports(&self) -> &[Viewport] {
        &self.viewports
    }

    /// Scissors as configured, including ones overridden by dynamic state.
    pub fn scissors(&self) -> &[Rect2d] {
        &self.scissors
    }

    /// Viewports baked into the pipeline. Empty when the viewport is dynamic.
    pub fn static_viewports(&self) -> &[Viewport] {
        if self.is_dynamic(DynamicState::Viewport) {
            &[]
        } else {
            &self.viewports
        }
    }

    /// Scissors baked into the pipeline. Empty when the scissor is dynamic.
    pub fn static_scissors(&self) -> &[Rect2d] {
        if self.is_dynamic(DynamicState::Scissor) {
            &[]
        } else {
            &self.scissors
        }
    }

    /// Number of viewports the pipeline declares (at least one).
    pub fn viewport_count(&self) -> u32 {
        self.viewports.len().max(1) as u32
    }

    /// Number of scissors the pipeline declares (at least one).
    pub fn scissor_count(&self) -> u32 {
        self.scissors.len().max(1) as u32
    }

    /// Bytes of push-constant space the ranges reach into.
    pub fn push_constant_bytes(&self) -> u64 {
        self.push_constants
            .iter()
            .map(PushConstantRange::end)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_stride_disables_vertex_input() {
        let desc = GraphicsPipelineDesc::new("fullscreen").with_vertex_layout(0, Vec::new());
        assert!(desc.vertex_layout().is_none());

        let desc = desc.with_vertex_layout(
            12,
            vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x3,
                offset: 0,
            }],
        );
        assert_eq!(desc.vertex_layout().map(|l| l.stride), Some(12));
    }

    #[test]
    fn test_dynamic_viewport_drops_static_values() {
        let desc = GraphicsPipelineDesc::new("p").with_viewports(
            vec![Viewport::new(640.0, 480.0)],
            vec![Rect2d::new(640, 480)],
        );
        assert!(desc.static_viewports().is_empty());
        assert!(desc.static_scissors().is_empty());
        assert_eq!(desc.viewport_count(), 1);

        let desc = desc.with_dynamic_states(vec![DynamicState::Scissor]);
        assert_eq!(desc.static_viewports().len(), 1);
        assert!(desc.static_scissors().is_empty());
    }

    #[test]
    fn test_push_constant_bytes_uses_furthest_range() {
        let desc = GraphicsPipelineDesc::new("p").with_push_constants(vec![
            PushConstantRange {
                stages: ShaderStages::VERTEX,
                offset: 0,
                size: 64,
            },
            PushConstantRange {
                stages: ShaderStages::FRAGMENT,
                offset: 64,
                size: 16,
            },
        ]);
        assert_eq!(desc.push_constant_bytes(), 80);
    }

    #[test]
    #[should_panic(expected = "Vertex stage already set")]
    fn test_setting_stage_twice_is_fatal() {
        let module = GpuShaderModule::Dummy { id: 1 };
        let _ = GraphicsPipelineDesc::new("p")
            .with_shader(ShaderStage::Vertex, module, "main", "a.vert")
            .with_shader(ShaderStage::Vertex, module, "main", "b.vert");
    }
}
