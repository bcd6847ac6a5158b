//! Image types and descriptors.

use bitflags::bitflags;

use super::ImageLayout;

/// Image format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ImageFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8Srgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 16-bit depth.
    Depth16Unorm,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
    /// 32-bit float depth with 8-bit stencil.
    Depth32FloatStencil8,
}

impl ImageFormat {
    /// Bytes per texel as laid out in a staging buffer.
    pub fn texel_size(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8Srgb
            | Self::Bgra8Unorm
            | Self::R32Float
            | Self::Depth32Float
            | Self::Depth24UnormStencil8 => 4,
            Self::Depth32FloatStencil8 | Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Number of color (or depth/stencil) components.
    pub fn channels(self) -> u32 {
        match self {
            Self::R8Unorm | Self::R32Float | Self::Depth16Unorm | Self::Depth32Float => 1,
            Self::Rg8Unorm | Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8 => 2,
            Self::Rgba8Unorm
            | Self::Rgba8Srgb
            | Self::Bgra8Unorm
            | Self::Rgba16Float
            | Self::Rgba32Float => 4,
        }
    }

    /// Check if this is a depth format.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth32Float
                | Self::Depth24UnormStencil8
                | Self::Depth32FloatStencil8
        )
    }

    /// Check if this format carries a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8)
    }
}

bitflags! {
    /// Usage flags for native images.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        /// Image can be sampled in shaders.
        const SAMPLED = 1 << 0;
        /// Image can be a color attachment.
        const COLOR_ATTACHMENT = 1 << 1;
        /// Image can be a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        /// Image can be a storage image.
        const STORAGE = 1 << 3;
        /// Image can be copied from.
        const COPY_SRC = 1 << 4;
        /// Image can be copied to.
        const COPY_DST = 1 << 5;
    }
}

impl Default for ImageUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Aspects of an image a view or barrier covers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for ImageAspect {
    fn default() -> Self {
        Self::COLOR
    }
}

/// Role of a registry image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    /// Sampled texture.
    Texture,
    /// Color render target.
    RenderTarget,
    /// Depth (and optionally stencil) buffer.
    DepthBuffer,
}

impl ImageType {
    /// Layout the image is moved into right after creation.
    pub fn initial_layout(self) -> ImageLayout {
        match self {
            Self::Texture => ImageLayout::ShaderReadOnly,
            Self::RenderTarget => ImageLayout::ColorAttachment,
            Self::DepthBuffer => ImageLayout::DepthStencilAttachment,
        }
    }

    /// Native usage flags for this role.
    pub fn usage(self) -> ImageUsage {
        let role = match self {
            Self::Texture => ImageUsage::SAMPLED,
            Self::RenderTarget => ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
            Self::DepthBuffer => ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED,
        };
        role | ImageUsage::COPY_SRC | ImageUsage::COPY_DST
    }

    /// Aspect mask for an image of this role in `format`.
    pub fn aspect(self, format: ImageFormat) -> ImageAspect {
        match self {
            Self::DepthBuffer if format.has_stencil() => ImageAspect::DEPTH | ImageAspect::STENCIL,
            Self::DepthBuffer => ImageAspect::DEPTH,
            Self::Texture | Self::RenderTarget => ImageAspect::COLOR,
        }
    }
}

/// Descriptor for creating a native 2D image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ImageDescriptor {
    /// Debug label for the image.
    pub label: Option<String>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Texel format.
    pub format: ImageFormat,
    /// Usage flags.
    pub usage: ImageUsage,
    /// Aspects covered by the default view.
    pub aspect: ImageAspect,
}

impl ImageDescriptor {
    /// Create a new image descriptor.
    pub fn new_2d(
        width: u32,
        height: u32,
        format: ImageFormat,
        usage: ImageUsage,
        aspect: ImageAspect,
    ) -> Self {
        Self {
            label: None,
            width,
            height,
            format,
            usage,
            aspect,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Current layout of an image plus the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayoutHistory {
    current: ImageLayout,
    previous: Option<ImageLayout>,
}

impl LayoutHistory {
    /// Layout the image is in now.
    pub fn current(&self) -> ImageLayout {
        self.current
    }

    /// Layout the image was in before the last transition.
    pub fn previous(&self) -> Option<ImageLayout> {
        self.previous
    }

    /// Record a transition to `layout`.
    pub fn push(&mut self, layout: ImageLayout) {
        self.previous = Some(self.current);
        self.current = layout;
    }
}

/// Description of a registry image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    /// Role of the image.
    pub ty: ImageType,
    /// Texel format.
    pub format: ImageFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Components per texel.
    pub channels: u32,
    /// Layout tracking.
    pub layout_history: LayoutHistory,
}

impl ImageDesc {
    /// Create an image description. The image starts out `Undefined`.
    pub fn new(ty: ImageType, format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            ty,
            format,
            width,
            height,
            channels: format.channels(),
            layout_history: LayoutHistory::default(),
        }
    }

    /// Bytes of tightly packed pixel data for the whole image.
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.texel_size() as u64
    }

    /// Whether two images have the same dimensions.
    pub fn same_extent(&self, other: &ImageDesc) -> bool {
        self.width == other.width && self.height == other.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_descriptor_is_color() {
        let descriptor = ImageDescriptor::default();
        assert_eq!(descriptor.aspect, ImageAspect::COLOR);
        assert!(descriptor.usage.is_empty());
        assert!(descriptor.label.is_none());
    }

    #[test]
    fn test_depth_aspect_includes_stencil_when_present() {
        assert_eq!(
            ImageType::DepthBuffer.aspect(ImageFormat::Depth32Float),
            ImageAspect::DEPTH
        );
        assert_eq!(
            ImageType::DepthBuffer.aspect(ImageFormat::Depth24UnormStencil8),
            ImageAspect::DEPTH | ImageAspect::STENCIL
        );
        assert_eq!(
            ImageType::Texture.aspect(ImageFormat::Rgba8Unorm),
            ImageAspect::COLOR
        );
    }

    #[test]
    fn test_initial_layouts() {
        assert_eq!(ImageType::Texture.initial_layout(), ImageLayout::ShaderReadOnly);
        assert_eq!(
            ImageType::RenderTarget.initial_layout(),
            ImageLayout::ColorAttachment
        );
        assert_eq!(
            ImageType::DepthBuffer.initial_layout(),
            ImageLayout::DepthStencilAttachment
        );
    }

    #[test]
    fn test_image_desc_size() {
        let desc = ImageDesc::new(ImageType::Texture, ImageFormat::Rgba8Unorm, 256, 256);
        assert_eq!(desc.channels, 4);
        assert_eq!(desc.byte_size(), 256 * 256 * 4);
        assert_eq!(desc.layout_history.current(), ImageLayout::Undefined);
    }

    #[test]
    fn test_layout_history_keeps_two_entries() {
        let mut history = LayoutHistory::default();
        history.push(ImageLayout::TransferDst);
        history.push(ImageLayout::ShaderReadOnly);
        assert_eq!(history.current(), ImageLayout::ShaderReadOnly);
        assert_eq!(history.previous(), Some(ImageLayout::TransferDst));
    }
}
