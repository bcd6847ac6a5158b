//! Samplers referenced by combined image sampler bindings.

use super::CompareOp;

/// `max_lod` that leaves every mip level reachable (`VK_LOD_CLAMP_NONE`).
pub const LOD_CLAMP_NONE: f32 = 1000.0;

/// Texel filter, used for magnification, minification and mip selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Behaviour outside the `[0, 1]` texture coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirrorRepeat,
    ClampToBorder,
}

/// Sampler state. One filter and one address mode cover every axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode: AddressMode,
    /// Highest mip level the sampler may read.
    pub max_lod: f32,
    /// Depth comparison, for shadow map lookups.
    pub compare: Option<CompareOp>,
}

impl SamplerDescriptor {
    /// Nearest filtering, clamped to edge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear filtering between texels and mip levels.
    pub fn linear() -> Self {
        Self {
            filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    pub fn with_compare(mut self, compare: CompareOp) -> Self {
        self.compare = Some(compare);
        self
    }
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            filter: FilterMode::Nearest,
            mipmap_filter: FilterMode::Nearest,
            address_mode: AddressMode::ClampToEdge,
            max_lod: LOD_CLAMP_NONE,
            compare: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_sampler() {
        let sampler = SamplerDescriptor::linear()
            .with_address_mode(AddressMode::Repeat)
            .with_label("albedo");
        assert_eq!(sampler.filter, FilterMode::Linear);
        assert_eq!(sampler.mipmap_filter, FilterMode::Linear);
        assert_eq!(sampler.address_mode, AddressMode::Repeat);
        assert_eq!(sampler.label.as_deref(), Some("albedo"));
        assert!(sampler.compare.is_none());
    }

    #[test]
    fn test_shadow_sampler() {
        let sampler = SamplerDescriptor::new().with_compare(CompareOp::LessOrEqual);
        assert_eq!(sampler.compare, Some(CompareOp::LessOrEqual));
        assert_eq!(sampler.filter, FilterMode::Nearest);
    }
}
