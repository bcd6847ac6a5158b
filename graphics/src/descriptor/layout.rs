//! Descriptor set layout builder.

use crate::backend::{DebugObject, GpuBackend, GpuDescriptorSetLayout};
use crate::error::{GraphicsError, fatal};
use crate::types::{DescriptorBinding, DescriptorType, ShaderStages};

/// Collects bindings and turns them into a native set layout.
///
/// # Example
///
/// ```ignore
/// let layout = DescriptorLayoutBuilder::new()
///     .add_binding(0, DescriptorType::UniformBuffer)
///     .add_binding(1, DescriptorType::CombinedImageSampler)
///     .build(backend.as_ref(), ShaderStages::VERTEX | ShaderStages::FRAGMENT, "material")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single-descriptor binding.
    ///
    /// # Panics
    ///
    /// Panics if `binding` was already added.
    pub fn add_binding(&mut self, binding: u32, ty: DescriptorType) -> &mut Self {
        self.add_array_binding(binding, ty, 1)
    }

    /// Add a binding holding an array of `count` descriptors.
    ///
    /// # Panics
    ///
    /// Panics if `binding` was already added.
    pub fn add_array_binding(&mut self, binding: u32, ty: DescriptorType, count: u32) -> &mut Self {
        if let Some(existing) = self.bindings.iter().find(|b| b.binding == binding) {
            fatal!(
                "descriptor binding {} already declared as {:?}",
                binding,
                existing.ty
            );
        }
        self.bindings.push(DescriptorBinding {
            binding,
            ty,
            count,
            stages: ShaderStages::empty(),
        });
        self
    }

    /// Bindings added so far.
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    /// Remove every binding.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Create the layout, making every binding visible to `stages`.
    pub fn build(
        &self,
        backend: &dyn GpuBackend,
        stages: ShaderStages,
        name: &str,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        let bindings: Vec<DescriptorBinding> = self
            .bindings
            .iter()
            .map(|binding| DescriptorBinding {
                stages: binding.stages | stages,
                ..*binding
            })
            .collect();

        let layout = backend.create_descriptor_set_layout(&bindings)?;
        backend.set_debug_name(DebugObject::DescriptorSetLayout(layout), name);
        log::trace!(
            "Created descriptor set layout '{}' with {} bindings",
            name,
            bindings.len()
        );
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_build_applies_stages() {
        let backend = DummyBackend::new();
        let mut builder = DescriptorLayoutBuilder::new();
        builder
            .add_binding(0, DescriptorType::UniformBuffer)
            .add_array_binding(1, DescriptorType::CombinedImageSampler, 4);

        let layout = builder
            .build(&backend, ShaderStages::FRAGMENT, "material")
            .unwrap();
        assert_eq!(backend.live_objects().descriptor_set_layouts, 1);
        assert_eq!(
            backend.debug_name(layout.dummy_id().unwrap()).as_deref(),
            Some("material")
        );

        // The builder keeps its own bindings stage-free.
        assert!(builder.bindings().iter().all(|b| b.stages.is_empty()));
        builder.clear();
        assert!(builder.bindings().is_empty());
    }

    #[test]
    #[should_panic(expected = "already declared")]
    fn test_duplicate_binding_is_fatal() {
        let mut builder = DescriptorLayoutBuilder::new();
        builder
            .add_binding(0, DescriptorType::UniformBuffer)
            .add_binding(0, DescriptorType::StorageBuffer);
    }
}
