//! Common utilities for registry integration tests.
//!
//! This module provides shared test infrastructure that can be reused
//! across different backend implementations.

use std::sync::Arc;

use redlilium_gpu::backend::GpuDescriptorSetLayout;
use redlilium_gpu::types::{DescriptorBinding, DescriptorType, ShaderStages};
use redlilium_gpu::{CoreConfig, DummyBackend, GpuBackend, ResourceContext};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generate a recognizable byte pattern.
#[allow(dead_code)]
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 + 3) as u8).collect()
}

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend (host memory, no GPU).
    Dummy,
    /// Vulkan backend (native via ash).
    Vulkan,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy => true,
            Backend::Vulkan => cfg!(feature = "vulkan-backend"),
        }
    }

    /// Get the backend name for display.
    #[allow(dead_code)]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
            Backend::Vulkan => "vulkan",
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context owning a backend and a resource context on top of it.
pub struct TestContext {
    /// The backend being tested.
    #[allow(dead_code)]
    pub backend: Backend,
    /// Inspection access when running on the dummy backend.
    #[allow(dead_code)]
    pub dummy: Option<Arc<DummyBackend>>,
    /// The native backend shared by everything in the context.
    #[allow(dead_code)]
    pub gpu: Arc<dyn GpuBackend>,
    /// Registries and allocators under test.
    pub context: ResourceContext,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_config(backend, CoreConfig::default())
    }

    /// Create a test context with custom settings.
    pub fn with_config(backend: Backend, config: CoreConfig) -> Option<Self> {
        init_logging();
        if !backend.is_available() {
            return None;
        }

        let dummy = match backend {
            Backend::Dummy => Some(Arc::new(DummyBackend::new())),
            Backend::Vulkan => None,
        };
        let gpu = match &dummy {
            Some(dummy) => dummy.clone() as Arc<dyn GpuBackend>,
            None => create_vulkan()?,
        };
        let context = ResourceContext::new(gpu.clone(), config).ok()?;

        Some(Self {
            backend,
            dummy,
            gpu,
            context,
        })
    }

    /// Create a descriptor set layout with `count` uniform buffer bindings.
    #[allow(dead_code)]
    pub fn uniform_layout(&self, count: u32) -> GpuDescriptorSetLayout {
        let bindings: Vec<_> = (0..count)
            .map(|binding| DescriptorBinding {
                binding,
                ty: DescriptorType::UniformBuffer,
                count: 1,
                stages: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            })
            .collect();
        self.gpu
            .create_descriptor_set_layout(&bindings)
            .expect("Failed to create descriptor set layout")
    }
}

#[cfg(feature = "vulkan-backend")]
fn create_vulkan() -> Option<Arc<dyn GpuBackend>> {
    use redlilium_gpu::BackendParameters;
    use redlilium_gpu::backend::vulkan::VulkanBackend;

    match VulkanBackend::with_params(&BackendParameters::new().with_app_name("redlilium-gpu tests"))
    {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            eprintln!("Vulkan backend not available: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "vulkan-backend"))]
fn create_vulkan() -> Option<Arc<dyn GpuBackend>> {
    None
}
