//! Integration tests for descriptor allocation and updates.
//!
//! ```bash
//! cargo test --test descriptor_tests
//! ```

mod common;

use rstest::rstest;

use common::{Backend, TestContext};
use redlilium_gpu::types::{DescriptorType, ShaderStages};
use redlilium_gpu::{
    BufferDesc, BufferType, CoreConfig, DescriptorLayoutBuilder, DescriptorWriter, MemoryAccess,
    PoolSizeRatio,
};

fn uniform_pools(max_sets: u32, ratio: f32) -> CoreConfig {
    CoreConfig::default().with_descriptor_pools(
        max_sets,
        vec![PoolSizeRatio::new(DescriptorType::UniformBuffer, ratio)],
    )
}

/// Every pool the allocator creates is either ready or full.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_pools_are_ready_or_full(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::with_config(backend, uniform_pools(10, 1.0)) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let layout = ctx.uniform_layout(1);
    let descriptors = ctx.context.descriptors_mut();

    for _ in 0..30 {
        descriptors.allocate(layout).unwrap();
        assert_eq!(
            descriptors.ready_count() + descriptors.full_count(),
            descriptors.pools_created()
        );
    }
    ctx.gpu.destroy_descriptor_set_layout(layout);
}

/// Pools grow by half each time one runs out.
#[test]
fn test_pool_growth_on_dummy() {
    let mut ctx = TestContext::with_config(Backend::Dummy, uniform_pools(10, 1.0)).unwrap();
    let layout = ctx.uniform_layout(1);
    let descriptors = ctx.context.descriptors_mut();

    // 10 + 15 sets fit in the first two pools, the rest go to a third.
    for _ in 0..30 {
        descriptors.allocate(layout).unwrap();
    }
    assert_eq!(descriptors.pools_created(), 3);
    assert_eq!(descriptors.full_count(), 2);
    assert_eq!(descriptors.ready_count(), 1);
    assert_eq!(descriptors.sets_per_pool(), 35);
}

/// Fifteen mixed allocations succeed, and after a clear the full pool is
/// used again instead of creating a new one.
#[test]
fn test_clear_reuses_full_pools() {
    let mut ctx = TestContext::with_config(Backend::Dummy, uniform_pools(10, 10.0)).unwrap();
    let layouts: Vec<_> = (1..=3).map(|count| ctx.uniform_layout(count)).collect();
    let descriptors = ctx.context.descriptors_mut();

    for i in 0..15 {
        descriptors.allocate(layouts[i % layouts.len()]).unwrap();
    }
    assert_eq!(descriptors.full_count(), 1);
    assert_eq!(descriptors.pools_created(), 2);

    descriptors.clear().unwrap();
    assert_eq!(descriptors.full_count(), 0);
    assert_eq!(descriptors.ready_count(), 2);

    for i in 0..20 {
        descriptors.allocate(layouts[i % layouts.len()]).unwrap();
    }
    assert_eq!(descriptors.pools_created(), 2);
}

/// After a clear, a set larger than every recycled pool gets a new pool.
#[test]
fn test_large_set_after_clear() {
    let mut ctx = TestContext::with_config(Backend::Dummy, uniform_pools(1, 1.0)).unwrap();
    let single = ctx.uniform_layout(1);
    let triple = ctx.uniform_layout(3);
    let descriptors = ctx.context.descriptors_mut();

    descriptors.allocate(single).unwrap();
    descriptors.allocate(single).unwrap();
    descriptors.clear().unwrap();

    descriptors.allocate(triple).unwrap();
    assert_eq!(descriptors.pools_created(), 3);
    assert_eq!(descriptors.full_count(), 2);
    assert_eq!(descriptors.ready_count(), 1);
}

/// Descriptors of one type are counted across all bindings of a set.
#[test]
fn test_multi_binding_set_exhausts_pool() {
    let mut ctx = TestContext::with_config(Backend::Dummy, uniform_pools(2, 1.0)).unwrap();
    let single = ctx.uniform_layout(1);
    let double = ctx.uniform_layout(2);
    let dummy = ctx.dummy.clone().unwrap();
    let descriptors = ctx.context.descriptors_mut();

    // The first pool has room for two sets but only two uniform buffers.
    descriptors.allocate(double).unwrap();
    descriptors.allocate(single).unwrap();

    assert_eq!(descriptors.pools_created(), 2);
    assert_eq!(descriptors.full_count(), 1);
    assert_eq!(dummy.live_objects().descriptor_pools, 2);
}

/// A layout assembled with the builder accepts writes from registry buffers.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_layout_builder_and_writer(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut builder = DescriptorLayoutBuilder::new();
    builder
        .add_binding(0, DescriptorType::UniformBuffer)
        .add_binding(1, DescriptorType::StorageBuffer);
    let layout = builder
        .build(
            ctx.gpu.as_ref(),
            ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            "material",
        )
        .unwrap();

    let camera = ctx
        .context
        .buffers_mut()
        .create_buffer(
            BufferDesc::new(BufferType::Uniform, MemoryAccess::CpuUpload, 1, 64),
            "camera",
        )
        .unwrap();
    let instances = ctx
        .context
        .buffers_mut()
        .create_buffer(
            BufferDesc::new(BufferType::Storage, MemoryAccess::GpuLocal, 32, 16),
            "instances",
        )
        .unwrap();
    let set = ctx.context.descriptors_mut().allocate(layout).unwrap();

    let buffers = ctx.context.buffers();
    let mut writer = DescriptorWriter::new();
    writer
        .write_buffer(
            0,
            buffers.native(camera),
            64,
            0,
            DescriptorType::UniformBuffer,
        )
        .write_buffer(
            1,
            buffers.native(instances),
            32 * 16,
            0,
            DescriptorType::StorageBuffer,
        );
    assert_eq!(writer.len(), 2);
    writer.update_set(ctx.gpu.as_ref(), set);

    if let Some(dummy) = &ctx.dummy {
        assert_eq!(dummy.stats().descriptor_writes, 2);
    }
    ctx.gpu.destroy_descriptor_set_layout(layout);
}

/// A set larger than a whole pool is fatal.
#[test]
#[should_panic(expected = "does not fit into a fresh pool")]
fn test_oversized_set_is_fatal() {
    let mut ctx = TestContext::with_config(Backend::Dummy, uniform_pools(1, 1.0)).unwrap();
    let layout = ctx.uniform_layout(3);
    let _ = ctx.context.descriptors_mut().allocate(layout);
}
