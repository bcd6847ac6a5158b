use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_gpu::types::{DescriptorBinding, DescriptorType, ShaderStages};
use redlilium_gpu::{
    BufferDesc, BufferType, CoreConfig, DummyBackend, GpuBackend, ImageDesc, ImageFormat,
    ImageLayout, ImageType, MemoryAccess, PoolSizeRatio, ResourceContext, ResourcePool,
};

fn dummy_context(config: CoreConfig) -> (Arc<DummyBackend>, ResourceContext) {
    let backend = Arc::new(DummyBackend::new());
    let context = ResourceContext::new(backend.clone(), config).unwrap();
    (backend, context)
}

// ---------------------------------------------------------------------------
// Resource pool
// ---------------------------------------------------------------------------

enum BenchKind {}

fn bench_pool_churn(c: &mut Criterion) {
    c.bench_function("resource_pool_create_destroy_1024", |b| {
        let mut pool: ResourcePool<u64, u32, BenchKind> = ResourcePool::new("bench", 1024);
        let mut handles = Vec::with_capacity(1024);
        b.iter(|| {
            for i in 0..1024u64 {
                handles.push(pool.create_resource(i, 0, "slot"));
            }
            for handle in handles.drain(..) {
                black_box(pool.destroy_resource(handle));
            }
        });
    });
}

fn bench_pool_lookup(c: &mut Criterion) {
    c.bench_function("resource_pool_get_1024", |b| {
        let mut pool: ResourcePool<u64, u32, BenchKind> = ResourcePool::new("bench", 1024);
        let handles: Vec<_> = (0..1024u64)
            .map(|i| pool.create_resource(i, 0, "slot"))
            .collect();
        b.iter(|| {
            let mut sum = 0u64;
            for handle in &handles {
                sum += *pool.get(*handle);
            }
            black_box(sum)
        });
    });
}

// ---------------------------------------------------------------------------
// Registries on the dummy backend
// ---------------------------------------------------------------------------

fn bench_buffer_lifecycle(c: &mut Criterion) {
    c.bench_function("buffer_registry_create_update_destroy", |b| {
        let (_backend, mut context) = dummy_context(CoreConfig::default());
        let desc = BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 64, 32);
        let data = vec![0u8; 64 * 32];
        b.iter(|| {
            let buffers = context.buffers_mut();
            let handle = buffers.create_buffer(desc, "bench").unwrap();
            buffers.update_buffer(handle, &data).unwrap();
            buffers.destroy_buffer(handle);
            context.advance_frame();
        });
    });
}

fn bench_image_transitions(c: &mut Criterion) {
    c.bench_function("image_registry_transition_round_trip", |b| {
        let config = CoreConfig::default().with_strict_layout_validation(true);
        let (_backend, mut context) = dummy_context(config);
        let images = context.images_mut();
        let handle = images
            .create_image(
                ImageDesc::new(ImageType::RenderTarget, ImageFormat::Rgba8Unorm, 256, 256),
                "bench",
            )
            .unwrap();
        b.iter(|| {
            images
                .transition_image_layout(handle, ImageLayout::ShaderReadOnly)
                .unwrap();
            images
                .transition_image_layout(handle, ImageLayout::ColorAttachment)
                .unwrap();
        });
    });
}

// ---------------------------------------------------------------------------
// Descriptor allocation
// ---------------------------------------------------------------------------

fn bench_descriptor_allocate(c: &mut Criterion) {
    c.bench_function("descriptor_allocator_allocate_256_then_clear", |b| {
        let config = CoreConfig::default().with_descriptor_pools(
            64,
            vec![PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.0)],
        );
        let (backend, mut context) = dummy_context(config);
        let layout = backend
            .create_descriptor_set_layout(&[DescriptorBinding {
                binding: 0,
                ty: DescriptorType::UniformBuffer,
                count: 1,
                stages: ShaderStages::VERTEX,
            }])
            .unwrap();
        b.iter(|| {
            let descriptors = context.descriptors_mut();
            for _ in 0..256 {
                black_box(descriptors.allocate(layout).unwrap());
            }
            descriptors.clear().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_pool_churn,
    bench_pool_lookup,
    bench_buffer_lifecycle,
    bench_image_transitions,
    bench_descriptor_allocate,
);
criterion_main!(benches);
