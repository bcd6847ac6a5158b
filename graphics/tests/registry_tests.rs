//! Integration tests for the buffer and image registries.
//!
//! Tests are parameterized using `rstest` to run against every backend that
//! is compiled in. Cases for an unavailable backend are skipped. Checks that
//! need to look behind the backend interface run on the dummy backend only.
//!
//! ```bash
//! cargo test --test registry_tests
//! ```

mod common;

use rstest::rstest;

use common::{Backend, TestContext, generate_test_pattern};
use redlilium_gpu::{
    BufferDesc, BufferType, CoreConfig, ImageDesc, ImageFormat, ImageLayout, ImageType,
    MemoryAccess,
};

fn vertex_desc() -> BufferDesc {
    BufferDesc::new(BufferType::Vertex, MemoryAccess::CpuUpload, 4, 12)
}

// ============================================================================
// Handle Lifecycle Tests
// ============================================================================

/// Destroying a buffer and creating another reuses slot 0 with generation 1.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_buffer_handle_reuse(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let buffers = ctx.context.buffers_mut();

    let first = buffers.create_buffer(vertex_desc(), "first").unwrap();
    assert_eq!((first.index(), first.generation()), (0, 0));

    buffers.destroy_buffer(first);
    assert!(!buffers.is_valid(first));

    let second = buffers.create_buffer(vertex_desc(), "second").unwrap();
    assert_eq!((second.index(), second.generation()), (0, 1));
    assert!(!buffers.is_valid(first));
    assert!(buffers.is_valid(second));
}

/// Freed slots are reused most recent first, each with a bumped generation.
#[test]
fn test_free_slots_are_reused_lifo() {
    let mut ctx = TestContext::new(Backend::Dummy).unwrap();
    let buffers = ctx.context.buffers_mut();

    let a = buffers.create_buffer(vertex_desc(), "a").unwrap();
    let b = buffers.create_buffer(vertex_desc(), "b").unwrap();
    let _c = buffers.create_buffer(vertex_desc(), "c").unwrap();

    buffers.destroy_buffer(b);
    buffers.destroy_buffer(a);

    let reused_a = buffers.create_buffer(vertex_desc(), "d").unwrap();
    let reused_b = buffers.create_buffer(vertex_desc(), "e").unwrap();
    assert_eq!(reused_a.index(), a.index());
    assert_eq!(reused_a.generation(), a.generation() + 1);
    assert_eq!(reused_b.index(), b.index());
    assert_eq!(reused_b.generation(), b.generation() + 1);
}

/// Using a handle after its resource was destroyed is fatal.
#[test]
#[should_panic(expected = "stale handle")]
fn test_stale_buffer_handle_is_fatal() {
    let mut ctx = TestContext::new(Backend::Dummy).unwrap();
    let buffers = ctx.context.buffers_mut();
    let handle = buffers.create_buffer(vertex_desc(), "gone").unwrap();
    buffers.destroy_buffer(handle);
    let _ = buffers.update_buffer(handle, &[0; 4]);
}

/// Running out of slots is fatal.
#[test]
#[should_panic(expected = "pool exhausted")]
fn test_buffer_capacity_is_fatal() {
    let config = CoreConfig::default().with_buffer_capacity(2);
    let mut ctx = TestContext::with_config(Backend::Dummy, config).unwrap();
    let buffers = ctx.context.buffers_mut();
    for i in 0..3 {
        buffers
            .create_buffer(vertex_desc(), &format!("buffer {}", i))
            .unwrap();
    }
}

/// Native buffers are released only after the in-flight frames pass.
#[test]
fn test_destroyed_buffer_outlives_frames_in_flight() {
    let config = CoreConfig::default().with_frames_in_flight(3);
    let mut ctx = TestContext::with_config(Backend::Dummy, config).unwrap();
    let dummy = ctx.dummy.clone().unwrap();

    let handle = ctx
        .context
        .buffers_mut()
        .create_buffer(vertex_desc(), "in flight")
        .unwrap();
    ctx.context.buffers_mut().destroy_buffer(handle);

    for _ in 0..2 {
        ctx.context.advance_frame();
        assert_eq!(dummy.live_objects().buffers, 1);
    }
    ctx.context.advance_frame();
    assert_eq!(dummy.live_objects().buffers, 0);
}

// ============================================================================
// Buffer Data Tests
// ============================================================================

/// Data written to a CPU-upload buffer reads back unchanged.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_cpu_upload_round_trip(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let buffers = ctx.context.buffers_mut();
    let data = generate_test_pattern(48);

    let handle = buffers.create_buffer(vertex_desc(), "upload").unwrap();
    buffers.update_buffer(handle, &data).unwrap();
    assert_eq!(buffers.read_buffer(handle).unwrap(), data);
}

/// Data written to a device-local buffer goes through staging and reads back.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_gpu_local_round_trip(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let buffers = ctx.context.buffers_mut();
    let data = generate_test_pattern(1024);

    let handle = buffers
        .create_buffer(
            BufferDesc::new(BufferType::Storage, MemoryAccess::GpuLocal, 256, 4),
            "storage",
        )
        .unwrap();
    buffers.update_buffer(handle, &data).unwrap();
    assert_eq!(buffers.read_buffer(handle).unwrap(), data);
}

/// Resizing keeps the handle and changes the allocation.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_resize_keeps_handle(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let buffers = ctx.context.buffers_mut();

    let handle = buffers.create_buffer(vertex_desc(), "grows").unwrap();
    buffers.resize_buffer(handle, 16).unwrap();

    assert!(buffers.is_valid(handle));
    assert_eq!(buffers.desc(handle).size, 16);
    assert!(buffers.native(handle).size() >= 16 * 12);

    let data = generate_test_pattern(16 * 12);
    buffers.update_buffer(handle, &data).unwrap();
    assert_eq!(buffers.read_buffer(handle).unwrap(), data);
}

// ============================================================================
// Image Tests
// ============================================================================

/// A new texture is ready for sampling without an explicit transition.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_texture_created_shader_read_only(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let handle = ctx
        .context
        .images_mut()
        .create_image(
            ImageDesc::new(ImageType::Texture, ImageFormat::Rgba8Unorm, 256, 256),
            "albedo",
        )
        .unwrap();

    let images = ctx.context.images();
    assert_eq!(images.layout(handle), ImageLayout::ShaderReadOnly);
    assert_eq!(images.desc(handle).channels, 4);

    if let Some(dummy) = &ctx.dummy {
        let id = images.native(handle).dummy_id().unwrap();
        assert_eq!(dummy.image_layout(id), Some(ImageLayout::ShaderReadOnly));
        assert_eq!(dummy.barriers().len(), 1);
    }
}

/// Transitioning twice to the same layout records one barrier.
#[test]
fn test_repeated_transition_is_single_barrier() {
    let mut ctx = TestContext::new(Backend::Dummy).unwrap();
    let dummy = ctx.dummy.clone().unwrap();
    let images = ctx.context.images_mut();

    let handle = images
        .create_image(
            ImageDesc::new(ImageType::RenderTarget, ImageFormat::Rgba8Unorm, 64, 64),
            "target",
        )
        .unwrap();
    let before = dummy.barriers().len();

    images
        .transition_image_layout(handle, ImageLayout::ShaderReadOnly)
        .unwrap();
    images
        .transition_image_layout(handle, ImageLayout::ShaderReadOnly)
        .unwrap();

    assert_eq!(dummy.barriers().len(), before + 1);
    assert_eq!(images.layout(handle), ImageLayout::ShaderReadOnly);
}

/// Uploads and copies return images to the layout they started in.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_upload_and_copy_restore_layouts(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let images = ctx.context.images_mut();

    let src = images
        .create_image(
            ImageDesc::new(ImageType::Texture, ImageFormat::Rgba8Unorm, 16, 16),
            "source",
        )
        .unwrap();
    let dst = images
        .create_image(
            ImageDesc::new(ImageType::RenderTarget, ImageFormat::Rgba8Unorm, 16, 16),
            "destination",
        )
        .unwrap();

    images
        .write_image(src, &generate_test_pattern(16 * 16 * 4))
        .unwrap();
    assert_eq!(images.layout(src), ImageLayout::ShaderReadOnly);

    images.copy_image(src, dst).unwrap();
    assert_eq!(images.layout(src), ImageLayout::ShaderReadOnly);
    assert_eq!(images.layout(dst), ImageLayout::ColorAttachment);
}

/// Depth buffers land in the depth attachment layout.
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::vulkan(Backend::Vulkan)]
fn test_depth_buffer_layout(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let handle = ctx
        .context
        .images_mut()
        .create_image(
            ImageDesc::new(ImageType::DepthBuffer, ImageFormat::Depth32Float, 128, 128),
            "depth",
        )
        .unwrap();
    assert_eq!(
        ctx.context.images().layout(handle),
        ImageLayout::DepthStencilAttachment
    );
}

/// Tooling accessors list exactly the live resources.
#[test]
fn test_tooling_accessors() {
    let mut ctx = TestContext::new(Backend::Dummy).unwrap();

    let buffer = ctx
        .context
        .buffers_mut()
        .create_buffer(vertex_desc(), "mesh vertices")
        .unwrap();
    let image = ctx
        .context
        .images_mut()
        .create_image(
            ImageDesc::new(ImageType::Texture, ImageFormat::R8Unorm, 8, 8),
            "mask",
        )
        .unwrap();
    ctx.context
        .images_mut()
        .create_image(
            ImageDesc::new(ImageType::Texture, ImageFormat::R8Unorm, 8, 8),
            "noise",
        )
        .unwrap();
    ctx.context.images_mut().destroy_image(image);

    let buffers = ctx.context.buffers();
    assert_eq!(buffers.size(), 1);
    assert_eq!(buffers.metadata()[0].name, "mesh vertices");
    assert_eq!(buffers.metadata()[0].handle, buffer);
    assert_eq!(buffers.descriptors()[0].ty, BufferType::Vertex);

    let images = ctx.context.images();
    assert_eq!(images.image_size(), 1);
    let names: Vec<_> = images
        .image_metadata()
        .into_iter()
        .map(|meta| meta.name)
        .collect();
    assert_eq!(names, vec!["noise"]);
    assert_eq!(images.image_descriptors()[0].format, ImageFormat::R8Unorm);
}
