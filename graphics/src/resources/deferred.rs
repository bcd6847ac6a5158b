//! Deferred destruction of native objects.
//!
//! The GPU runs one or more frames behind the CPU, so an object released by
//! a registry may still be referenced by in-flight command buffers. Instead
//! of destroying it immediately, the registry queues it here together with
//! the frame it was released in; it is destroyed once `frames_in_flight`
//! frame boundaries have passed.
//!
//! ```text
//! frames_in_flight = 3
//!
//!   frame 0        frame 1        frame 2        frame 3
//!   queue(A) ───────────────────────────────────▶ destroy(A)
//!                  queue(B) ──────────────────────────────▶ frame 4: destroy(B)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::backend::{
    GpuBackend, GpuBuffer, GpuDescriptorPool, GpuDescriptorSetLayout, GpuImage, GpuPipeline,
    GpuPipelineLayout, GpuRenderPass, GpuSampler, GpuShaderModule,
};

/// A native object pending destruction.
#[derive(Debug)]
pub enum DeferredResource {
    Buffer(GpuBuffer),
    Image(GpuImage),
    Sampler(GpuSampler),
    ShaderModule(GpuShaderModule),
    DescriptorSetLayout(GpuDescriptorSetLayout),
    DescriptorPool(GpuDescriptorPool),
    PipelineLayout(GpuPipelineLayout),
    Pipeline(GpuPipeline),
    RenderPass(GpuRenderPass),
}

impl DeferredResource {
    /// Destroy the object now.
    pub fn destroy(self, backend: &dyn GpuBackend) {
        match self {
            Self::Buffer(buffer) => backend.destroy_buffer(buffer),
            Self::Image(image) => backend.destroy_image(image),
            Self::Sampler(sampler) => backend.destroy_sampler(sampler),
            Self::ShaderModule(module) => backend.destroy_shader_module(module),
            Self::DescriptorSetLayout(layout) => backend.destroy_descriptor_set_layout(layout),
            Self::DescriptorPool(pool) => backend.destroy_descriptor_pool(pool),
            Self::PipelineLayout(layout) => backend.destroy_pipeline_layout(layout),
            Self::Pipeline(pipeline) => backend.destroy_pipeline(pipeline),
            Self::RenderPass(render_pass) => backend.destroy_render_pass(render_pass),
        }
    }
}

/// Manages deferred destruction of native objects.
///
/// Objects are held for `frames_in_flight` calls to
/// [`advance_frame`](Self::advance_frame) before being destroyed.
pub struct DeferredDestructor {
    backend: Arc<dyn GpuBackend>,
    /// One queue per frame slot.
    frame_queues: Vec<Mutex<Vec<DeferredResource>>>,
    /// Number of frame boundaries passed so far.
    current_frame: AtomicUsize,
}

impl DeferredDestructor {
    /// Create a destructor that holds objects for `frames_in_flight` frames.
    ///
    /// A value of zero is treated as one.
    pub fn new(backend: Arc<dyn GpuBackend>, frames_in_flight: usize) -> Self {
        let frames_in_flight = frames_in_flight.max(1);
        Self {
            backend,
            frame_queues: (0..frames_in_flight)
                .map(|_| Mutex::new(Vec::new()))
                .collect(),
            current_frame: AtomicUsize::new(0),
        }
    }

    /// Number of frames an object is held before destruction.
    pub fn frames_in_flight(&self) -> usize {
        self.frame_queues.len()
    }

    /// Queue an object for destruction.
    pub fn queue(&self, resource: DeferredResource) {
        let frame = self.current_frame.load(Ordering::Acquire);
        let slot = frame % self.frame_queues.len();
        log::trace!("Deferring destruction of {:?} (frame {})", resource, frame);
        self.frame_queues[slot].lock().push(resource);
    }

    /// Advance to the next frame, destroying objects queued
    /// `frames_in_flight` frames ago.
    ///
    /// Call this only once the GPU has finished the oldest in-flight frame.
    pub fn advance_frame(&self) {
        let next = self.current_frame.fetch_add(1, Ordering::AcqRel) + 1;
        let slot = next % self.frame_queues.len();
        let expired: Vec<_> = self.frame_queues[slot].lock().drain(..).collect();

        if !expired.is_empty() {
            log::debug!(
                "Destroying {} deferred objects at frame {}",
                expired.len(),
                next
            );
        }
        for resource in expired {
            resource.destroy(self.backend.as_ref());
        }
    }

    /// Destroy every pending object immediately.
    ///
    /// Call this only while the device is idle.
    pub fn flush_all(&self) {
        let mut total = 0;
        for queue in &self.frame_queues {
            let resources: Vec<_> = queue.lock().drain(..).collect();
            total += resources.len();
            for resource in resources {
                resource.destroy(self.backend.as_ref());
            }
        }
        if total > 0 {
            log::debug!("Flushed {} deferred objects", total);
        }
    }

    /// Number of objects currently pending destruction.
    pub fn pending_count(&self) -> usize {
        self.frame_queues.iter().map(|q| q.lock().len()).sum()
    }

    /// Number of frame boundaries passed so far.
    pub fn current_frame(&self) -> usize {
        self.current_frame.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DeferredDestructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredDestructor")
            .field("backend", &self.backend.name())
            .field("frames_in_flight", &self.frames_in_flight())
            .field("current_frame", &self.current_frame())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Drop for DeferredDestructor {
    fn drop(&mut self) {
        let pending = self.pending_count();
        if pending > 0 {
            log::warn!(
                "DeferredDestructor dropped with {} pending objects, destroying them now",
                pending
            );
            self.flush_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::SamplerDescriptor;
    use rstest::rstest;

    fn queue_sampler(backend: &DummyBackend, destructor: &DeferredDestructor) {
        let sampler = backend.create_sampler(&SamplerDescriptor::new()).unwrap();
        destructor.queue(DeferredResource::Sampler(sampler));
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    fn test_released_after_frames_in_flight(#[case] frames: usize) {
        let backend = Arc::new(DummyBackend::new());
        let destructor = DeferredDestructor::new(backend.clone(), frames);

        queue_sampler(&backend, &destructor);
        for _ in 0..frames - 1 {
            destructor.advance_frame();
            assert_eq!(destructor.pending_count(), 1);
            assert_eq!(backend.live_objects().samplers, 1);
        }

        destructor.advance_frame();
        assert_eq!(destructor.pending_count(), 0);
        assert_eq!(backend.live_objects().samplers, 0);
    }

    #[test]
    fn test_frame_cycling() {
        let backend = Arc::new(DummyBackend::new());
        let destructor = DeferredDestructor::new(backend, 3);

        assert_eq!(destructor.current_frame(), 0);
        assert_eq!(destructor.pending_count(), 0);

        for i in 0..6 {
            destructor.advance_frame();
            assert_eq!(destructor.current_frame(), i + 1);
        }
    }

    #[test]
    fn test_staggered_releases() {
        let backend = Arc::new(DummyBackend::new());
        let destructor = DeferredDestructor::new(backend.clone(), 2);

        queue_sampler(&backend, &destructor);
        destructor.advance_frame();
        queue_sampler(&backend, &destructor);
        assert_eq!(destructor.pending_count(), 2);

        destructor.advance_frame();
        assert_eq!(destructor.pending_count(), 1);
        destructor.advance_frame();
        assert_eq!(destructor.pending_count(), 0);
    }

    #[test]
    fn test_flush_all_and_zero_frames() {
        let backend = Arc::new(DummyBackend::new());
        let destructor = DeferredDestructor::new(backend.clone(), 0);
        assert_eq!(destructor.frames_in_flight(), 1);

        queue_sampler(&backend, &destructor);
        queue_sampler(&backend, &destructor);
        destructor.flush_all();
        assert_eq!(backend.live_objects().samplers, 0);
    }
}
