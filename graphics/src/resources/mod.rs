//! GPU resource registries.
//!
//! This module contains the handle-based owners of native GPU memory:
//! - [`BufferRegistry`] - vertex, index, uniform and storage buffers
//! - [`ImageRegistry`] - images with layout tracking
//! - [`DeferredDestructor`] - frame-delayed release of native objects
//!
//! Registries hand out generation-checked handles and keep the native
//! objects to themselves. Destroying a handle never releases memory
//! immediately; the native object is queued on the shared
//! [`DeferredDestructor`] until the frames that may still use it are done.

mod buffer;
mod deferred;
mod image;

pub use buffer::BufferRegistry;
pub use deferred::{DeferredDestructor, DeferredResource};
pub use image::ImageRegistry;
