//! Descriptor set management.
//!
//! - [`DescriptorLayoutBuilder`] declares the bindings of a set layout
//! - [`DescriptorAllocator`] carves sets out of a growing list of pools
//! - [`DescriptorWriter`] points the bindings of a set at buffers and images

mod allocator;
mod layout;
mod writer;

pub use allocator::{DescriptorAllocator, MAX_SETS_PER_POOL};
pub use layout::DescriptorLayoutBuilder;
pub use writer::DescriptorWriter;
