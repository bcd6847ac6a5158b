//! Plain data types shared by the backend, the registries and the builders.

mod buffer;
mod descriptor;
mod image;
mod layout;
mod pipeline;
mod sampler;

pub use buffer::*;
pub use descriptor::*;
pub use image::*;
pub use layout::*;
pub use pipeline::*;
pub use sampler::*;
