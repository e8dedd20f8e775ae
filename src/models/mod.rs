pub mod image;
pub mod task;

pub use image::*;
pub use task::*;
