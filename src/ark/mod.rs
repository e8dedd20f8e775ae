pub mod image_client;
pub mod stream;

pub use image_client::{ImageClient, ImageGeneration};
pub use stream::{aggregate, StreamAggregator};
