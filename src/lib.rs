pub mod ark;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod server;
pub mod service;
pub mod tasks;

pub use ark::{ImageClient, ImageGeneration};
pub use config::{ArkConfig, Config};
pub use error::{ArkError, Result};
pub use models::*;
pub use service::{HealthResponse, ImageService, SubmitTaskResponse};
pub use tasks::TaskManager;
