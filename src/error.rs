use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArkError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Provider returned status {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("no images generated")]
    EmptyResult,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ArkError {
    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ArkError::ConfigError(_) => "config_error",
            ArkError::ValidationError(_) => "validation_error",
            ArkError::TransportError(_) => "transport_error",
            ArkError::UpstreamError { .. } => "upstream_error",
            ArkError::StreamError(_) => "stream_error",
            ArkError::EmptyResult => "empty_result",
            ArkError::TaskNotFound(_) => "task_not_found",
            ArkError::SerializationError(_) => "serialization_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ArkError>;
