use std::time::Duration;

use async_trait::async_trait;

use crate::ark::stream;
use crate::config::ArkConfig;
use crate::error::{ArkError, Result};
use crate::logger;
use crate::models::{
    ImageGenerationRequest, ImageGenerationResponse, SequentialImageGenerationOptions,
};

const GENERATIONS_PATH: &str = "/api/v3/images/generations";
const DEFAULT_RESPONSE_FORMAT: &str = "url";
const DEFAULT_SEQUENTIAL_MODE: &str = "auto";
const DEFAULT_SEQUENTIAL_MAX_IMAGES: u32 = 3;

/// Pluggable generation backend.
///
/// [`ImageClient`] is the production implementation; tests substitute a stub
/// to exercise the task lifecycle without a provider.
#[async_trait]
pub trait ImageGeneration: Send + Sync {
    async fn generate(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse>;
}

/// HTTP client for the provider's image-generation endpoint.
#[derive(Clone)]
pub struct ImageClient {
    config: ArkConfig,
    http: reqwest::Client,
}

impl ImageClient {
    pub fn new(config: ArkConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ArkError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Fill unset request fields before dispatch. Streaming is always on:
    /// the provider emits results incrementally and the aggregator folds
    /// them back into one response.
    fn apply_defaults(&self, request: &mut ImageGenerationRequest) {
        if request.model.is_empty() {
            request.model = self.config.model.clone();
        }
        if request.size.is_empty() {
            request.size = self.config.default_size.clone();
        }
        if request.response_format.is_empty() {
            request.response_format = DEFAULT_RESPONSE_FORMAT.to_string();
        }
        if request.sequential_image_generation.is_none() {
            request.sequential_image_generation = Some(DEFAULT_SEQUENTIAL_MODE.to_string());
        }
        if request.sequential_image_generation_options.is_none() {
            request.sequential_image_generation_options = Some(SequentialImageGenerationOptions {
                max_images: DEFAULT_SEQUENTIAL_MAX_IMAGES,
            });
        }
        request.stream = true;
    }
}

#[async_trait]
impl ImageGeneration for ImageClient {
    async fn generate(
        &self,
        mut request: ImageGenerationRequest,
    ) -> Result<ImageGenerationResponse> {
        self.apply_defaults(&mut request);

        let url = format!("{}{}", self.config.base_url, GENERATIONS_PATH);
        log::debug!("Dispatching generation request to {}", url);
        let _timer = logger::timer("image generation");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ArkError::TransportError(format!("failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Provider rejected generation request with status {}", status);
            return Err(ArkError::UpstreamError {
                status: status.as_u16(),
                body,
            });
        }

        stream::aggregate(Box::pin(response.bytes_stream())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> ImageClient {
        ImageClient::new(
            ArkConfig::new()
                .with_api_key("test-key")
                .with_base_url("http://localhost:9999"),
        )
        .unwrap()
    }

    fn bare_request(prompt: &str) -> ImageGenerationRequest {
        ImageGenerationRequest {
            model: String::new(),
            prompt: prompt.to_string(),
            image: None,
            sequential_image_generation: None,
            sequential_image_generation_options: None,
            response_format: String::new(),
            size: String::new(),
            stream: false,
            watermark: false,
        }
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let client = test_client();
        let mut request = bare_request("a red balloon");
        client.apply_defaults(&mut request);

        assert_eq!(request.model, "doubao-seedream-4-0-250828");
        assert_eq!(request.size, "2K");
        assert_eq!(request.response_format, "url");
        assert_eq!(request.sequential_image_generation.as_deref(), Some("auto"));
        assert_eq!(
            request
                .sequential_image_generation_options
                .as_ref()
                .unwrap()
                .max_images,
            3
        );
        assert!(request.stream);
    }

    #[test]
    fn test_defaults_preserve_explicit_fields() {
        let client = test_client();
        let mut request = bare_request("a red balloon");
        request.model = "custom-model".to_string();
        request.size = "1K".to_string();
        request.sequential_image_generation_options =
            Some(SequentialImageGenerationOptions { max_images: 7 });
        client.apply_defaults(&mut request);

        assert_eq!(request.model, "custom-model");
        assert_eq!(request.size, "1K");
        assert_eq!(
            request
                .sequential_image_generation_options
                .as_ref()
                .unwrap()
                .max_images,
            7
        );
    }
}
