use serde::{Deserialize, Serialize};

/// Outbound request body for the provider's `/api/v3/images/generations`
/// endpoint. Optional fields are omitted from the JSON when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation_options: Option<SequentialImageGenerationOptions>,
    pub response_format: String,
    pub size: String,
    pub stream: bool,
    pub watermark: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialImageGenerationOptions {
    pub max_images: u32,
}

/// Aggregated provider response, assembled from the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub data: Vec<ImageData>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub generated_images: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Caller-facing parameters for a single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateImageParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub watermark: bool,
}

/// Caller-facing parameters for sequential multi-image generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialImagesParams {
    pub prompt: String,
    pub max_images: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub watermark: bool,
}
