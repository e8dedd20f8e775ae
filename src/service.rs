use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ark::{ImageClient, ImageGeneration};
use crate::config::Config;
use crate::error::{ArkError, Result};
use crate::models::{
    GenerateImageParams, ImageGenerationRequest, ImageGenerationResponse,
    SequentialImageGenerationOptions, SequentialImagesParams, Task, TaskStatus,
};
use crate::tasks::TaskManager;

pub const MAX_PROMPT_LEN: usize = 1000;
pub const MAX_SEQUENTIAL_IMAGES: u32 = 10;

/// Handle returned by an asynchronous submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

/// Image generation operations: validation, the synchronous and sequential
/// paths, and the asynchronous task orchestration.
pub struct ImageService {
    config: Arc<Config>,
    client: Arc<dyn ImageGeneration>,
    tasks: Arc<TaskManager>,
}

impl ImageService {
    pub fn new(config: Config) -> Result<Self> {
        let client = ImageClient::new(config.ark.clone())?;
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    /// Build a service over any generation backend. Tests use this with a
    /// stub in place of the HTTP client.
    pub fn with_backend(config: Config, client: Arc<dyn ImageGeneration>) -> Self {
        Self {
            config: Arc::new(config),
            client,
            tasks: Arc::new(TaskManager::new()),
        }
    }

    /// Synchronous generation: blocks until the provider stream is fully
    /// aggregated or fails.
    pub async fn generate_image(
        &self,
        params: GenerateImageParams,
    ) -> Result<ImageGenerationResponse> {
        log::info!("Generating image, prompt={}", params.prompt);
        self.validate_prompt(&params.prompt)?;

        let request = self.build_request(&params);
        let response = self.client.generate(request).await?;

        log::info!(
            "Image generated successfully, image_count={}",
            response.data.len()
        );
        Ok(response)
    }

    /// Asynchronous submission. Returns immediately with a Pending task
    /// handle; the generation runs as a detached tokio task bounded by the
    /// configured provider timeout, not by the submitter's connection.
    ///
    /// In-flight tasks are not counted or bounded; a burst of submissions
    /// spawns a matching burst of provider calls (see DESIGN.md).
    pub async fn generate_image_async(
        &self,
        params: GenerateImageParams,
    ) -> Result<SubmitTaskResponse> {
        log::info!("Starting async image generation, prompt={}", params.prompt);
        self.validate_prompt(&params.prompt)?;

        let task = self.tasks.create(&params.prompt);
        let request = self.build_request(&params);

        let client = Arc::clone(&self.client);
        let tasks = Arc::clone(&self.tasks);
        let task_id = task.id.clone();
        let timeout = Duration::from_secs(self.config.ark.timeout_secs);

        tokio::spawn(async move {
            tasks.mark_processing(&task_id);

            match tokio::time::timeout(timeout, client.generate(request)).await {
                Ok(Ok(response)) => {
                    log::info!(
                        "Async image generation completed, task_id={}, image_count={}",
                        task_id,
                        response.data.len()
                    );
                    tasks.complete(&task_id, response);
                }
                Ok(Err(e)) => {
                    log::error!("Async image generation failed, task_id={}: {}", task_id, e);
                    tasks.fail(&task_id, &e.to_string());
                }
                Err(_) => {
                    log::error!("Async image generation timed out, task_id={}", task_id);
                    tasks.fail(
                        &task_id,
                        &format!("generation timed out after {}s", timeout.as_secs()),
                    );
                }
            }
        });

        Ok(SubmitTaskResponse {
            task_id: task.id,
            status: task.status,
            created_at: task.created_at,
        })
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| ArkError::TaskNotFound(id.to_string()))
    }

    /// Sequential multi-image generation from one prompt, bounded by
    /// `max_images`.
    pub async fn generate_sequential_images(
        &self,
        params: SequentialImagesParams,
    ) -> Result<ImageGenerationResponse> {
        log::info!(
            "Generating sequential images, prompt={}, max_images={}",
            params.prompt,
            params.max_images
        );
        self.validate_sequential(&params)?;

        let request = ImageGenerationRequest {
            model: params
                .model
                .clone()
                .unwrap_or_else(|| self.config.ark.model.clone()),
            prompt: params.prompt.clone(),
            image: None,
            sequential_image_generation: Some("auto".to_string()),
            sequential_image_generation_options: Some(SequentialImageGenerationOptions {
                max_images: params.max_images,
            }),
            response_format: "url".to_string(),
            size: params
                .size
                .clone()
                .unwrap_or_else(|| self.config.ark.default_size.clone()),
            stream: true,
            watermark: params.watermark,
        };

        let response = self.client.generate(request).await?;

        log::info!(
            "Sequential images generated successfully, image_count={}",
            response.data.len()
        );
        Ok(response)
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            service: self.config.app.name.clone(),
            version: self.config.app.version.clone(),
            environment: self.config.app.environment.clone(),
            timestamp: Utc::now(),
        }
    }

    fn build_request(&self, params: &GenerateImageParams) -> ImageGenerationRequest {
        ImageGenerationRequest {
            model: params
                .model
                .clone()
                .unwrap_or_else(|| self.config.ark.model.clone()),
            prompt: params.prompt.clone(),
            image: params.image_urls.clone(),
            sequential_image_generation: None,
            sequential_image_generation_options: None,
            response_format: "url".to_string(),
            size: params
                .size
                .clone()
                .unwrap_or_else(|| self.config.ark.default_size.clone()),
            stream: true,
            watermark: params.watermark,
        }
    }

    fn validate_prompt(&self, prompt: &str) -> Result<()> {
        if prompt.is_empty() {
            return Err(ArkError::ValidationError("prompt is required".into()));
        }

        if prompt.len() > MAX_PROMPT_LEN {
            return Err(ArkError::ValidationError(format!(
                "prompt too long, maximum {} characters",
                MAX_PROMPT_LEN
            )));
        }

        Ok(())
    }

    fn validate_sequential(&self, params: &SequentialImagesParams) -> Result<()> {
        self.validate_prompt(&params.prompt)?;

        if params.max_images == 0 || params.max_images > MAX_SEQUENTIAL_IMAGES {
            return Err(ArkError::ValidationError(format!(
                "max_images must be between 1 and {}",
                MAX_SEQUENTIAL_IMAGES
            )));
        }

        Ok(())
    }
}
