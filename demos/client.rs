use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use arkgen::logger::{self, LogLevel, LoggerConfig};
use arkgen::models::{GenerateImageParams, ImageGenerationResponse, SequentialImagesParams, Task, TaskStatus};
use arkgen::service::{HealthResponse, SubmitTaskResponse};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logger::init_with_config(LoggerConfig::development().with_level(LogLevel::Info))?;

    let base_url =
        std::env::var("ARKGEN_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(330))
        .build()?;

    log::info!("=== Health check ===");
    let health: HealthResponse = http
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json()
        .await?;
    log::info!(
        "Health status: {}, service: {} v{}",
        health.status,
        health.service,
        health.version
    );

    log::info!("=== Synchronous generation ===");
    let params = GenerateImageParams {
        prompt: "a cute kitten playing in a garden".to_string(),
        model: None,
        size: Some("2K".to_string()),
        image_urls: None,
        watermark: true,
    };

    let resp = http
        .post(format!("{}/v1/images/generations", base_url))
        .json(&params)
        .send()
        .await?;

    if resp.status().is_success() {
        let result: ImageGenerationResponse = resp.json().await?;
        log::info!("Generated {} images:", result.data.len());
        for (i, image) in result.data.iter().enumerate() {
            log::info!("  Image {}: {}", i + 1, image.url);

            if let Some(b64) = &image.b64_json {
                let filename = format!("generated_image_{}.png", i + 1);
                match STANDARD.decode(b64) {
                    Ok(bytes) => {
                        std::fs::write(&filename, bytes)?;
                        log::info!("💾 Image saved to: {}", filename);
                    }
                    Err(e) => log::error!("Failed to decode image payload: {}", e),
                }
            }
        }
    } else {
        log::error!("Generate image failed: {}", resp.text().await?);
    }

    log::info!("=== Asynchronous generation ===");
    let params = GenerateImageParams {
        prompt: "a beautiful sunset landscape".to_string(),
        model: None,
        size: Some("2K".to_string()),
        image_urls: None,
        watermark: true,
    };

    let submitted: SubmitTaskResponse = http
        .post(format!("{}/v1/images/generations/async", base_url))
        .json(&params)
        .send()
        .await?
        .json()
        .await?;
    log::info!(
        "Task created: {}, status: {:?}",
        submitted.task_id,
        submitted.status
    );

    for _ in 0..30 {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let task: Task = http
            .get(format!("{}/v1/images/tasks/{}", base_url, submitted.task_id))
            .send()
            .await?
            .json()
            .await?;
        log::info!("Task {} status: {:?}", task.id, task.status);

        match task.status {
            TaskStatus::Completed => {
                if let Some(result) = task.result {
                    log::info!("Task completed! Generated {} images:", result.data.len());
                    for (i, image) in result.data.iter().enumerate() {
                        log::info!("  Image {}: {}", i + 1, image.url);
                    }
                }
                break;
            }
            TaskStatus::Failed => {
                log::error!("Task failed: {}", task.error.unwrap_or_default());
                break;
            }
            _ => {}
        }
    }

    log::info!("=== Sequential generation ===");
    let params = SequentialImagesParams {
        prompt: "mountain scenery at different times of day: morning, noon, dusk".to_string(),
        max_images: 3,
        model: None,
        size: Some("2K".to_string()),
        watermark: true,
    };

    let resp = http
        .post(format!("{}/v1/images/sequential", base_url))
        .json(&params)
        .send()
        .await?;

    if resp.status().is_success() {
        let result: ImageGenerationResponse = resp.json().await?;
        log::info!("Generated {} sequential images:", result.data.len());
        for (i, image) in result.data.iter().enumerate() {
            log::info!("  Sequential image {}: {}", i + 1, image.url);
        }
    } else {
        log::error!("Sequential generation failed: {}", resp.text().await?);
    }

    log::info!("=== Done ===");
    Ok(())
}
