use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::error::ArkError;
use crate::models::{GenerateImageParams, SequentialImagesParams};
use crate::service::ImageService;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ResponseError for ArkError {
    fn status_code(&self) -> StatusCode {
        match self {
            ArkError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ArkError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            ArkError::UpstreamError { .. } | ArkError::EmptyResult | ArkError::StreamError(_) => {
                StatusCode::BAD_GATEWAY
            }
            ArkError::TransportError(_) => StatusCode::GATEWAY_TIMEOUT,
            ArkError::ConfigError(_) | ArkError::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        })
    }
}

async fn generate_image(
    service: web::Data<ImageService>,
    body: web::Json<GenerateImageParams>,
) -> Result<HttpResponse, ArkError> {
    let response = service.generate_image(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn generate_image_async(
    service: web::Data<ImageService>,
    body: web::Json<GenerateImageParams>,
) -> Result<HttpResponse, ArkError> {
    let submitted = service.generate_image_async(body.into_inner()).await?;
    Ok(HttpResponse::Accepted().json(submitted))
}

async fn get_task(
    service: web::Data<ImageService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ArkError> {
    let task = service.get_task(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(task))
}

async fn generate_sequential(
    service: web::Data<ImageService>,
    body: web::Json<SequentialImagesParams>,
) -> Result<HttpResponse, ArkError> {
    let response = service.generate_sequential_images(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn health(service: web::Data<ImageService>) -> HttpResponse {
    HttpResponse::Ok().json(service.health())
}

async fn ready() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ready",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1/images")
            .route("/generations", web::post().to(generate_image))
            .route("/generations/async", web::post().to(generate_image_async))
            .route("/tasks/{task_id}", web::get().to(get_task))
            .route("/sequential", web::post().to(generate_sequential)),
    )
    .route("/health", web::get().to(health))
    .route("/ready", web::get().to(ready));
}

/// Build the service from the configuration and run the HTTP server until
/// shutdown. SIGINT/SIGTERM trigger the actix graceful shutdown sequence.
pub async fn run(config: Config) -> std::io::Result<()> {
    let port = config.server.port;
    let service = ImageService::new(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let service = web::Data::new(service);

    log::info!("HTTP server starting, port={}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArkConfig;
    use crate::error::Result;
    use crate::models::{
        ImageData, ImageGenerationRequest, ImageGenerationResponse, TaskStatus, Usage,
    };
    use crate::service::SubmitTaskResponse;
    use actix_web::test;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedBackend;

    #[async_trait]
    impl crate::ark::ImageGeneration for FixedBackend {
        async fn generate(
            &self,
            _request: ImageGenerationRequest,
        ) -> Result<ImageGenerationResponse> {
            Ok(ImageGenerationResponse {
                id: "gen_http".to_string(),
                object: "list".to_string(),
                created: 1720000000,
                model: "doubao-seedream-4-0-250828".to_string(),
                data: vec![ImageData {
                    url: "https://img/1.png".to_string(),
                    b64_json: None,
                    revised_prompt: None,
                }],
                usage: Usage::default(),
            })
        }
    }

    fn test_service() -> web::Data<ImageService> {
        let config = Config::new().with_ark(ArkConfig::new().with_api_key("test-key"));
        web::Data::new(ImageService::with_backend(config, Arc::new(FixedBackend)))
    }

    #[actix_web::test]
    async fn test_health_endpoint() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "arkgen-image-service");
    }

    #[actix_web::test]
    async fn test_sync_generation_endpoint() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/images/generations")
            .set_json(json!({"prompt": "a red balloon"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: ImageGenerationResponse = test::read_body_json(resp).await;
        assert_eq!(body.data.len(), 1);
    }

    #[actix_web::test]
    async fn test_missing_prompt_is_bad_request() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/images/generations")
            .set_json(json!({"prompt": ""}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
    }

    #[actix_web::test]
    async fn test_async_submission_returns_pending_handle() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/images/generations/async")
            .set_json(json!({"prompt": "a red balloon"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let body: SubmitTaskResponse = test::read_body_json(resp).await;
        assert_eq!(body.status, TaskStatus::Pending);
        assert!(body.task_id.starts_with("task_"));
    }

    #[actix_web::test]
    async fn test_unknown_task_is_not_found() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::get()
            .uri("/v1/images/tasks/task_never_issued")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "task_not_found");
    }

    #[actix_web::test]
    async fn test_sequential_with_invalid_max_images_is_bad_request() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/images/sequential")
            .set_json(json!({"prompt": "mountain views", "max_images": 0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_ready_endpoint() {
        let app =
            test::init_service(App::new().app_data(test_service()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
