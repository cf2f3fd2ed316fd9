use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::json;

use crate::{handler::RequestHandler, models::PoseTransferRequest};

const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn generate(
    handler: web::Data<RequestHandler>,
    body: web::Json<PoseTransferRequest>,
) -> HttpResponse {
    match handler.handle(&body.into_inner()).await {
        Ok(outcome) if outcome.success => HttpResponse::Ok().json(outcome),
        Ok(outcome) => HttpResponse::BadGateway().json(outcome),
        Err(e) => {
            HttpResponse::BadRequest().json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(MAX_BODY_BYTES))
        .route("/health", web::get().to(health))
        .route("/api/generate", web::post().to(generate));
}

pub async fn run(handler: RequestHandler, port: u16) -> std::io::Result<()> {
    let data = web::Data::new(handler);
    log::info!("Serving pose transfer on http://0.0.0.0:{}", port);

    HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeminiConfig;
    use crate::gemini::GeminiClient;
    use crate::pipeline::GenerationOrchestrator;
    use crate::retry::RetryPolicy;
    use crate::telemetry::{TelemetryReporter, Tracer};
    use crate::test_support::{pose_json, sample_image, FakeBackend, RecordingSink};
    use actix_web::{http::StatusCode, test};
    use std::sync::Arc;
    use std::time::Duration;

    fn handler(backend: FakeBackend) -> RequestHandler {
        let config = GeminiConfig::new().with_models("analysis", "image");
        let retry = RetryPolicy::new(1, Duration::ZERO);
        let client = GeminiClient::with_backend(Arc::new(backend), &config, retry);
        let reporter = TelemetryReporter::new(Arc::new(RecordingSink::new()), Vec::new());
        let tracer = Tracer::disabled("poseshift");
        RequestHandler::new(GenerationOrchestrator::new(client, tracer, reporter))
    }

    fn body() -> serde_json::Value {
        json!({ "userImage": sample_image(), "poseImage": sample_image() })
    }

    #[actix_web::test]
    async fn test_health() {
        let data = web::Data::new(handler(FakeBackend::new()));
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_generate_statuses() {
        let ok = handler(
            FakeBackend::new()
                .with_text("analysis", &pose_json())
                .with_images("image", &["T1VU"]),
        );
        let app =
            test::init_service(App::new().app_data(web::Data::new(ok)).configure(configure)).await;
        let req = test::TestRequest::post().uri("/api/generate").set_json(body()).to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["generatedImage"], "T1VU");

        let failing = handler(FakeBackend::new());
        let app = test::init_service(
            App::new().app_data(web::Data::new(failing)).configure(configure),
        )
        .await;
        let req = test::TestRequest::post().uri("/api/generate").set_json(body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let mut invalid = body();
        invalid["poseImage"]["mimeType"] = json!("text/plain");
        let req = test::TestRequest::post().uri("/api/generate").set_json(invalid).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp: serde_json::Value = test::read_body_json(resp).await;
        assert!(resp["error"].as_str().unwrap().contains("poseImage"));
    }
}
