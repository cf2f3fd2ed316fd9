use base64::{engine::general_purpose::STANDARD, Engine as _};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{GenerationError, Result},
    gemini::GeminiClient,
    logger,
    models::{GenerationOutcome, ImagePayload, PoseTransferRequest},
    pipeline::GenerationOrchestrator,
    telemetry::{self, Tracer},
};

/// Function entry point: validates the request, runs the pipeline and
/// flushes the tracer before handing the outcome back, since the host may
/// freeze the process right after. Each request logs under its own id.
#[derive(Clone)]
pub struct RequestHandler {
    orchestrator: GenerationOrchestrator,
}

impl RequestHandler {
    pub fn new(orchestrator: GenerationOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = GeminiClient::new(&config.gemini)?;
        let tracer = Tracer::init(&config.datadog);
        let reporter = telemetry::reporter_from_config(&config.datadog);
        Ok(Self::new(GenerationOrchestrator::new(client, tracer, reporter)))
    }

    pub fn tracer(&self) -> &Tracer {
        self.orchestrator.tracer()
    }

    pub fn validate(request: &PoseTransferRequest) -> Result<()> {
        validate_image("userImage", &request.user_image)?;
        validate_image("poseImage", &request.pose_image)
    }

    /// Fails only with [`GenerationError::ValidationError`]; pipeline
    /// failures come back as a failed outcome.
    pub async fn handle(&self, request: &PoseTransferRequest) -> Result<GenerationOutcome> {
        let request_id = Uuid::new_v4().to_string();
        logger::with_request_id(request_id, self.handle_scoped(request)).await
    }

    async fn handle_scoped(&self, request: &PoseTransferRequest) -> Result<GenerationOutcome> {
        if let Err(e) = Self::validate(request) {
            log::warn!("Rejected request: {}", e);
            return Err(e);
        }

        let outcome = self
            .orchestrator
            .run(&request.user_image, &request.pose_image)
            .await;
        self.tracer().flush().await;
        Ok(outcome)
    }

    pub async fn shutdown(&self) {
        self.tracer().shutdown().await;
    }
}

fn validate_image(field: &str, image: &ImagePayload) -> Result<()> {
    if image.data.is_empty() {
        return Err(GenerationError::ValidationError(format!("{} has no data", field)));
    }
    if !image.mime_type.starts_with("image/") {
        return Err(GenerationError::ValidationError(format!(
            "{} has unsupported mime type '{}'",
            field, image.mime_type
        )));
    }
    STANDARD.decode(&image.data).map_err(|e| {
        GenerationError::ValidationError(format!("{} is not valid base64: {}", field, e))
    })?;
    Ok(())
}
