use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::{
    error::{GenerationError, Result},
    gemini::GenerationBackend,
    models::{GenerateContentRequest, GenerationConfig, ImagePayload, Part, PoseDescriptor},
    retry::RetryPolicy,
};

const POSE_ANALYSIS_PROMPT: &str = "Analyze the body pose of the main person in this image. \
Ignore any text overlays, watermarks, logos, borders or captions; describe only the person's body. \
For each region (head, torso, leftArm, rightArm, leftLeg, rightLeg, overall) give a precise, \
self-contained description of its position, angle and orientation, including facial expression \
and gaze for the head. Return only the JSON object with those seven fields.";

#[derive(Clone)]
pub struct PoseClient {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    retry: RetryPolicy,
}

impl PoseClient {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Describe the pose in `image`, retrying empty and unparseable answers
    /// like any other failure.
    pub async fn analyze(&self, image: &ImagePayload) -> Result<PoseDescriptor> {
        let request = Self::build_request(image);
        log::info!("Analyzing pose with model: {}", self.model);

        self.retry
            .execute("analyze_pose", |_| self.analyze_once(&request))
            .await
    }

    async fn analyze_once(&self, request: &GenerateContentRequest) -> Result<PoseDescriptor> {
        let response = self.backend.generate_content(&self.model, request).await?;
        let text = response.text().ok_or(GenerationError::EmptyResponse)?;
        parse_descriptor(&text)
    }

    fn build_request(image: &ImagePayload) -> GenerateContentRequest {
        let properties: Map<String, Value> = PoseDescriptor::REGIONS
            .iter()
            .map(|name| (name.to_string(), json!({ "type": "STRING" })))
            .collect();
        let schema = json!({
            "type": "OBJECT",
            "properties": properties,
            "required": PoseDescriptor::REGIONS,
        });

        GenerateContentRequest::user(vec![Part::text(POSE_ANALYSIS_PROMPT), Part::image(image)])
            .with_config(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema),
                response_modalities: None,
            })
    }
}

/// Models sometimes wrap structured output in a markdown fence even when a
/// JSON mime type was requested.
fn parse_descriptor(text: &str) -> Result<PoseDescriptor> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}
