use std::sync::Arc;

use crate::{
    error::{GenerationError, Result},
    gemini::GenerationBackend,
    models::{GenerateContentRequest, GenerationConfig, ImagePayload, Part, PoseDescriptor},
    retry::RetryPolicy,
};

const POSE_TRANSFER_PROMPT: &str = "Edit the SOURCE image so that its person adopts the pose \
described below. Rules:\n\
1. Keep the person's identity from the SOURCE image: face, hair, skin tone, body shape, clothing.\n\
2. Keep the SOURCE background, lighting and camera framing.\n\
3. Take the body pose and facial expression only from the POSE DESCRIPTION.\n\
4. The REFERENCE image only illustrates that pose. Ignore everything else in it: its person, \
clothes, background, text, watermarks and style.\n\
5. Output a single photorealistic image.";

#[derive(Clone)]
pub struct ImageClient {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    retry: RetryPolicy,
}

impl ImageClient {
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

    /// Returns the base64 data of the first image part in the response.
    pub async fn generate(
        &self,
        source: &ImagePayload,
        reference: &ImagePayload,
        pose: &PoseDescriptor,
    ) -> Result<String> {
        let request = Self::build_request(source, reference, pose)?;
        log::info!("Generating image with model: {}", self.model);

        self.retry
            .execute("generate_image", |_| self.generate_once(&request))
            .await
    }

    async fn generate_once(&self, request: &GenerateContentRequest) -> Result<String> {
        let response = self.backend.generate_content(&self.model, request).await?;
        response
            .first_image()
            .map(|image| image.data.clone())
            .ok_or(GenerationError::NoImageReturned)
    }

    fn build_request(
        source: &ImagePayload,
        reference: &ImagePayload,
        pose: &PoseDescriptor,
    ) -> Result<GenerateContentRequest> {
        let pose_json = serde_json::to_string_pretty(pose)
            .map_err(|e| GenerationError::SerializationError(e.to_string()))?;

        Ok(GenerateContentRequest::user(vec![
            Part::text(POSE_TRANSFER_PROMPT),
            Part::text(format!("POSE DESCRIPTION:\n{}", pose_json)),
            Part::text("SOURCE image:"),
            Part::image(source),
            Part::text("REFERENCE image:"),
            Part::image(reference),
        ])
        .with_config(GenerationConfig {
            response_mime_type: None,
            response_schema: None,
            response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
        }))
    }
}
