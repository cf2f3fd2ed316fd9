use async_trait::async_trait;
use reqwest::Client;

use crate::{
    config::GeminiConfig,
    error::{GenerationError, Result},
    models::{GenerateContentRequest, GenerateContentResponse},
};

/// Transport seam for the generation API. Any response shape beyond "has
/// text" / "has an image part" is left to the callers.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key.clone().unwrap_or_default();

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GenerationError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        log::debug!("Calling generateContent on model: {}", model);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                GenerationError::RequestError(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("Gemini returned {} for model {}: {}", status, model, error_text);
            return Err(GenerationError::ResponseError(format!(
                "Gemini returned {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GenerationError::ResponseError(format!("Undecodable response: {}", e)))
    }
}
