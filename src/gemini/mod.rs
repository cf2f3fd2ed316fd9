pub mod backend;
pub mod image_client;
pub mod pose_client;

use std::sync::Arc;

use crate::{
    config::GeminiConfig,
    error::Result,
    models::{ImagePayload, PoseDescriptor},
    retry::RetryPolicy,
};

pub use backend::{GeminiBackend, GenerationBackend};
pub use image_client::ImageClient;
pub use pose_client::PoseClient;

/// The two generation calls of the pipeline, sharing one backend and one
/// retry policy.
#[derive(Clone)]
pub struct GeminiClient {
    pose_client: PoseClient,
    image_client: ImageClient,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let backend = Arc::new(GeminiBackend::new(config)?);
        Ok(Self::with_backend(backend, config, RetryPolicy::default()))
    }

    /// Builds the client over any backend; the retry policy is fixed for the
    /// lifetime of the client.
    pub fn with_backend(
        backend: Arc<dyn GenerationBackend>,
        config: &GeminiConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            pose_client: PoseClient::new(backend.clone(), config.analysis_model.clone(), retry),
            image_client: ImageClient::new(backend, config.image_model.clone(), retry),
        }
    }

    pub fn pose(&self) -> &PoseClient {
        &self.pose_client
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }

    pub async fn analyze_pose(&self, image: &ImagePayload) -> Result<PoseDescriptor> {
        self.pose_client.analyze(image).await
    }

    pub async fn generate_image(
        &self,
        source: &ImagePayload,
        reference: &ImagePayload,
        pose: &PoseDescriptor,
    ) -> Result<String> {
        self.image_client.generate(source, reference, pose).await
    }
}
