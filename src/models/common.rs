use serde::{Deserialize, Serialize};

/// A base64-encoded image as it travels through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Entry contract of the function: the photo to transform and the image
/// whose pose should be copied onto it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseTransferRequest {
    pub user_image: ImagePayload,
    pub pose_image: ImagePayload,
}
