use serde::Serialize;

use super::PoseDescriptor;

/// Terminal result handed back to the caller. Built only through
/// [`GenerationOutcome::succeeded`] or [`GenerationOutcome::failed`], so
/// exactly one of the two branches is ever populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose_data: Option<PoseDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationOutcome {
    pub fn succeeded(generated_image: String, pose: PoseDescriptor) -> Self {
        Self {
            success: true,
            generated_image: Some(generated_image),
            pose_description: Some(pose.summary()),
            pose_data: Some(pose),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            generated_image: None,
            pose_description: None,
            pose_data: None,
            error: Some(error.into()),
        }
    }

    pub fn status(&self) -> &'static str {
        if self.success {
            "success"
        } else {
            "error"
        }
    }
}
