use serde::{Deserialize, Serialize};

/// Per-region description of a body pose, produced by the analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseDescriptor {
    pub head: String,
    pub torso: String,
    pub left_arm: String,
    pub right_arm: String,
    pub left_leg: String,
    pub right_leg: String,
    pub overall: String,
}

impl PoseDescriptor {
    /// Field names as they appear on the wire, in description order.
    pub const REGIONS: [&'static str; 7] = [
        "head", "torso", "leftArm", "rightArm", "leftLeg", "rightLeg", "overall",
    ];

    pub fn regions(&self) -> [(&'static str, &str); 7] {
        [
            ("Head", &self.head),
            ("Torso", &self.torso),
            ("Left arm", &self.left_arm),
            ("Right arm", &self.right_arm),
            ("Left leg", &self.left_leg),
            ("Right leg", &self.right_leg),
            ("Overall", &self.overall),
        ]
    }

    /// All seven regions joined into one human-readable block.
    pub fn summary(&self) -> String {
        self.regions()
            .iter()
            .map(|(region, text)| format!("{}: {}", region, text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
