use serde::{Deserialize, Serialize};

/// Freeform annotation attached to a node and stored under
/// `/nodes/:id/technique`, separately from the node record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueNote {
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub steps: String,
}

impl TechniqueNote {
    pub fn new(video_url: impl Into<String>, steps: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            steps: steps.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.video_url.is_empty() && self.steps.is_empty()
    }
}
