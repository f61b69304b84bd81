use serde::{Deserialize, Serialize};

/// The learner's preferred teaching style, represented by free-form tags
/// such as `provide_code_first` or `use_analogy`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearningProfile {
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LearningProfile {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }

    /// The tags as prompt text, with a stable phrase when none are set.
    pub fn tags_line(&self) -> String {
        if self.tags.is_empty() {
            "No specific style preference.".to_string()
        } else {
            self.tags.join(", ")
        }
    }
}
