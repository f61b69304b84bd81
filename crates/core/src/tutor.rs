//! Learning-loop orchestration: pick the next topic, teach it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generator::ContentGenerator;
use crate::graph::TopicGraph;
use crate::mastery::MasteryState;
use crate::profile::LearningProfile;
use crate::progression::next_unlocked_topic;

/// A generated lesson for the learner's next topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub topic_id: String,
    pub topic_title: String,
    pub content: String,
}

/// What the learning loop produced: either the next lesson, or the signal
/// that every topic in the graph is mastered.
#[derive(Debug, Clone)]
pub enum LessonOutcome {
    Lesson(Lesson),
    Completed,
}

/// Runs a learner's session: topic selection followed by lesson generation.
pub struct Tutor {
    graph: Arc<TopicGraph>,
    generator: ContentGenerator,
}

impl Tutor {
    pub fn new(graph: Arc<TopicGraph>, generator: ContentGenerator) -> Self {
        Self { graph, generator }
    }

    pub fn generator(&self) -> &ContentGenerator {
        &self.generator
    }

    /// Selects the next unlocked topic (verified topics count as mastered)
    /// and composes a lesson for it.
    pub async fn next_lesson(
        &self,
        mastery: &MasteryState,
        profile: &LearningProfile,
        user_id: &str,
    ) -> LessonOutcome {
        let Some(topic) = next_unlocked_topic(&self.graph, &mastery.verified) else {
            info!(user_id, "all topics mastered");
            return LessonOutcome::Completed;
        };
        info!(user_id, topic = %topic.id, "next topic selected");

        let content = self.generator.compose_lesson(topic, profile, user_id).await;
        LessonOutcome::Lesson(Lesson {
            topic_id: topic.id.clone(),
            topic_title: topic.title.clone(),
            content,
        })
    }
}
