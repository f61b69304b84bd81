//! Lesson and quiz generation.
//!
//! Lessons come from a retrieval-augmented generation pass followed by a
//! personalization review; the generate-review loop runs at most
//! [`MAX_REVIEW_ATTEMPTS`] times and keeps the last draft if every review
//! rejects. Quiz generation parses structured LLM output and falls back to
//! a deterministic templated quiz on any failure, so it never errors.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::graph::Topic;
use crate::llm::{ChatClient, extract_json};
use crate::profile::LearningProfile;
use crate::prompts::{self, Prompts};
use crate::quiz::{MixedQuiz, fallback_quiz};
use crate::retrieval::Retriever;

pub const MAX_REVIEW_ATTEMPTS: usize = 2;

/// Shown when every generation attempt fails outright.
pub const APOLOGY_LESSON: &str =
    "I'm sorry, I'm having trouble generating a lesson for you right now. Please try again later.";

const GENERATOR_SYSTEM: &str = "You are the content generator of an AI tutoring system.";
const REVIEWER_SYSTEM: &str =
    "You are a strict reviewer. Always answer with the requested JSON object.";

#[derive(Debug, Deserialize)]
struct ReviewVerdict {
    is_approved: bool,
    #[serde(default)]
    feedback: String,
}

/// Produces lesson content and quizzes for a topic and learner.
pub struct ContentGenerator {
    chat: Arc<dyn ChatClient>,
    retriever: Retriever,
    prompts: Arc<Prompts>,
}

impl ContentGenerator {
    pub fn new(chat: Arc<dyn ChatClient>, retriever: Retriever, prompts: Arc<Prompts>) -> Self {
        Self {
            chat,
            retriever,
            prompts,
        }
    }

    /// One retrieval-augmented generation pass.
    async fn generate_lesson(
        &self,
        topic: &Topic,
        profile: &LearningProfile,
        user_id: &str,
    ) -> Result<String> {
        let context = self.retriever.retrieve(&topic.title, Some(user_id)).await?;
        let context_text = if context.is_empty() {
            "(no reference material available)".to_string()
        } else {
            context.join("\n\n")
        };
        let prompt = self.prompts.render(
            prompts::LESSON_KEY,
            &[
                ("topic", &topic.title),
                ("context", &context_text),
                ("learning_style_tags", &profile.tags_line()),
            ],
        );
        self.chat
            .complete(GENERATOR_SYSTEM.to_string(), prompt)
            .await
    }

    /// Reviews a draft against the learner's preference tags.
    ///
    /// With no tags there is nothing to check, so the draft is approved
    /// without an LLM call. A reply that cannot be parsed counts as a
    /// rejection with fixed feedback.
    async fn review_lesson(&self, draft: &str, profile: &LearningProfile) -> (bool, String) {
        if profile.tags.is_empty() {
            return (true, "No specific preferences provided.".to_string());
        }
        let prompt = self.prompts.render(
            prompts::REVIEW_KEY,
            &[
                ("learning_tags", &profile.tags_line()),
                ("draft_lesson", draft),
            ],
        );
        let verdict = match self.chat.complete(REVIEWER_SYSTEM.to_string(), prompt).await {
            Ok(reply) => extract_json(&reply)
                .and_then(|value| {
                    serde_json::from_value::<ReviewVerdict>(value).map_err(|e| {
                        crate::error::CoreError::Validation(format!("bad review verdict: {e}"))
                    })
                }),
            Err(err) => Err(err),
        };
        match verdict {
            Ok(verdict) => (verdict.is_approved, verdict.feedback),
            Err(err) => {
                warn!(error = %err, "lesson review failed");
                (
                    false,
                    "There was an error parsing the validation response.".to_string(),
                )
            }
        }
    }

    /// The generate-then-review loop. Keeps the last draft when every
    /// review rejects; degrades to the apology lesson when no attempt
    /// produced a draft at all.
    pub async fn compose_lesson(
        &self,
        topic: &Topic,
        profile: &LearningProfile,
        user_id: &str,
    ) -> String {
        let mut last_draft = None;
        for attempt in 1..=MAX_REVIEW_ATTEMPTS {
            let draft = match self.generate_lesson(topic, profile, user_id).await {
                Ok(draft) => draft,
                Err(err) => {
                    warn!(attempt, topic = %topic.id, error = %err, "lesson generation failed");
                    continue;
                }
            };
            let (approved, feedback) = self.review_lesson(&draft, profile).await;
            last_draft = Some(draft);
            if approved {
                info!(attempt, topic = %topic.id, "lesson approved");
                break;
            }
            info!(attempt, topic = %topic.id, %feedback, "lesson rejected, retrying");
        }
        last_draft.unwrap_or_else(|| APOLOGY_LESSON.to_string())
    }

    /// Generates a mixed quiz, degrading to the deterministic fallback quiz
    /// when the LLM fails or returns an unusable shape.
    pub async fn generate_quiz(&self, topic: &Topic, profile: &LearningProfile) -> MixedQuiz {
        let concepts = if topic.concepts.is_empty() {
            "(none listed)".to_string()
        } else {
            topic.concepts.join(", ")
        };
        let prompt = self.prompts.render(
            prompts::QUIZ_KEY,
            &[
                ("topic", &topic.title),
                ("concepts", &concepts),
                ("learning_style_tags", &profile.tags_line()),
            ],
        );
        let quiz = match self.chat.complete(GENERATOR_SYSTEM.to_string(), prompt).await {
            Ok(reply) => extract_json(&reply)
                .and_then(|value| MixedQuiz::from_llm_json(topic, value)),
            Err(err) => Err(err),
        };
        match quiz {
            Ok(quiz) => quiz,
            Err(err) => {
                warn!(topic = %topic.id, error = %err, "quiz generation failed, using fallback");
                fallback_quiz(topic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::llm::MockChatClient;
    use crate::retrieval::{MockEmbedder, MockVectorStore, Retriever};

    fn topic() -> Topic {
        Topic {
            id: "lists".to_string(),
            title: "Lists".to_string(),
            category: "Data Structures".to_string(),
            prerequisites: vec![],
            concepts: vec!["indexing".to_string()],
        }
    }

    fn stub_retriever() -> Retriever {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![vec![0.0]]));
        let mut store = MockVectorStore::new();
        store.expect_search().returning(|_, _, _| Ok(Vec::new()));
        Retriever::new(
            Arc::new(embedder),
            Arc::new(store),
            "lesson-corpus".to_string(),
        )
    }

    fn generator(chat: MockChatClient) -> ContentGenerator {
        ContentGenerator::new(
            Arc::new(chat),
            stub_retriever(),
            Arc::new(Prompts::builtin()),
        )
    }

    #[tokio::test]
    async fn no_tags_approves_first_draft_without_review_call() {
        let mut chat = MockChatClient::new();
        // One generation call, zero review calls.
        chat.expect_complete()
            .times(1)
            .returning(|_, _| Ok("# Lists\nA lesson.".to_string()));

        let lesson = generator(chat)
            .compose_lesson(&topic(), &LearningProfile::default(), "alex")
            .await;
        assert_eq!(lesson, "# Lists\nA lesson.");
    }

    #[tokio::test]
    async fn rejected_draft_is_regenerated_once() {
        let mut chat = MockChatClient::new();
        let mut replies = vec![
            "draft one".to_string(),
            r#"{"is_approved": false, "feedback": "no analogy"}"#.to_string(),
            "draft two".to_string(),
            r#"{"is_approved": true, "feedback": "good"}"#.to_string(),
        ]
        .into_iter();
        chat.expect_complete()
            .times(4)
            .returning(move |_, _| Ok(replies.next().unwrap()));

        let profile = LearningProfile::new(vec!["use_analogy".to_string()]);
        let lesson = generator(chat).compose_lesson(&topic(), &profile, "alex").await;
        assert_eq!(lesson, "draft two");
    }

    #[tokio::test]
    async fn both_rejections_keep_the_last_draft() {
        let mut chat = MockChatClient::new();
        let mut replies = vec![
            "draft one".to_string(),
            r#"{"is_approved": false, "feedback": "nope"}"#.to_string(),
            "draft two".to_string(),
            r#"{"is_approved": false, "feedback": "still no"}"#.to_string(),
        ]
        .into_iter();
        chat.expect_complete()
            .times(4)
            .returning(move |_, _| Ok(replies.next().unwrap()));

        let profile = LearningProfile::new(vec!["use_analogy".to_string()]);
        let lesson = generator(chat).compose_lesson(&topic(), &profile, "alex").await;
        assert_eq!(lesson, "draft two");
    }

    #[tokio::test]
    async fn generation_failures_fall_back_to_the_apology_lesson() {
        let mut chat = MockChatClient::new();
        chat.expect_complete()
            .times(MAX_REVIEW_ATTEMPTS)
            .returning(|_, _| Err(CoreError::Upstream("llm down".to_string())));

        let lesson = generator(chat)
            .compose_lesson(&topic(), &LearningProfile::default(), "alex")
            .await;
        assert_eq!(lesson, APOLOGY_LESSON);
    }

    #[tokio::test]
    async fn unparsable_review_counts_as_rejection() {
        let mut chat = MockChatClient::new();
        let mut replies = vec![
            "draft one".to_string(),
            "I cannot answer in JSON today.".to_string(),
            "draft two".to_string(),
            r#"{"is_approved": true, "feedback": ""}"#.to_string(),
        ]
        .into_iter();
        chat.expect_complete()
            .times(4)
            .returning(move |_, _| Ok(replies.next().unwrap()));

        let profile = LearningProfile::new(vec!["provide_code_first".to_string()]);
        let lesson = generator(chat).compose_lesson(&topic(), &profile, "alex").await;
        assert_eq!(lesson, "draft two");
    }

    #[tokio::test]
    async fn quiz_generation_parses_structured_output() {
        let quiz_json = serde_json::json!({
            "mcqs": [
                {"question": "q1", "options": ["a", "b"], "correct_index": 0},
                {"question": "q2", "options": ["a", "b"], "correct_index": 1},
                {"question": "q3", "options": ["a", "b"], "correct_index": 0}
            ],
            "coding": {"question": "print 3", "expected_output": "3"}
        })
        .to_string();
        let mut chat = MockChatClient::new();
        chat.expect_complete().times(1).returning(move |_, _| Ok(quiz_json.clone()));

        let quiz = generator(chat)
            .generate_quiz(&topic(), &LearningProfile::default())
            .await;
        assert_eq!(quiz.mcqs[1].correct_index, 1);
        assert_eq!(quiz.topic_id, "lists");
    }

    #[tokio::test]
    async fn malformed_quiz_output_uses_the_fallback() {
        let mut chat = MockChatClient::new();
        chat.expect_complete()
            .times(1)
            .returning(|_, _| Ok("{\"mcqs\": []}".to_string()));

        let quiz = generator(chat)
            .generate_quiz(&topic(), &LearningProfile::default())
            .await;
        assert_eq!(quiz.mcqs.len(), 3);
        assert!(quiz.coding.expected_output.contains("Lists"));
    }

    #[tokio::test]
    async fn llm_failure_uses_the_fallback_quiz() {
        let mut chat = MockChatClient::new();
        chat.expect_complete()
            .times(1)
            .returning(|_, _| Err(CoreError::Upstream("llm down".to_string())));

        let quiz = generator(chat)
            .generate_quiz(&topic(), &LearningProfile::default())
            .await;
        assert_eq!(quiz.topic_id, "lists");
        assert_eq!(quiz.mcqs.len(), 3);
    }
}
