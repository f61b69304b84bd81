//! API Models
//!
//! This module defines the request and response bodies of the REST API and
//! their `utoipa` schemas. The nested domain types (learning profile,
//! mastery record, quiz views) come from `evocode-core` and are exposed as
//! opaque objects in the OpenAPI document.

use evocode_core::grader::GradeReport;
use evocode_core::mastery::MasteryState;
use evocode_core::profile::LearningProfile;
use evocode_core::quiz::{MixedQuizView, QuizKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::UserRecord;

/// A learner profile as returned by the API.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct UserProfile {
    #[schema(example = "user-12345")]
    pub user_id: String,
    #[schema(example = "Alex")]
    pub user_name: String,
    #[schema(example = "Python Data Structures")]
    pub goal: String,
    #[schema(value_type = Object)]
    pub learning_profile: LearningProfile,
    #[schema(value_type = Object)]
    pub mastery: MasteryState,
    pub onboarding_complete: bool,
}

impl From<UserRecord> for UserProfile {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.user_id,
            user_name: record.user_name,
            goal: record.goal,
            learning_profile: record.learning_profile.0,
            mastery: record.mastery.0,
            onboarding_complete: record.onboarding_complete,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct OnboardRequest {
    #[schema(example = "user-12345")]
    pub user_id: String,
    #[schema(example = "Alex")]
    pub user_name: String,
    #[schema(example = "Python Data Structures")]
    pub goal: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub learning_profile: LearningProfile,
    /// Topic ids the learner claims to already know.
    #[serde(default)]
    pub claimed_topics: Vec<String>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct OnboardingStatusResponse {
    pub complete: bool,
    pub claimed_count: usize,
    pub verified_count: usize,
    pub struggling_count: usize,
    /// Claimed topic ids still awaiting a verification quiz.
    pub remaining: Vec<String>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct LessonResponse {
    #[schema(example = "lists")]
    pub topic_id: String,
    #[schema(example = "Lists")]
    pub topic_title: String,
    /// The markdown content of the lesson.
    pub content: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct QuizResponse {
    #[schema(value_type = String, example = "verification")]
    pub kind: QuizKind,
    #[schema(value_type = Object)]
    pub quiz: MixedQuizView,
}

/// A learner's answers to a mixed quiz.
#[derive(Deserialize, ToSchema, Debug)]
pub struct QuizSubmission {
    #[schema(example = "lists")]
    pub topic_id: String,
    /// Chosen option index per multiple-choice question, in order.
    pub answers: Vec<usize>,
    pub source_code: String,
    /// Judge0 language id; defaults to Python 3.
    pub language_id: Option<i64>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct QuizResultResponse {
    pub passed: bool,
    pub mcq_score: usize,
    pub mcq_passed: bool,
    pub coding_passed: bool,
    pub coding_feedback: String,
    /// The concept a failed run points at, when one could be diagnosed.
    pub misconception: Option<String>,
    pub onboarding_complete: bool,
}

impl QuizResultResponse {
    pub fn from_report(report: GradeReport, onboarding_complete: bool) -> Self {
        Self {
            passed: report.passed,
            mcq_score: report.mcq_score,
            mcq_passed: report.mcq_passed,
            coding_passed: report.coding_passed,
            coding_feedback: report.coding_feedback,
            misconception: report.misconception,
            onboarding_complete,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct UploadDocumentRequest {
    #[schema(example = "notes.md")]
    pub filename: String,
    /// The document text.
    pub content: String,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct UploadDocumentResponse {
    pub filename: String,
    pub chunks_stored: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
