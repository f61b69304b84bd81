//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests: onboarding,
//! profile reads, lesson delivery, quiz issuance and grading, and personal
//! document uploads. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use evocode_core::judge::DEFAULT_LANGUAGE_ID;
use evocode_core::mastery::MasteryState;
use evocode_core::progression::next_unverified_claimed_topic;
use evocode_core::quiz::QuizKind;
use evocode_core::tutor::LessonOutcome;
use evocode_core::{CoreError, graph::Topic};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    db::UserRecord,
    models::{
        ErrorResponse, LessonResponse, OnboardRequest, OnboardingStatusResponse, QuizResponse,
        QuizResultResponse, QuizSubmission, UploadDocumentRequest, UploadDocumentResponse,
        UserProfile,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    Upstream(String),
    Timeout(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Upstream(message) => {
                error!("Upstream failure: {message}");
                (
                    StatusCode::BAD_GATEWAY,
                    "An upstream service failed.".to_string(),
                )
            }
            ApiError::Timeout(message) => {
                error!("Upstream timeout: {message}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "An upstream service timed out.".to_string(),
                )
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(message) => ApiError::NotFound(message),
            CoreError::Conflict(message) => ApiError::Conflict(message),
            CoreError::Validation(message) => ApiError::Unprocessable(message),
            CoreError::Upstream(message) => ApiError::Upstream(message),
            CoreError::Timeout(message) => ApiError::Timeout(message),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalServerError(err)
    }
}

/// Loads a learner or answers 404.
async fn require_user(state: &AppState, user_id: &str) -> Result<UserRecord, ApiError> {
    state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".to_string()))
}

/// Resolves a topic id against the graph or answers 404.
fn require_topic<'a>(state: &'a AppState, topic_id: &str) -> Result<&'a Topic, ApiError> {
    state
        .graph
        .get(topic_id)
        .ok_or_else(|| ApiError::NotFound(format!("Topic '{topic_id}' not found.")))
}

/// Returns the cached quiz for (learner, topic, kind), generating and
/// storing a fresh one on a miss.
async fn cached_or_generated_quiz(
    state: &AppState,
    user: &UserRecord,
    topic: &Topic,
    kind: QuizKind,
) -> Result<evocode_core::quiz::MixedQuiz, ApiError> {
    if let Some(quiz) = state.db.get_quiz(&user.user_id, &topic.id, kind).await? {
        return Ok(quiz);
    }
    let quiz = state
        .tutor
        .generator()
        .generate_quiz(topic, &user.learning_profile.0)
        .await;
    state
        .db
        .put_quiz(
            &user.user_id,
            &topic.id,
            kind,
            &quiz,
            state.config.quiz_ttl_secs,
        )
        .await?;
    Ok(quiz)
}

/// Onboard a new learner.
#[utoipa::path(
    post,
    path = "/onboard",
    request_body = OnboardRequest,
    responses(
        (status = 201, description = "Learner onboarded", body = UserProfile),
        (status = 409, description = "User already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn onboard(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OnboardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }

    // Claims the graph does not know can never be verified, so they are
    // dropped here rather than left to stall onboarding forever.
    let mut claimed = BTreeSet::new();
    for topic_id in &payload.claimed_topics {
        if state.graph.contains(topic_id) {
            claimed.insert(topic_id.clone());
        } else {
            warn!(user_id = %payload.user_id, %topic_id, "dropping unknown claimed topic");
        }
    }

    let mastery = MasteryState::new(claimed);
    let onboarding_complete = mastery.onboarding_complete();

    let inserted = state
        .db
        .create_user(
            &payload.user_id,
            &payload.user_name,
            &payload.goal,
            &payload.learning_profile,
            &mastery,
            onboarding_complete,
        )
        .await?;
    if !inserted {
        return Err(ApiError::Conflict(
            "User with this ID already exists.".to_string(),
        ));
    }

    info!(user_id = %payload.user_id, user_name = %payload.user_name, "learner onboarded");
    let profile = UserProfile {
        user_id: payload.user_id,
        user_name: payload.user_name,
        goal: payload.goal,
        learning_profile: payload.learning_profile,
        mastery,
        onboarding_complete,
    };
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Get a learner profile by id.
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    responses(
        (status = 200, description = "Learner profile", body = UserProfile),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn get_user_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = require_user(&state, &user_id).await?;
    Ok(Json(user.into()))
}

/// Report how far verification of claimed topics has progressed.
#[utoipa::path(
    get,
    path = "/users/{user_id}/onboarding",
    responses(
        (status = 200, description = "Onboarding progress", body = OnboardingStatusResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn onboarding_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<OnboardingStatusResponse>, ApiError> {
    let user = require_user(&state, &user_id).await?;
    let mastery = &user.mastery.0;
    Ok(Json(OnboardingStatusResponse {
        complete: user.onboarding_complete,
        claimed_count: mastery.claimed.len(),
        verified_count: mastery.verified.len(),
        struggling_count: mastery.struggling.len(),
        remaining: mastery.unverified_claims().into_iter().collect(),
    }))
}

/// Generate the learner's next lesson.
#[utoipa::path(
    get,
    path = "/users/{user_id}/lesson",
    responses(
        (status = 200, description = "The next lesson, or a completion message", body = LessonResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn get_lesson(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<LessonResponse>, ApiError> {
    let user = require_user(&state, &user_id).await?;

    let outcome = state
        .tutor
        .next_lesson(&user.mastery.0, &user.learning_profile.0, &user.user_id)
        .await;
    let response = match outcome {
        LessonOutcome::Lesson(lesson) => LessonResponse {
            topic_id: lesson.topic_id,
            topic_title: lesson.topic_title,
            content: lesson.content,
        },
        LessonOutcome::Completed => LessonResponse {
            topic_id: "complete".to_string(),
            topic_title: "Learning goal complete".to_string(),
            content: "Congratulations! You have completed your learning goal.".to_string(),
        },
    };
    Ok(Json(response))
}

/// Get the verification quiz for the next unverified claimed topic.
#[utoipa::path(
    get,
    path = "/users/{user_id}/quizzes/verification",
    responses(
        (status = 200, description = "The verification quiz to take next", body = QuizResponse),
        (status = 404, description = "User not found, or nothing left to verify", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn get_verification_quiz(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<QuizResponse>, ApiError> {
    let user = require_user(&state, &user_id).await?;
    let mastery = &user.mastery.0;

    let topic = next_unverified_claimed_topic(
        &state.graph,
        &mastery.claimed,
        &mastery.verified,
        &mastery.struggling,
    )
    .ok_or_else(|| {
        ApiError::NotFound("Nothing left to verify; onboarding is complete.".to_string())
    })?;

    let quiz = cached_or_generated_quiz(&state, &user, topic, QuizKind::Verification).await?;
    Ok(Json(QuizResponse {
        kind: QuizKind::Verification,
        quiz: quiz.view(),
    }))
}

/// Submit answers for a verification quiz.
#[utoipa::path(
    post,
    path = "/users/{user_id}/quizzes/verification",
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Graded result", body = QuizResultResponse),
        (status = 404, description = "User, topic, or active quiz not found", body = ErrorResponse),
        (status = 422, description = "Topic was not claimed at onboarding", body = ErrorResponse),
        (status = 502, description = "Upstream service failed", body = ErrorResponse),
        (status = 504, description = "Code execution timed out", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn submit_verification_quiz(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(submission): Json<QuizSubmission>,
) -> Result<Json<QuizResultResponse>, ApiError> {
    let user = require_user(&state, &user_id).await?;
    let topic = require_topic(&state, &submission.topic_id)?;

    let mut mastery = user.mastery.0.clone();
    if !mastery.claimed.contains(&topic.id) {
        return Err(ApiError::Unprocessable(format!(
            "Topic '{}' was not claimed at onboarding.",
            topic.id
        )));
    }

    let quiz = state
        .db
        .get_quiz(&user.user_id, &topic.id, QuizKind::Verification)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("No active verification quiz; request one first.".to_string())
        })?;

    let report = state
        .grader
        .grade(
            &quiz,
            topic,
            &submission.answers,
            &submission.source_code,
            submission.language_id.unwrap_or(DEFAULT_LANGUAGE_ID),
        )
        .await?;

    mastery.record_verification(&topic.id, report.passed);
    let onboarding_complete = mastery.onboarding_complete();
    state
        .db
        .update_mastery(&user.user_id, &mastery, onboarding_complete)
        .await?;

    Ok(Json(QuizResultResponse::from_report(
        report,
        onboarding_complete,
    )))
}

/// Get the post-lesson quiz for a topic.
#[utoipa::path(
    get,
    path = "/users/{user_id}/quizzes/lesson/{topic_id}",
    responses(
        (status = 200, description = "The post-lesson quiz", body = QuizResponse),
        (status = 404, description = "User or topic not found", body = ErrorResponse)
    ),
    params(
        ("user_id" = String, Path, description = "Learner ID"),
        ("topic_id" = String, Path, description = "Topic ID")
    )
)]
pub async fn get_lesson_quiz(
    State(state): State<Arc<AppState>>,
    Path((user_id, topic_id)): Path<(String, String)>,
) -> Result<Json<QuizResponse>, ApiError> {
    let user = require_user(&state, &user_id).await?;
    let topic = require_topic(&state, &topic_id)?;

    let quiz = cached_or_generated_quiz(&state, &user, topic, QuizKind::Lesson).await?;
    Ok(Json(QuizResponse {
        kind: QuizKind::Lesson,
        quiz: quiz.view(),
    }))
}

/// Submit answers for a post-lesson quiz.
#[utoipa::path(
    post,
    path = "/users/{user_id}/quizzes/lesson",
    request_body = QuizSubmission,
    responses(
        (status = 200, description = "Graded result", body = QuizResultResponse),
        (status = 404, description = "User, topic, or active quiz not found", body = ErrorResponse),
        (status = 502, description = "Upstream service failed", body = ErrorResponse),
        (status = 504, description = "Code execution timed out", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn submit_lesson_quiz(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(submission): Json<QuizSubmission>,
) -> Result<Json<QuizResultResponse>, ApiError> {
    let user = require_user(&state, &user_id).await?;
    let topic = require_topic(&state, &submission.topic_id)?;

    let quiz = state
        .db
        .get_quiz(&user.user_id, &topic.id, QuizKind::Lesson)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("No active quiz for this topic; request one first.".to_string())
        })?;

    let report = state
        .grader
        .grade(
            &quiz,
            topic,
            &submission.answers,
            &submission.source_code,
            submission.language_id.unwrap_or(DEFAULT_LANGUAGE_ID),
        )
        .await?;

    let mut mastery = user.mastery.0.clone();
    mastery.record_lesson_outcome(&topic.id, report.passed);
    let onboarding_complete = mastery.onboarding_complete();
    state
        .db
        .update_mastery(&user.user_id, &mastery, onboarding_complete)
        .await?;

    Ok(Json(QuizResultResponse::from_report(
        report,
        onboarding_complete,
    )))
}

/// Upload a personal study document for retrieval-augmented lessons.
#[utoipa::path(
    post,
    path = "/users/{user_id}/documents",
    request_body = UploadDocumentRequest,
    responses(
        (status = 201, description = "Document ingested", body = UploadDocumentResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 422, description = "Unsupported or empty document", body = ErrorResponse),
        (status = 502, description = "Upstream service failed", body = ErrorResponse)
    ),
    params(("user_id" = String, Path, description = "Learner ID"))
)]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<UploadDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &user_id).await?;

    let chunks_stored = state
        .ingestor
        .ingest(&user.user_id, &payload.filename, &payload.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadDocumentResponse {
            filename: payload.filename,
            chunks_stored,
        }),
    ))
}
