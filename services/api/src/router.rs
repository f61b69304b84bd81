//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ErrorResponse, LessonResponse, OnboardRequest, OnboardingStatusResponse, QuizResponse,
        QuizResultResponse, QuizSubmission, UploadDocumentRequest, UploadDocumentResponse,
        UserProfile,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::onboard,
        handlers::get_user_profile,
        handlers::onboarding_status,
        handlers::get_lesson,
        handlers::get_verification_quiz,
        handlers::submit_verification_quiz,
        handlers::get_lesson_quiz,
        handlers::submit_lesson_quiz,
        handlers::upload_document,
    ),
    components(
        schemas(
            UserProfile,
            OnboardRequest,
            OnboardingStatusResponse,
            LessonResponse,
            QuizResponse,
            QuizSubmission,
            QuizResultResponse,
            UploadDocumentRequest,
            UploadDocumentResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "Evocode API", description = "Onboarding, lessons, and quiz grading for the Evocode tutoring system")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/onboard", post(handlers::onboard))
        .route("/users/{user_id}", get(handlers::get_user_profile))
        .route(
            "/users/{user_id}/onboarding",
            get(handlers::onboarding_status),
        )
        .route("/users/{user_id}/lesson", get(handlers::get_lesson))
        .route(
            "/users/{user_id}/quizzes/verification",
            get(handlers::get_verification_quiz).post(handlers::submit_verification_quiz),
        )
        .route(
            "/users/{user_id}/quizzes/lesson/{topic_id}",
            get(handlers::get_lesson_quiz),
        )
        .route(
            "/users/{user_id}/quizzes/lesson",
            post(handlers::submit_lesson_quiz),
        )
        .route(
            "/users/{user_id}/documents",
            post(handlers::upload_document),
        )
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI routes.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
