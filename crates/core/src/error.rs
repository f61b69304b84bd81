use thiserror::Error;

/// Error kinds produced by the tutoring core.
///
/// Each variant maps to one failure class the service layer knows how to
/// present: missing records, duplicate onboarding, malformed input or AI
/// output, external-service failures, and exhausted polling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("upstream service failure: {0}")]
    Upstream(String),
    #[error("timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CoreError::Timeout(err.to_string())
        } else {
            CoreError::Upstream(err.to_string())
        }
    }
}

impl From<async_openai::error::OpenAIError> for CoreError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        CoreError::Upstream(err.to_string())
    }
}
