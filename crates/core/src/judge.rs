//! Code execution through the Judge0 service.
//!
//! Submissions are posted asynchronously and polled: at most
//! [`MAX_POLL_ATTEMPTS`] probes with [`POLL_INTERVAL`] spacing, after which
//! grading reports a timeout. Judge0 status ids 1 ("In Queue") and 2
//! ("Processing") mean keep polling; 3 is "Accepted"; anything above 3 is a
//! rejection whose detail lives in `stderr` or `compile_output`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Judge0's language id for Python 3, the default submission language.
pub const DEFAULT_LANGUAGE_ID: i64 = 71;

pub const MAX_POLL_ATTEMPTS: u32 = 10;
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const ACCEPTED_STATUS_ID: i64 = 3;

/// Outcome of running a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub accepted: bool,
    /// Judge0's human-readable status description, e.g. "Accepted" or
    /// "Runtime Error (NZEC)".
    pub status: String,
    pub stdout: Option<String>,
    pub error: Option<String>,
}

/// Runs learner code and reports the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, source_code: String, language_id: i64) -> Result<Execution>;
}

/// `CodeExecutor` backed by the Judge0 CE API behind RapidAPI.
pub struct Judge0Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_host: String,
    max_polls: u32,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct SubmissionRequest<'a> {
    source_code: &'a str,
    language_id: i64,
}

#[derive(Deserialize)]
struct SubmissionToken {
    token: Option<String>,
}

#[derive(Deserialize)]
struct SubmissionStatus {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct SubmissionResult {
    status: Option<SubmissionStatus>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
}

impl SubmissionResult {
    /// Maps a finished Judge0 result to an [`Execution`]; `None` while the
    /// submission is still queued or processing.
    fn into_execution(self) -> Option<Execution> {
        let status = self.status?;
        if status.id <= 2 {
            return None;
        }
        Some(Execution {
            accepted: status.id == ACCEPTED_STATUS_ID,
            status: status.description,
            stdout: self.stdout,
            error: self.stderr.or(self.compile_output),
        })
    }
}

impl Judge0Client {
    pub fn new(base_url: String, api_key: String, api_host: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_host,
            max_polls: MAX_POLL_ATTEMPTS,
            poll_interval: POLL_INTERVAL,
        }
    }

    fn headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
    }
}

#[async_trait]
impl CodeExecutor for Judge0Client {
    async fn execute(&self, source_code: String, language_id: i64) -> Result<Execution> {
        let submit_url = format!(
            "{}/submissions?base64_encoded=false&wait=false",
            self.base_url
        );
        let response = self
            .headers(self.http.post(&submit_url))
            .json(&SubmissionRequest {
                source_code: &source_code,
                language_id,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(CoreError::Upstream(format!(
                "code execution submit returned {status}"
            )));
        }
        let token = response
            .json::<SubmissionToken>()
            .await
            .map_err(|e| CoreError::Upstream(format!("malformed submit response: {e}")))?
            .token
            .ok_or_else(|| {
                CoreError::Upstream("code execution returned no submission token".to_string())
            })?;
        debug!(%token, language_id, "submission queued");

        let poll_url = format!(
            "{}/submissions/{token}?base64_encoded=false",
            self.base_url
        );
        for _ in 0..self.max_polls {
            let result: SubmissionResult = self
                .headers(self.http.get(&poll_url))
                .send()
                .await?
                .json()
                .await
                .map_err(|e| CoreError::Upstream(format!("malformed poll response: {e}")))?;

            if let Some(execution) = result.into_execution() {
                debug!(status = %execution.status, accepted = execution.accepted, "submission finished");
                return Ok(execution);
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(CoreError::Timeout("code execution grading timed out".to_string()))
    }
}
