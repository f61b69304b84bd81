//! Two-stage quiz grading.
//!
//! Stage one scores the multiple-choice questions locally. Stage two runs
//! the coding submission through the execution judge; only an accepted run
//! is handed to the AI solution validator, while a rejected run fails the
//! coding question immediately with the execution error as feedback. When a
//! rejected run carries an error message, the misconception diagnosis asks
//! the LLM which of the topic's concepts the learner is likely
//! misunderstanding.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::graph::Topic;
use crate::judge::CodeExecutor;
use crate::llm::{ChatClient, extract_json};
use crate::prompts::{self, Prompts};
use crate::quiz::{MCQ_PASS_THRESHOLD, MixedQuiz, score_mcq};

const VALIDATOR_SYSTEM: &str =
    "You are a strict grader. Always answer with the requested JSON object.";

/// The graded outcome of a mixed-quiz submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    pub mcq_score: usize,
    pub mcq_passed: bool,
    pub coding_passed: bool,
    /// Overall verdict: both the MCQ stage and the coding stage passed.
    pub passed: bool,
    pub coding_feedback: String,
    /// The topic concept the learner most likely misunderstands, when a
    /// failed execution could be diagnosed.
    pub misconception: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SolutionVerdict {
    is_correct: bool,
    #[serde(default)]
    feedback: String,
}

/// Grades mixed-quiz submissions.
pub struct QuizGrader {
    executor: Arc<dyn CodeExecutor>,
    validator: Arc<dyn ChatClient>,
    prompts: Arc<Prompts>,
}

impl QuizGrader {
    pub fn new(
        executor: Arc<dyn CodeExecutor>,
        validator: Arc<dyn ChatClient>,
        prompts: Arc<Prompts>,
    ) -> Self {
        Self {
            executor,
            validator,
            prompts,
        }
    }

    /// Grades a submission against the stored quiz.
    ///
    /// Execution-judge errors (upstream failure, polling timeout) propagate;
    /// there is no meaningful fallback verdict for ungraded code.
    pub async fn grade(
        &self,
        quiz: &MixedQuiz,
        topic: &Topic,
        answers: &[usize],
        source_code: &str,
        language_id: i64,
    ) -> Result<GradeReport> {
        let mcq_score = score_mcq(quiz, answers);
        let mcq_passed = mcq_score >= MCQ_PASS_THRESHOLD;

        let execution = self
            .executor
            .execute(source_code.to_string(), language_id)
            .await?;

        let (coding_passed, coding_feedback, misconception) = if execution.accepted {
            let actual = execution.stdout.unwrap_or_default();
            let (passed, feedback) = self.validate_solution(quiz, source_code, &actual).await;
            (passed, feedback, None)
        } else {
            let detail = execution
                .error
                .unwrap_or_else(|| execution.status.clone());
            let misconception = self
                .diagnose_misconception(topic, source_code, &detail)
                .await;
            (false, detail, misconception)
        };

        let passed = mcq_passed && coding_passed;
        info!(
            topic = %quiz.topic_id,
            mcq_score,
            mcq_passed,
            coding_passed,
            passed,
            "submission graded"
        );
        Ok(GradeReport {
            mcq_score,
            mcq_passed,
            coding_passed,
            passed,
            coding_feedback,
            misconception,
        })
    }

    /// AI semantic validation of an accepted run, with a literal
    /// output-equality fallback when the validator fails or returns an
    /// unusable verdict.
    async fn validate_solution(
        &self,
        quiz: &MixedQuiz,
        source_code: &str,
        actual_output: &str,
    ) -> (bool, String) {
        let coding = &quiz.coding;
        let criteria = if coding.validation_criteria.is_empty() {
            "- produces the expected output".to_string()
        } else {
            coding
                .validation_criteria
                .iter()
                .map(|c| format!("- {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = self.prompts.render(
            prompts::VALIDATE_SOLUTION_KEY,
            &[
                ("question", &coding.question),
                ("expected_output", &coding.expected_output),
                ("student_code", source_code),
                ("actual_output", actual_output),
                ("validation_criteria", &criteria),
            ],
        );

        let verdict = match self
            .validator
            .complete(VALIDATOR_SYSTEM.to_string(), prompt)
            .await
        {
            Ok(reply) => extract_json(&reply).and_then(|value| {
                serde_json::from_value::<SolutionVerdict>(value).map_err(|e| {
                    crate::error::CoreError::Validation(format!("bad solution verdict: {e}"))
                })
            }),
            Err(err) => Err(err),
        };

        match verdict {
            Ok(verdict) => (verdict.is_correct, verdict.feedback),
            Err(err) => {
                warn!(error = %err, "solution validation failed, comparing output literally");
                let matches = actual_output.trim() == coding.expected_output.trim();
                let feedback = if matches {
                    "Basic validation: Correct output".to_string()
                } else {
                    "Basic validation: Output mismatch".to_string()
                };
                (matches, feedback)
            }
        }
    }

    /// Asks the LLM which of the topic's concepts a failed run points at.
    /// Answers outside the concept list, and any LLM failure, yield `None`.
    async fn diagnose_misconception(
        &self,
        topic: &Topic,
        source_code: &str,
        error_message: &str,
    ) -> Option<String> {
        if topic.concepts.is_empty() {
            return None;
        }
        let prompt = self.prompts.render(
            prompts::DIAGNOSE_KEY,
            &[
                ("topic", &topic.title),
                ("source_code", source_code),
                ("error_message", error_message),
                ("concepts", &topic.concepts.join(", ")),
            ],
        );
        let reply = match self
            .validator
            .complete(VALIDATOR_SYSTEM.to_string(), prompt)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "misconception diagnosis failed");
                return None;
            }
        };
        let cleaned = reply.trim().trim_matches(['\'', '"']).to_string();
        if topic.concepts.iter().any(|c| c == &cleaned) {
            Some(cleaned)
        } else {
            None
        }
    }
}
