//! Mixed quizzes: 3 multiple-choice questions plus 1 coding question.
//!
//! Quizzes are produced by the LLM (with a deterministic fallback when
//! generation or parsing fails), stored server-side for grading, and shown
//! to learners through a view that strips answers.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::graph::Topic;

pub const MCQ_COUNT: usize = 3;
/// A learner passes the multiple-choice stage with 2 of 3 correct.
pub const MCQ_PASS_THRESHOLD: usize = 2;

/// Which assessment a quiz belongs to. Verification quizzes test claimed
/// prior knowledge during onboarding; lesson quizzes follow a taught lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    Verification,
    Lesson,
}

impl QuizKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizKind::Verification => "verification",
            QuizKind::Lesson => "lesson",
        }
    }
}

impl std::fmt::Display for QuizKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McqQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingQuestion {
    pub question: String,
    #[serde(default)]
    pub starter_code: String,
    pub expected_output: String,
    #[serde(default)]
    pub validation_criteria: Vec<String>,
}

/// The full quiz as stored for grading, answers included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedQuiz {
    pub topic_id: String,
    pub topic_title: String,
    pub mcqs: Vec<McqQuestion>,
    pub coding: CodingQuestion,
}

/// What the learner sees: questions without the stored answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McqQuestionView {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingQuestionView {
    pub question: String,
    pub starter_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedQuizView {
    pub topic_id: String,
    pub topic_title: String,
    pub mcqs: Vec<McqQuestionView>,
    pub coding: CodingQuestionView,
}

#[derive(Debug, Deserialize)]
struct RawQuiz {
    mcqs: Vec<McqQuestion>,
    coding: CodingQuestion,
}

impl MixedQuiz {
    /// Validates and adopts a quiz produced by the LLM.
    ///
    /// The shape contract: exactly 3 multiple-choice questions, each with at
    /// least two options and an in-range correct index, and exactly one
    /// coding question with a non-empty expected output.
    pub fn from_llm_json(topic: &Topic, value: serde_json::Value) -> Result<Self> {
        let raw: RawQuiz = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("malformed quiz payload: {e}")))?;

        if raw.mcqs.len() != MCQ_COUNT {
            return Err(CoreError::Validation(format!(
                "expected {MCQ_COUNT} multiple-choice questions, got {}",
                raw.mcqs.len()
            )));
        }
        for (i, mcq) in raw.mcqs.iter().enumerate() {
            if mcq.options.len() < 2 {
                return Err(CoreError::Validation(format!(
                    "question {} has fewer than two options",
                    i + 1
                )));
            }
            if mcq.correct_index >= mcq.options.len() {
                return Err(CoreError::Validation(format!(
                    "question {} has an out-of-range correct index",
                    i + 1
                )));
            }
        }
        if raw.coding.expected_output.trim().is_empty() {
            return Err(CoreError::Validation(
                "coding question has no expected output".to_string(),
            ));
        }

        Ok(Self {
            topic_id: topic.id.clone(),
            topic_title: topic.title.clone(),
            mcqs: raw.mcqs,
            coding: raw.coding,
        })
    }

    /// The learner-facing view of this quiz, with answers stripped.
    pub fn view(&self) -> MixedQuizView {
        MixedQuizView {
            topic_id: self.topic_id.clone(),
            topic_title: self.topic_title.clone(),
            mcqs: self
                .mcqs
                .iter()
                .map(|m| McqQuestionView {
                    question: m.question.clone(),
                    options: m.options.clone(),
                })
                .collect(),
            coding: CodingQuestionView {
                question: self.coding.question.clone(),
                starter_code: self.coding.starter_code.clone(),
            },
        }
    }
}

/// Counts the positions where the submitted answer index equals the stored
/// correct index. Missing or extra submitted answers score nothing.
pub fn score_mcq(quiz: &MixedQuiz, answers: &[usize]) -> usize {
    quiz.mcqs
        .iter()
        .zip(answers.iter())
        .filter(|&(mcq, &answer)| answer == mcq.correct_index)
        .count()
}

/// Deterministic templated quiz used whenever generation fails or returns
/// something unusable.
pub fn fallback_quiz(topic: &Topic) -> MixedQuiz {
    let title = &topic.title;
    MixedQuiz {
        topic_id: topic.id.clone(),
        topic_title: title.clone(),
        mcqs: vec![
            McqQuestion {
                question: format!("Which statement best describes '{title}'?"),
                options: vec![
                    format!("A core programming topic covering {title}"),
                    "A hardware component".to_string(),
                    "A network protocol".to_string(),
                    "An operating system".to_string(),
                ],
                correct_index: 0,
            },
            McqQuestion {
                question: format!("When learning '{title}', what is the best first step?"),
                options: vec![
                    "Memorize unrelated trivia".to_string(),
                    format!("Practice small examples that use {title}"),
                    "Skip directly to advanced material".to_string(),
                    "Avoid writing any code".to_string(),
                ],
                correct_index: 1,
            },
            McqQuestion {
                question: format!("Why is '{title}' worth understanding?"),
                options: vec![
                    "It is never used in real programs".to_string(),
                    "It only matters for exams".to_string(),
                    format!("Many programs rely on {title} in practice"),
                    "It replaces the need to test code".to_string(),
                ],
                correct_index: 2,
            },
        ],
        coding: CodingQuestion {
            question: format!(
                "Write a program that prints exactly: I am learning {title}"
            ),
            starter_code: String::new(),
            expected_output: format!("I am learning {title}"),
            validation_criteria: vec![
                "The program prints the exact expected text".to_string(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic {
            id: "lists".to_string(),
            title: "Lists".to_string(),
            category: "Data Structures".to_string(),
            prerequisites: vec![],
            concepts: vec!["indexing".to_string()],
        }
    }

    fn quiz_with_answers(correct: [usize; 3]) -> MixedQuiz {
        MixedQuiz {
            topic_id: "lists".to_string(),
            topic_title: "Lists".to_string(),
            mcqs: correct
                .iter()
                .map(|&idx| McqQuestion {
                    question: "q".to_string(),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_index: idx,
                })
                .collect(),
            coding: CodingQuestion {
                question: "print something".to_string(),
                starter_code: String::new(),
                expected_output: "something".to_string(),
                validation_criteria: vec![],
            },
        }
    }

    #[test]
    fn scores_matching_positions() {
        let quiz = quiz_with_answers([0, 1, 0]);
        assert_eq!(score_mcq(&quiz, &[0, 1, 2]), 2);
        assert!(score_mcq(&quiz, &[0, 1, 2]) >= MCQ_PASS_THRESHOLD);
    }

    #[test]
    fn short_or_long_submissions_score_only_aligned_positions() {
        let quiz = quiz_with_answers([0, 1, 2]);
        assert_eq!(score_mcq(&quiz, &[0]), 1);
        assert_eq!(score_mcq(&quiz, &[]), 0);
        assert_eq!(score_mcq(&quiz, &[0, 1, 2, 3, 3]), 3);
    }

    #[test]
    fn accepts_well_formed_llm_output() {
        let value = serde_json::json!({
            "mcqs": [
                {"question": "q1", "options": ["a", "b", "c"], "correct_index": 1},
                {"question": "q2", "options": ["a", "b"], "correct_index": 0},
                {"question": "q3", "options": ["a", "b", "c", "d"], "correct_index": 3}
            ],
            "coding": {
                "question": "print the length of [1, 2, 3]",
                "expected_output": "3",
                "validation_criteria": ["uses len()"]
            }
        });
        let quiz = MixedQuiz::from_llm_json(&topic(), value).unwrap();
        assert_eq!(quiz.topic_id, "lists");
        assert_eq!(quiz.mcqs.len(), MCQ_COUNT);
        assert_eq!(quiz.coding.starter_code, "");
    }

    #[test]
    fn rejects_wrong_mcq_count() {
        let value = serde_json::json!({
            "mcqs": [
                {"question": "q1", "options": ["a", "b"], "correct_index": 0}
            ],
            "coding": {"question": "q", "expected_output": "x"}
        });
        assert!(matches!(
            MixedQuiz::from_llm_json(&topic(), value).unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        let value = serde_json::json!({
            "mcqs": [
                {"question": "q1", "options": ["a", "b"], "correct_index": 5},
                {"question": "q2", "options": ["a", "b"], "correct_index": 0},
                {"question": "q3", "options": ["a", "b"], "correct_index": 1}
            ],
            "coding": {"question": "q", "expected_output": "x"}
        });
        assert!(MixedQuiz::from_llm_json(&topic(), value).is_err());
    }

    #[test]
    fn rejects_non_quiz_payload() {
        let value = serde_json::json!({"surprise": true});
        assert!(MixedQuiz::from_llm_json(&topic(), value).is_err());
    }

    #[test]
    fn fallback_quiz_is_well_formed() {
        let quiz = fallback_quiz(&topic());
        assert_eq!(quiz.mcqs.len(), MCQ_COUNT);
        for mcq in &quiz.mcqs {
            assert!(mcq.correct_index < mcq.options.len());
        }
        assert!(!quiz.coding.expected_output.is_empty());
        assert_eq!(quiz.topic_id, "lists");
    }

    #[test]
    fn view_strips_answers() {
        let quiz = quiz_with_answers([0, 1, 2]);
        let view = quiz.view();
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("correct_index"));
        assert!(!json.contains("expected_output"));
        assert_eq!(view.mcqs.len(), MCQ_COUNT);
    }
}
