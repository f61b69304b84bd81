//! Prompt templates for the tutoring pipelines.
//!
//! Built-in templates cover every pipeline; a prompts directory of `.md`
//! files (keyed by file stem) can override any of them at startup.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

pub const LESSON_KEY: &str = "lesson";
pub const REVIEW_KEY: &str = "review";
pub const QUIZ_KEY: &str = "quiz";
pub const VALIDATE_SOLUTION_KEY: &str = "validate_solution";
pub const DIAGNOSE_KEY: &str = "diagnose";

const LESSON_TEMPLATE: &str = "\
You are an expert AI programming tutor for a system called Evocode. Your goal is to \
generate a personalized, clear, and engaging lesson.

**Learner's Learning Style:** {learning_style_tags}
**Topic to Teach:** {topic}
**Relevant Information from the Textbook:**
{context}

**Your Task:**
Generate a lesson that teaches the learner the topic above, tailored directly to \
their learning style. If they prefer 'provide_code_first', start with a complete \
code example. If they like 'use_analogy', include a relatable analogy. Write the \
lesson in Markdown.";

const REVIEW_TEMPLATE: &str = "\
You are a content personalization specialist. Review a draft lesson against the \
learner's preferences.

**Learner's Preferences (Tags):** {learning_tags}

**Draft Lesson:**
---
{draft_lesson}
---

Judge the draft only on whether it delivers what the tags ask for (for example, an \
analogy for 'use_analogy', code before prose for 'provide_code_first'). Reply with \
a JSON object: {\"is_approved\": <bool>, \"feedback\": \"<specific feedback>\"}.";

const QUIZ_TEMPLATE: &str = "\
You are writing a short assessment for the programming topic '{topic}'. \
Key concepts: {concepts}. Learner preferences: {learning_style_tags}.

Produce a JSON object with exactly this shape and nothing else:
{\"mcqs\": [{\"question\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \
\"correct_index\": 0}, ... exactly 3 items ...], \"coding\": {\"question\": \"...\", \
\"starter_code\": \"...\", \"expected_output\": \"...\", \"validation_criteria\": [\"...\"]}}

The coding question must be solvable in a few lines of Python and must print a \
deterministic expected output.";

const VALIDATE_SOLUTION_TEMPLATE: &str = "\
You are a coding instructor evaluating a student's solution to a programming problem.

**Question**: {question}
**Expected Output**: {expected_output}

**Student's Code**:
```
{student_code}
```

**Actual Output**: {actual_output}

**Validation Criteria**:
{validation_criteria}

Decide whether the code actually solves the specific problem and meets every \
criterion, not merely whether it runs. Be strict but fair. Reply with a JSON \
object: {\"is_correct\": <bool>, \"feedback\": \"<what is right or wrong>\"}.";

const DIAGNOSE_TEMPLATE: &str = "\
A student submitted the following code for a quiz on '{topic}' and it failed.

STUDENT'S CODE:
```python
{source_code}
```

ERROR MESSAGE:
```
{error_message}
```

Which of the following concepts is the most likely source of the student's \
confusion? POSSIBLE CONCEPTS: {concepts}

Respond with ONLY the single most relevant concept from the list.";

/// Template store with `{placeholder}` substitution.
#[derive(Debug, Clone)]
pub struct Prompts {
    templates: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Prompts {
    /// The built-in template set.
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        templates.insert(LESSON_KEY.to_string(), LESSON_TEMPLATE.to_string());
        templates.insert(REVIEW_KEY.to_string(), REVIEW_TEMPLATE.to_string());
        templates.insert(QUIZ_KEY.to_string(), QUIZ_TEMPLATE.to_string());
        templates.insert(
            VALIDATE_SOLUTION_KEY.to_string(),
            VALIDATE_SOLUTION_TEMPLATE.to_string(),
        );
        templates.insert(DIAGNOSE_KEY.to_string(), DIAGNOSE_TEMPLATE.to_string());
        Self { templates }
    }

    /// Built-in templates overridden by any `.md` files found in `dir`,
    /// keyed by file stem.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut prompts = Self::builtin();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("cannot read prompts directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .context("prompt file has no stem")?
                    .to_string();
                let content = std::fs::read_to_string(&path)?;
                prompts.templates.insert(key, content);
            }
        }
        Ok(prompts)
    }

    /// Renders a template, substituting each `{name}` placeholder.
    pub fn render(&self, key: &str, substitutions: &[(&str, &str)]) -> String {
        let mut rendered = self
            .templates
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("missing prompt template '{key}'"));
        for (name, value) in substitutions {
            rendered = rendered.replace(&format!("{{{name}}}"), value);
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_pipeline() {
        let prompts = Prompts::builtin();
        for key in [LESSON_KEY, REVIEW_KEY, QUIZ_KEY, VALIDATE_SOLUTION_KEY, DIAGNOSE_KEY] {
            assert!(prompts.templates.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn render_substitutes_placeholders() {
        let rendered = Prompts::builtin().render(
            LESSON_KEY,
            &[
                ("topic", "Lists"),
                ("context", "lists hold ordered items"),
                ("learning_style_tags", "use_analogy"),
            ],
        );
        assert!(rendered.contains("Lists"));
        assert!(rendered.contains("use_analogy"));
        assert!(!rendered.contains("{topic}"));
    }
}
