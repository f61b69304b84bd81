//! Chat-completion access for the tutoring pipelines.
//!
//! All content generation, review, and validation goes through the
//! [`ChatClient`] trait so pipelines can be exercised against mocks. The
//! production implementation speaks to any OpenAI-compatible endpoint (the
//! Groq API in the default configuration).

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

use crate::error::{CoreError, Result};

/// A single-turn chat completion: one system prompt, one user prompt, one
/// text reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, system: String, user: String) -> Result<String>;
}

/// `ChatClient` backed by an OpenAI-compatible API.
pub struct OpenAiChatClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiChatClient {
    /// Creates a client for a given endpoint configuration.
    ///
    /// `temperature` is fixed per client instance: generation runs warm
    /// (0.7) while grading validation runs near-deterministic (0.1), so the
    /// two are constructed as separate instances at startup.
    pub fn new(config: OpenAIConfig, model: String, temperature: f32) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            temperature,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, system: String, user: String) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| CoreError::Upstream("no content in LLM response".to_string()))?;
        Ok(content)
    }
}

/// Extracts a JSON object from an LLM reply.
///
/// Models frequently wrap JSON in markdown fences or surround it with prose;
/// this takes the span between the first `{` and the last `}` and parses it.
pub fn extract_json(reply: &str) -> Result<serde_json::Value> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(CoreError::Validation(
                "LLM reply contains no JSON object".to_string(),
            ));
        }
    };
    serde_json::from_str(body)
        .map_err(|e| CoreError::Validation(format!("LLM reply is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let value = extract_json(r#"{"is_approved": true, "feedback": "ok"}"#).unwrap();
        assert_eq!(value["is_approved"], true);
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "Here is my verdict:\n```json\n{\"is_correct\": false}\n```\nThanks!";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["is_correct"], false);
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(matches!(
            extract_json("I could not decide.").unwrap_err(),
            CoreError::Validation(_)
        ));
    }

    #[test]
    fn rejects_broken_json() {
        assert!(extract_json("{\"unterminated\": ").is_err());
    }
}
