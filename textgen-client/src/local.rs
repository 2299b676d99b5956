//! OpenAI-compatible backend for local model servers.
//!
//! Works against anything exposing `POST /v1/chat/completions` — llama.cpp,
//! vLLM, Ollama, LM Studio. Usage reporting is optional on these servers;
//! missing counts come back as zero rather than failing the call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::backend::{guard, GenerationBackend};
use crate::error::GenerateError;
use crate::types::{Completion, Provider, TokenUsage};

/// Backend speaking the OpenAI chat-completions dialect.
pub struct LocalBackend {
    http: reqwest::Client,
    endpoint: String,
    call_timeout: Duration,
}

impl LocalBackend {
    /// `endpoint` is the server base URL, e.g. `http://localhost:11434`.
    pub fn new(endpoint: impl Into<String>, call_timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            call_timeout,
        }
    }

    async fn send(&self, prompt: &str, model: &str) -> Result<Completion, GenerateError> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(GenerateError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerateError::from_status(status.as_u16(), message));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerateError::InvalidResponse("response carried no choices".into()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl GenerationBackend for LocalBackend {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, GenerateError> {
        tracing::debug!(model, prompt_bytes = prompt.len(), "local model request");
        guard(self.send(prompt, model), self.call_timeout, cancel).await
    }

    fn provider(&self) -> Provider {
        Provider::LocalModel
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = LocalBackend::new("http://localhost:11434/", Duration::from_secs(60));
        assert_eq!(backend.endpoint, "http://localhost:11434");
    }

    #[test]
    fn response_without_usage_defaults_to_zero() {
        let raw = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content, "hi");
    }

    #[test]
    fn response_with_usage_parses() {
        let raw = r#"{
            "choices": [{"message": {"content": "hi"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let usage = parsed.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 4);
    }
}
