//! Reasoning clients.
//!
//! `HttpReasoningClient` speaks the OpenAI-compatible chat-completions
//! protocol, which covers hosted providers and local runtimes alike.
//! `MockReasoning` is the scripted test double the engine tests are
//! built on.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use cadre_core::reasoning::{Reasoning, ReasoningError, ReasoningRequest};
use cadre_core::state::MessageRole;

/// HTTP client config (OpenAI-compatible).
#[derive(Debug, Clone)]
pub struct HttpReasoningConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for HttpReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/chat/completions".to_string(),
            api_key: None,
            model: "llama3".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

/// Reasoning client over an OpenAI-compatible chat completions API.
pub struct HttpReasoningClient {
    client: reqwest::Client,
    config: HttpReasoningConfig,
}

impl HttpReasoningClient {
    pub fn new(config: HttpReasoningConfig) -> Result<Self, ReasoningError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReasoningError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}

#[async_trait]
impl Reasoning for HttpReasoningClient {
    async fn invoke(&self, request: ReasoningRequest) -> Result<String, ReasoningError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {key}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| ReasoningError::Http(e.to_string()))?,
            );
        }

        let mut messages = vec![ChatMessage {
            role: "system",
            content: request.framing,
        }];
        messages.extend(request.context.into_iter().map(|m| ChatMessage {
            role: wire_role(m.role),
            content: m.content,
        }));

        debug!(
            model = %self.config.model,
            message_count = messages.len(),
            "reasoning request prepared"
        );

        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasoningError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Response(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ReasoningError::Http(e.to_string()))?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| ReasoningError::Serialization(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReasoningError::Response("missing choices".to_string()))
    }
}

/// Scripted reasoning double for tests and examples: answers are
/// served in order, the last one repeating once the script runs out.
pub struct MockReasoning {
    responses: Mutex<Vec<String>>,
}

impl MockReasoning {
    /// A double that always returns `response`.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::scripted(vec![response.into()])
    }

    /// A double that serves `responses` in order.
    pub fn scripted(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl Reasoning for MockReasoning {
    async fn invoke(&self, _request: ReasoningRequest) -> Result<String, ReasoningError> {
        let mut responses = self
            .responses
            .lock()
            .map_err(|e| ReasoningError::Response(e.to_string()))?;
        if responses.is_empty() {
            return Err(ReasoningError::Response("mock script exhausted".to_string()));
        }
        if responses.len() == 1 {
            return Ok(responses[0].clone());
        }
        Ok(responses.remove(0))
    }
}

/// A double that always fails, for exercising step-failure paths.
pub struct UnavailableReasoning;

#[async_trait]
impl Reasoning for UnavailableReasoning {
    async fn invoke(&self, _request: ReasoningRequest) -> Result<String, ReasoningError> {
        Err(ReasoningError::Http("connection refused".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn test_mock_serves_script_in_order_then_repeats_last() {
        let mock = MockReasoning::scripted(vec!["one".to_string(), "two".to_string()]);
        let req = || ReasoningRequest::new("framing");

        assert_eq!(block_on(mock.invoke(req())).unwrap(), "one");
        assert_eq!(block_on(mock.invoke(req())).unwrap(), "two");
        assert_eq!(block_on(mock.invoke(req())).unwrap(), "two");
    }

    #[test]
    fn test_unavailable_reasoning_fails() {
        let result = block_on(UnavailableReasoning.invoke(ReasoningRequest::new("framing")));
        assert!(matches!(result, Err(ReasoningError::Http(_))));
    }
}
