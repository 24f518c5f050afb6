//! Abstractive summaries through an OpenAI-compatible chat-completion API.
//!
//! The client wraps the supplied text in a fixed instruction and sends it as a single
//! user-role message. Search treats every error from this module as non-fatal; the
//! dedicated summarize endpoint surfaces it.

use crate::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Instruction prepended to every text sent for summarization.
pub const SUMMARY_INSTRUCTION: &str =
    "Summarize the following academic content and highlight key insights:";

/// Errors surfaced while attempting abstractive summarization.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider did not answer within the configured timeout.
    #[error("Summarization request timed out after {0:?}")]
    Timeout(Duration),
    /// Provider was unreachable.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request passed to the summarization provider.
#[derive(Debug, Clone)]
pub struct SummarizationRequest {
    /// Text to condense; the instruction is added by the client.
    pub text: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Interface implemented by abstractive summarization providers.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate a concise summary of the request text.
    async fn summarize(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Summarization client backed by `POST {endpoint}/chat/completions`.
pub struct ChatCompletionClient {
    http: Client,
    config: ProviderConfig,
}

impl ChatCompletionClient {
    /// Build a client from injected provider settings.
    pub fn new(config: ProviderConfig) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("campus-search/summary")
            .timeout(config.timeout)
            .build()
            .map_err(|error| SummarizationClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

/// Build the single user message sent to the chat model.
pub fn build_prompt(text: &str) -> String {
    format!("{SUMMARY_INSTRUCTION}\n\n{text}")
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl SummarizationClient for ChatCompletionClient {
    async fn summarize(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: build_prompt(&request.text),
            }],
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    SummarizationClientError::Timeout(self.config.timeout)
                } else {
                    SummarizationClientError::ProviderUnavailable(format!(
                        "failed to reach {}: {error}",
                        self.config.endpoint
                    ))
                }
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "chat endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode chat response: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                SummarizationClientError::InvalidResponse("response contained no choices".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> ChatCompletionClient {
        ChatCompletionClient::new(ProviderConfig {
            endpoint: server.base_url(),
            api_key: "test-key".into(),
            model: "openai/gpt-4o-mini".into(),
            timeout: Duration::from_millis(500),
        })
        .expect("client")
    }

    #[tokio::test]
    async fn chat_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions").json_body(json!({
                    "model": "openai/gpt-4o-mini",
                    "messages": [{
                        "role": "user",
                        "content": "Summarize the following academic content and highlight key insights:\n\nPhotosynthesis converts light."
                    }],
                    "max_tokens": 300
                }));
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "  Plants use light.  " } }]
                }));
            })
            .await;

        let summary = client_for(&server)
            .summarize(SummarizationRequest {
                text: "Photosynthesis converts light.".into(),
                max_tokens: 300,
            })
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "Plants use light.");
    }

    #[tokio::test]
    async fn chat_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client_for(&server)
            .summarize(SummarizationRequest {
                text: "Text".into(),
                max_tokens: 10,
            })
            .await
            .expect_err("error response");

        assert!(
            matches!(error, SummarizationClientError::GenerationFailed(message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn chat_client_rejects_missing_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server)
            .summarize(SummarizationRequest {
                text: "Text".into(),
                max_tokens: 10,
            })
            .await
            .unwrap_err();

        assert!(matches!(error, SummarizationClientError::InvalidResponse(_)));
    }

    #[test]
    fn prompt_places_text_after_instruction() {
        let prompt = build_prompt("alpha\n\nbeta");
        assert!(prompt.starts_with(SUMMARY_INSTRUCTION));
        assert!(prompt.ends_with("\n\nalpha\n\nbeta"));
    }
}
