//! Embedding client abstraction and the OpenAI-compatible HTTP adapter.
//!
//! Every chunk and every query passes through [`EmbeddingClient::embed`] exactly once. The
//! adapter issues a single `POST {endpoint}/embeddings` call per text and never retries; the
//! configured timeout bounds the call.

use crate::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider did not answer within the configured timeout.
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),
    /// Transport failed before a response was received.
    #[error("Embedding request failed: {0}")]
    Request(#[source] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("Embedding provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response could not be turned into a vector.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce the embedding vector for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// Embedding client speaking the OpenAI `/embeddings` protocol (OpenAI, OpenRouter, ...).
pub struct OpenAiEmbeddingClient {
    http: Client,
    config: ProviderConfig,
    expected_dimension: Option<usize>,
}

impl OpenAiEmbeddingClient {
    /// Build a client from injected provider settings.
    pub fn new(
        config: ProviderConfig,
        expected_dimension: Option<usize>,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("campus-search/embedding")
            .timeout(config.timeout)
            .build()
            .map_err(EmbeddingClientError::Request)?;
        tracing::debug!(
            endpoint = %config.endpoint,
            model = %config.model,
            expected_dimension = ?expected_dimension,
            "Initialized embedding client"
        );
        Ok(Self {
            http,
            config,
            expected_dimension,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.endpoint.trim_end_matches('/'))
    }

    fn map_transport_error(&self, error: reqwest::Error) -> EmbeddingClientError {
        if error.is_timeout() {
            EmbeddingClientError::Timeout(self.config.timeout)
        } else {
            EmbeddingClientError::Request(error)
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        tracing::trace!(model = %self.config.model, text_len = text.len(), "Requesting embedding");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await
            .map_err(|error| self.map_transport_error(error))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingClientError::UnexpectedStatus { status, body };
            tracing::warn!(error = %error, "Embedding provider rejected request");
            return Err(error);
        }

        let body: EmbeddingResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                EmbeddingClientError::Timeout(self.config.timeout)
            } else {
                EmbeddingClientError::InvalidResponse(format!(
                    "failed to decode embedding response: {error}"
                ))
            }
        })?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("response contained no embeddings".into())
            })?;

        if vector.is_empty() {
            return Err(EmbeddingClientError::InvalidResponse(
                "provider returned an empty vector".into(),
            ));
        }

        if let Some(expected) = self.expected_dimension {
            if vector.len() != expected {
                return Err(EmbeddingClientError::InvalidResponse(format!(
                    "expected {expected} dimensions, got {}",
                    vector.len()
                )));
            }
        }

        Ok(vector)
    }
}
