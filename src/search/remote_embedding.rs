//! Remote embedding provider over an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::embedding::{require_text, Embedding, EmbeddingProvider};
use crate::error::{MatchError, Result};

/// Configuration for [`HttpEmbedder`].
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Base URL, e.g. "http://localhost:11434/v1"
    pub base_url: String,
    /// Model name sent with each request
    pub model: String,
    pub api_key: Option<String>,
    /// Expected vector length
    pub dimension: usize,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
    version: String,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MatchError::ProviderUnavailable(e.to_string()))?;
        let version = format!("http:{}", config.model);

        Ok(Self {
            client,
            config,
            version,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let normalized = require_text(text)?;
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: vec![normalized.as_str()],
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(model = %self.config.model, chars = normalized.len(), "Requesting embedding");
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                MatchError::timeout("embed", self.config.timeout)
            } else {
                MatchError::ProviderUnavailable(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| MatchError::ProviderUnavailable(format!("malformed response: {}", e)))?;

        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                MatchError::ProviderUnavailable("no embedding returned".to_string())
            })?;

        if values.len() != self.config.dimension {
            return Err(MatchError::DimensionMismatch {
                expected: self.config.dimension,
                actual: values.len(),
            });
        }

        Ok(Embedding::new(values))
    }
}

fn classify_status(status: StatusCode, body: &str) -> MatchError {
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        MatchError::InvalidInput(format!("provider rejected input ({}): {}", status, body))
    } else {
        MatchError::ProviderUnavailable(format!("provider returned {}: {}", status, body))
    }
}
