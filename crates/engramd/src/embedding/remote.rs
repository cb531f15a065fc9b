//! Remote embedder for OpenAI-compatible `/embeddings` endpoints.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::error::{EngineError, Result};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by a hosted OpenAI-compatible embeddings API.
#[derive(Debug)]
pub struct RemoteEmbedder {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl RemoteEmbedder {
    /// Reads the API key from the environment variable named in config.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env).map_err(|_| {
            EngineError::Config(format!("API key env var '{}' not set", config.api_key_env))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Provider(e.to_string()))?;

        info!(
            model = %config.model,
            api_url = %config.api_url,
            "remote embedder initialized"
        );

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            api_key,
            dimension: config.dimension,
        })
    }

    async fn request(&self, inputs: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_url.trim_end_matches('/'));
        debug!(count = inputs.len(), "requesting embeddings");

        let expected = inputs.len();
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Provider(format!("embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EngineError::Provider(format!(
                "embedding API returned {status}: {error_text}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Provider(format!("malformed embedding response: {e}")))?;

        if parsed.data.len() != expected {
            return Err(EngineError::Provider(format!(
                "embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                expected
            )));
        }

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        for datum in &data {
            if datum.embedding.len() != self.dimension {
                return Err(EngineError::Provider(format!(
                    "embedding API returned dimension {}, expected {}",
                    datum.embedding.len(),
                    self.dimension
                )));
            }
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(vec![text]).await?;
        vectors
            .pop()
            .ok_or_else(|| EngineError::Provider("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts.iter().map(|t| t.as_str()).collect())
            .await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
