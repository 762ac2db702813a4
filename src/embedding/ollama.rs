//! Ollama embeddings implementation.

use super::Embedder;
use crate::error::{HiloError, Result};
use crate::openai::{create_http_client, DEFAULT_TIMEOUT_SECS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Embedder backed by a local Ollama server.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder talking to `base_url`.
    pub fn with_config(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_http_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            endpoint: Self::endpoint(base_url)?,
            model: model.to_string(),
        })
    }

    fn endpoint(base_url: &str) -> Result<Url> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join("api/embeddings")?)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response: EmbeddingResponse = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.embedding.is_empty() {
            return Err(HiloError::EmbeddingUnavailable(format!(
                "Ollama returned an empty embedding for model {}",
                self.model
            )));
        }

        debug!("Generated embedding with {} dimensions", response.embedding.len());
        Ok(response.embedding)
    }
}
