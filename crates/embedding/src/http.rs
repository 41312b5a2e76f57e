use std::time::{Duration, Instant};

use async_trait::async_trait;
use loupe_core::config::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{Embedder, EmbeddingError, validation::ensure_batch_shape};

/// Embedder backed by an Ollama-compatible `/api/embed` endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
}

impl HttpEmbedder {
  pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    debug!(url = %config.url, model = %config.model, dimensions = config.dimensions, "http embedder ready");
    Ok(Self {
      client,
      base_url: config.url.trim_end_matches('/').to_string(),
      model: config.model.clone(),
      dimensions: config.dimensions,
    })
  }

  fn embed_url(&self) -> String {
    format!("{}/api/embed", self.base_url)
  }

  async fn request_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let request = EmbedRequest {
      model: &self.model,
      input: texts,
    };

    let start = Instant::now();
    let response = self.client.post(self.embed_url()).json(&request).send().await.map_err(|e| {
      if e.is_timeout() {
        EmbeddingError::Timeout
      } else {
        EmbeddingError::Request(e)
      }
    })?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!(%status, batch_size = texts.len(), model = %self.model, "embedding request failed");
      return Err(EmbeddingError::Provider(format!("server returned {status}: {body}")));
    }

    let result: EmbedResponse = response.json().await?;
    trace!(
      batch_size = texts.len(),
      elapsed_ms = start.elapsed().as_millis(),
      "embedding batch complete"
    );

    ensure_batch_shape(texts.len(), self.dimensions, &result.embeddings)?;
    Ok(result.embeddings)
  }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
  model: &'a str,
  input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
  embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
  fn model(&self) -> &str {
    &self.model
  }

  fn dimension(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = self.request_batch(&[text]).await?;
    Ok(vectors.remove(0))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }
    self.request_batch(texts).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn construction_normalizes_url() {
    let config = EmbeddingConfig {
      url: "http://localhost:11434/".to_string(),
      ..Default::default()
    };
    let embedder = HttpEmbedder::new(&config).unwrap();
    assert_eq!(embedder.embed_url(), "http://localhost:11434/api/embed");
    assert_eq!(embedder.model(), "nomic-embed-text");
    assert_eq!(embedder.dimension(), 768);
  }

  #[tokio::test]
  async fn unreachable_server_is_an_error() {
    let config = EmbeddingConfig {
      url: "http://127.0.0.1:1".to_string(),
      timeout_secs: 1,
      ..Default::default()
    };
    let embedder = HttpEmbedder::new(&config).unwrap();
    assert!(embedder.embed("hello").await.is_err());
  }
}
