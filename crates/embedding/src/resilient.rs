use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{Embedder, EmbeddingError};

#[derive(Debug, Clone)]
pub struct RetryConfig {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub max_backoff: Duration,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: 3,
      initial_backoff: Duration::from_millis(500),
      max_backoff: Duration::from_secs(30),
    }
  }
}

impl RetryConfig {
  fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.initial_backoff.as_secs_f64() * 2f64.powi(attempt as i32);
    Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()))
  }
}

/// Wraps any embedder with retry-on-transient-failure semantics.
///
/// Shape violations pass straight through: retrying a backend that
/// returns the wrong cardinality only repeats the bug.
pub struct RetryEmbedder<E> {
  inner: E,
  config: RetryConfig,
}

impl<E: Embedder> RetryEmbedder<E> {
  pub fn new(inner: E) -> Self {
    Self::with_config(inner, RetryConfig::default())
  }

  pub fn with_config(inner: E, config: RetryConfig) -> Self {
    Self { inner, config }
  }

  /// Decide whether to retry after `error`; sleeps the backoff when so.
  async fn should_retry(&self, attempt: u32, error: &EmbeddingError) -> bool {
    if !error.is_transient() || attempt >= self.config.max_retries {
      if attempt > 0 {
        debug!(attempt, %error, "giving up after retries");
      }
      return false;
    }
    let backoff = self.config.backoff_for_attempt(attempt);
    warn!(attempt, backoff_ms = backoff.as_millis(), %error, "transient embedding failure, retrying");
    sleep(backoff).await;
    true
  }
}

#[async_trait]
impl<E: Embedder> Embedder for RetryEmbedder<E> {
  fn model(&self) -> &str {
    self.inner.model()
  }

  fn dimension(&self) -> usize {
    self.inner.dimension()
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut attempt = 0;
    loop {
      match self.inner.embed(text).await {
        Ok(vector) => return Ok(vector),
        Err(e) => {
          if !self.should_retry(attempt, &e).await {
            return Err(e);
          }
          attempt += 1;
        }
      }
    }
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut attempt = 0;
    loop {
      match self.inner.embed_batch(texts).await {
        Ok(vectors) => return Ok(vectors),
        Err(e) => {
          if !self.should_retry(attempt, &e).await {
            return Err(e);
          }
          attempt += 1;
        }
      }
    }
  }
}
