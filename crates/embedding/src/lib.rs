//! Embedding providers.
//!
//! The indexer treats an embedder as an opaque text-to-vector transform
//! with a fixed model and dimension. The HTTP backend talks to an
//! Ollama-compatible endpoint; [`RetryEmbedder`] wraps any provider with
//! backoff for transient failures.

mod http;
mod resilient;
pub mod validation;

use async_trait::async_trait;

pub use http::HttpEmbedder;
pub use resilient::{RetryConfig, RetryEmbedder};

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),
  #[error("provider error: {0}")]
  Provider(String),
  #[error("request timed out")]
  Timeout,
  #[error("expected {expected} vectors, got {got}")]
  WrongCardinality { expected: usize, got: usize },
  #[error("expected {expected}-dimensional vector at index {index}, got {got}")]
  WrongDimension { expected: usize, got: usize, index: usize },
}

impl EmbeddingError {
  /// Transient failures worth retrying. Shape violations are contract
  /// bugs and never retried.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Timeout => true,
      Self::Request(e) => e.is_timeout() || e.is_connect(),
      Self::Provider(msg) => ["429", "502", "503", "504"].iter().any(|code| msg.contains(code)),
      Self::WrongCardinality { .. } | Self::WrongDimension { .. } => false,
    }
  }
}

/// Batched text-to-vector transform with a fixed model and dimension.
///
/// `embed_batch` must return exactly one vector per input, each of length
/// [`Embedder::dimension`].
#[async_trait]
pub trait Embedder: Send + Sync {
  fn model(&self) -> &str;
  fn dimension(&self) -> usize;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
