//! Shared test fixtures for the index crate.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use catalog::Catalog;
use embedding::{Embedder, EmbeddingError};
use loupe_core::config::IndexConfig;

use crate::FileIndexer;

/// Deterministic embedder: the vector is a cheap function of the text, so
/// equal chunks embed equally and tests never need a model server.
pub(crate) struct MockEmbedder {
  pub dimension: usize,
}

impl MockEmbedder {
  pub fn vector_for(&self, text: &str) -> Vec<f32> {
    let seed: u64 = text.bytes().map(u64::from).sum();
    (0..self.dimension)
      .map(|i| ((seed.wrapping_mul(31).wrapping_add(i as u64 * 7)) % 97) as f32 / 97.0)
      .collect()
  }
}

#[async_trait]
impl Embedder for MockEmbedder {
  fn model(&self) -> &str {
    "mock-model"
  }

  fn dimension(&self) -> usize {
    self.dimension
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Ok(self.vector_for(text))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    Ok(texts.iter().map(|t| self.vector_for(t)).collect())
  }
}

/// Embedder that always errors, for failure-isolation tests.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
  fn model(&self) -> &str {
    "failing-model"
  }

  fn dimension(&self) -> usize {
    8
  }

  async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Err(EmbeddingError::Provider("mock failure".into()))
  }

  async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    Err(EmbeddingError::Provider("mock failure".into()))
  }
}

/// Embedder that fails only for texts containing `poison`, so batch
/// tests can fail one file while its peers succeed.
pub(crate) struct PoisonEmbedder {
  pub poison: &'static str,
}

#[async_trait]
impl Embedder for PoisonEmbedder {
  fn model(&self) -> &str {
    "poison-model"
  }

  fn dimension(&self) -> usize {
    8
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    if text.contains(self.poison) {
      return Err(EmbeddingError::Provider("poisoned text".into()));
    }
    Ok(MockEmbedder { dimension: 8 }.vector_for(text))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut out = Vec::with_capacity(texts.len());
    for text in texts {
      out.push(self.embed(text).await?);
    }
    Ok(out)
  }
}

pub(crate) fn test_indexer(roots: Vec<PathBuf>) -> FileIndexer {
  test_indexer_with_config(roots, IndexConfig::default())
}

pub(crate) fn test_indexer_with_config(roots: Vec<PathBuf>, config: IndexConfig) -> FileIndexer {
  let catalog = Catalog::open_in_memory().expect("in-memory catalog");
  FileIndexer::new(catalog, Arc::new(MockEmbedder { dimension: 8 }), config, roots)
}

pub(crate) fn failing_indexer(roots: Vec<PathBuf>) -> FileIndexer {
  let catalog = Catalog::open_in_memory().expect("in-memory catalog");
  FileIndexer::new(catalog, Arc::new(FailingEmbedder), IndexConfig::default(), roots)
}

pub(crate) fn poison_indexer(roots: Vec<PathBuf>, poison: &'static str) -> FileIndexer {
  let catalog = Catalog::open_in_memory().expect("in-memory catalog");
  FileIndexer::new(catalog, Arc::new(PoisonEmbedder { poison }), IndexConfig::default(), roots)
}
