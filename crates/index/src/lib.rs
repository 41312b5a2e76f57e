//! Indexing pipeline: change detection, per-file indexing, batch
//! orchestration, and incremental updates.
//!
//! ```text
//! paths → ChangeDetector → (new ∪ modified) → BatchIndexer → FileIndexer
//!       → {hasher, metadata, chunker, embedder} → Catalog
//! deletions → Catalog
//! ```
//!
//! Cancellation is cooperative: every long operation takes a
//! `CancellationToken` and checks it at its suspension points.
//! `IndexError::Cancelled` always propagates; every other per-file error
//! becomes an unsuccessful [`IndexResult`].

mod batch;
mod change_detector;
pub mod chunker;
mod extractor;
mod file_indexer;
pub mod hasher;
mod incremental;
pub mod metadata;
mod scanner;
pub mod symbols;
mod watcher;

use std::path::PathBuf;

use catalog::CatalogError;
use embedding::EmbeddingError;
use serde::{Deserialize, Serialize};

pub use batch::{BatchFailure, BatchIndexer, BatchProgress, BatchResult, BatchStats, ProgressListener};
pub use change_detector::ChangeDetector;
pub use extractor::{ContentExtractor, ExtractorRegistry, Utf8Extractor};
pub use file_indexer::FileIndexer;
pub use incremental::{DeletionResult, IncrementalIndexer, UpdateResult};
pub use scanner::scan_roots;
pub use watcher::watch_roots;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  #[error("invalid path: {0}")]
  InvalidPath(PathBuf),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("file is {size} bytes, limit is {limit}")]
  SizeLimitExceeded { size: u64, limit: u64 },
  #[error("decode error: {0}")]
  Decode(String),
  #[error("embedder error: {0}")]
  Embedder(#[from] EmbeddingError),
  #[error("catalog error: {0}")]
  Catalog(#[from] CatalogError),
  #[error("cancelled")]
  Cancelled,
}

impl IndexError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }
}

/// Outcome of indexing one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResult {
  pub success: bool,
  pub relative_path: String,
  pub chunk_count: usize,
  pub embedding_count: usize,
  pub error: Option<String>,
}

impl IndexResult {
  pub fn failure(relative_path: impl Into<String>, error: impl std::fmt::Display) -> Self {
    Self {
      success: false,
      relative_path: relative_path.into(),
      chunk_count: 0,
      embedding_count: 0,
      error: Some(error.to_string()),
    }
  }
}

#[cfg(test)]
pub(crate) mod testing;
