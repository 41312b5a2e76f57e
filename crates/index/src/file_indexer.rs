use std::{path::{Path, PathBuf}, sync::Arc};

use catalog::Catalog;
use chrono::Utc;
use embedding::{Embedder, validation::ensure_batch_shape};
use loupe_core::{ChunkArtifact, Embedding, FileState, config::IndexConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
  IndexError, IndexResult,
  chunker::{ChunkerRegistry, normalize_chunks},
  extractor::ExtractorRegistry,
  metadata,
  symbols::SymbolExtractor,
};

/// Indexes one file end-to-end: metadata, content, chunks, embeddings,
/// symbols, and an atomic catalog commit.
///
/// Per-file state is owned by the calling task from metadata extraction
/// through the commit; only the catalog and embedder are shared.
pub struct FileIndexer {
  catalog: Catalog,
  embedder: Arc<dyn Embedder>,
  chunkers: ChunkerRegistry,
  symbols: SymbolExtractor,
  extractors: ExtractorRegistry,
  config: IndexConfig,
  /// Watch roots sorted by descending path length, so the longest match
  /// wins when roots nest.
  roots: Vec<PathBuf>,
}

impl FileIndexer {
  pub fn new(catalog: Catalog, embedder: Arc<dyn Embedder>, config: IndexConfig, roots: Vec<PathBuf>) -> Self {
    Self {
      catalog,
      embedder,
      chunkers: ChunkerRegistry::default(),
      symbols: SymbolExtractor::new(),
      extractors: ExtractorRegistry::default(),
      config,
      roots: sort_roots(roots),
    }
  }

  pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
    self.extractors = extractors;
    self
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// Relative path under the longest matching watch root, falling back to
  /// the absolute string when no root contains the path.
  pub fn relative_path(&self, abs: &Path) -> String {
    relative_to_roots(&self.roots, abs)
  }

  /// Index a single file.
  ///
  /// Every non-cancellation error is converted into an unsuccessful
  /// [`IndexResult`]; `Err` is reserved for [`IndexError::Cancelled`],
  /// which always propagates unchanged.
  pub async fn index_file(&self, path: &Path, cancel: &CancellationToken) -> Result<IndexResult, IndexError> {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let rel = self.relative_path(&abs);

    if cancel.is_cancelled() {
      return Err(IndexError::Cancelled);
    }

    let meta = match metadata::extract_async(&abs).await {
      Ok(meta) => meta,
      Err(IndexError::Cancelled) => return Err(IndexError::Cancelled),
      Err(e) => return Ok(IndexResult::failure(rel, e)),
    };

    if meta.size_bytes > self.config.max_file_size {
      let e = IndexError::SizeLimitExceeded {
        size: meta.size_bytes,
        limit: self.config.max_file_size,
      };
      return Ok(IndexResult::failure(rel, e));
    }
    if meta.size_bytes > self.config.warn_file_size {
      warn!(path = %abs.display(), size = meta.size_bytes, "file exceeds warn threshold");
    }

    if cancel.is_cancelled() {
      return Err(IndexError::Cancelled);
    }

    // Content through the extension-appropriate extractor.
    let raw = match tokio::fs::read(&abs).await {
      Ok(raw) => raw,
      Err(e) => return Ok(IndexResult::failure(rel, IndexError::Io(e))),
    };
    let extractor = self.extractors.for_path(&abs);
    let content = match extractor.extract(&abs, &raw) {
      Ok(content) => content,
      Err(e) => return Ok(IndexResult::failure(rel, e)),
    };
    drop(raw);

    let language = meta.language;
    let chunker = self.chunkers.chunker_for(language);
    let chunks = normalize_chunks(chunker.chunk(&content, &abs, language));

    if cancel.is_cancelled() {
      return Err(IndexError::Cancelled);
    }

    // Embeddings, batched; the shape of every response is re-checked here
    // so a misbehaving backend cannot commit a skewed index.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    let mut embed_error: Option<IndexError> = None;
    for batch in chunks.chunks(self.config.embedding_batch_size.max(1)) {
      let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
      match self.embedder.embed_batch(&texts).await {
        Ok(batch_vectors) => {
          if let Err(e) = ensure_batch_shape(texts.len(), self.embedder.dimension(), &batch_vectors) {
            embed_error = Some(IndexError::Embedder(e));
            break;
          }
          vectors.extend(batch_vectors);
        }
        Err(e) => {
          embed_error = Some(IndexError::Embedder(e));
          break;
        }
      }
      if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
      }
    }
    if let Some(e) = embed_error {
      return Ok(IndexResult::failure(rel, e));
    }

    let file_state = FileState {
      file_id: 0,
      rel_path: rel.clone(),
      abs_path: abs.to_string_lossy().to_string(),
      content_hash: meta.content_hash,
      size_bytes: meta.size_bytes,
      mtime_ns: meta.modified_time_ns,
      language,
      kind: chunker.id().to_string(),
      fingerprint: None,
      indexed_at: Utc::now(),
      is_deleted: false,
    };

    let model = self.embedder.model().to_string();
    let chunk_count = chunks.len();
    let artifacts: Vec<ChunkArtifact> = chunks
      .into_iter()
      .zip(vectors)
      .map(|(chunk, vector)| ChunkArtifact {
        chunk,
        embedding: Some(Embedding::new(model.clone(), vector)),
      })
      .collect();
    let embedding_count = artifacts.iter().filter(|a| a.embedding.is_some()).count();

    let file_id = match self.catalog.sync_file_artifacts(file_state.clone(), artifacts, Vec::new()).await {
      Ok(file_id) => file_id,
      Err(sync_error) => {
        // Metadata-only fallback keeps the catalog tracking the file even
        // when the full artifact sync fails.
        warn!(path = %abs.display(), error = %sync_error, "artifact sync failed, retrying metadata-only");
        match self.catalog.sync_file_artifacts(file_state, Vec::new(), Vec::new()).await {
          Ok(_) => return Ok(IndexResult::failure(rel, IndexError::Catalog(sync_error))),
          Err(retry_error) => return Ok(IndexResult::failure(rel, IndexError::Catalog(retry_error))),
        }
      }
    };

    let symbols = self.symbols.extract(
      &content,
      language,
      abs.file_name().and_then(|n| n.to_str()).unwrap_or_default(),
    );
    if let Err(e) = self.catalog.replace_symbols_for_file(file_id, symbols).await {
      warn!(path = %abs.display(), error = %e, "symbol replacement failed");
    }

    debug!(path = %abs.display(), chunks = chunk_count, "indexed file");
    Ok(IndexResult {
      success: true,
      relative_path: rel,
      chunk_count,
      embedding_count,
      error: None,
    })
  }
}

pub(crate) fn sort_roots(mut roots: Vec<PathBuf>) -> Vec<PathBuf> {
  let mut absolute: Vec<PathBuf> = roots
    .drain(..)
    .map(|r| std::path::absolute(&r).unwrap_or(r))
    .collect();
  absolute.sort_by_key(|r| std::cmp::Reverse(r.as_os_str().len()));
  absolute
}

pub(crate) fn relative_to_roots(roots: &[PathBuf], abs: &Path) -> String {
  for root in roots {
    if let Ok(rel) = abs.strip_prefix(root) {
      return rel.to_string_lossy().to_string();
    }
  }
  abs.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
  use crate::testing::test_indexer;

  use super::*;

  #[tokio::test]
  async fn indexes_a_new_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let path = root.join("a.kt");
    std::fs::write(&path, "fun main() {}").unwrap();

    let indexer = test_indexer(vec![root]);
    let result = indexer.index_file(&path, &CancellationToken::new()).await.unwrap();

    assert!(result.success, "unexpected error: {:?}", result.error);
    assert_eq!(result.relative_path, "a.kt");
    assert!(result.chunk_count >= 1);
    assert_eq!(result.embedding_count, result.chunk_count);

    let state = indexer.catalog().find_file(&path.to_string_lossy()).await.unwrap().unwrap();
    let expected = crate::hasher::hex(&crate::hasher::hash_bytes(b"fun main() {}"));
    assert_eq!(state.content_hash, expected);
    assert_eq!(state.language, Some(loupe_core::Language::Kotlin));

    let chunks = indexer.catalog().chunks_for_file(state.file_id).await.unwrap();
    let ordinals: Vec<u32> = chunks.iter().map(|c| c.ordinal).collect();
    assert_eq!(ordinals, (0..chunks.len() as u32).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn oversized_file_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let path = root.join("big.txt");
    std::fs::write(&path, "x".repeat(64)).unwrap();

    let config = loupe_core::config::IndexConfig {
      max_file_size: 16,
      ..Default::default()
    };
    let indexer = crate::testing::test_indexer_with_config(vec![root], config);

    let result = indexer.index_file(&path, &CancellationToken::new()).await.unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap_or_default().contains("limit"));
  }

  #[tokio::test]
  async fn missing_file_is_a_failure_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = test_indexer(vec![dir.path().to_path_buf()]);
    let result = indexer
      .index_file(&dir.path().join("nope.rs"), &CancellationToken::new())
      .await
      .unwrap();
    assert!(!result.success);
  }

  #[tokio::test]
  async fn cancellation_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.rs");
    std::fs::write(&path, "fn a() {}").unwrap();

    let indexer = test_indexer(vec![dir.path().to_path_buf()]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = indexer.index_file(&path, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
  }

  #[tokio::test]
  async fn embedder_failure_marks_file_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.rs");
    std::fs::write(&path, "fn a() {}").unwrap();

    let indexer = crate::testing::failing_indexer(vec![dir.path().to_path_buf()]);
    let result = indexer.index_file(&path, &CancellationToken::new()).await.unwrap();
    assert!(!result.success);
    assert!(result.error.is_some());
  }

  #[test]
  fn longest_root_wins() {
    let roots = sort_roots(vec![PathBuf::from("/r"), PathBuf::from("/r/nested")]);
    assert_eq!(relative_to_roots(&roots, Path::new("/r/nested/a.rs")), "a.rs");
    assert_eq!(relative_to_roots(&roots, Path::new("/r/b.rs")), "b.rs");
    assert_eq!(relative_to_roots(&roots, Path::new("/elsewhere/c.rs")), "/elsewhere/c.rs");
  }
}
