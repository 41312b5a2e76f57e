//! Embedded SQLite catalog for indexed artifacts.
//!
//! The catalog owns every persistent entity: file state, chunks,
//! embeddings, symbols, links, and usage metrics. Indexers mutate it only
//! through transactions; providers read through the query helpers.
//!
//! `rusqlite::Connection` is not `Sync`, so all access goes through
//! `spawn_blocking` with the connection behind an `Arc<Mutex<_>>`. This
//! serializes writers, which is also SQLite's own write model.

mod chunks;
mod files;
mod metrics;
mod schema;
mod symbols;
mod sync;
mod vectors;

use std::{
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use rusqlite::Connection;
use tokio::task::spawn_blocking;

pub use chunks::ChunkRow;
pub use metrics::{CatalogStats, UsageMetric};
pub use symbols::SymbolRow;
pub use vectors::EmbeddingRow;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("embedding dimension mismatch: vector has {got}, model declares {declared}")]
  DimensionMismatch { declared: usize, got: usize },
  #[error("catalog task failed: {0}")]
  Runtime(String),
}

/// Handle to the catalog database. Cheap to clone.
#[derive(Clone)]
pub struct Catalog {
  conn: Arc<Mutex<Connection>>,
  path: PathBuf,
}

impl Catalog {
  /// Open or create the catalog at `path`.
  pub fn open(path: &Path) -> Result<Self, CatalogError> {
    let conn = Connection::open(path)?;
    Self::init(conn, path.to_path_buf())
  }

  /// In-memory catalog for tests and ephemeral runs.
  pub fn open_in_memory() -> Result<Self, CatalogError> {
    let conn = Connection::open_in_memory()?;
    Self::init(conn, PathBuf::from(":memory:"))
  }

  fn init(conn: Connection, path: PathBuf) -> Result<Self, CatalogError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn)?;
    Ok(Self {
      conn: Arc::new(Mutex::new(conn)),
      path,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Run a read-only closure against the connection off the async runtime.
  pub(crate) async fn query<F, T>(&self, f: F) -> Result<T, CatalogError>
  where
    F: FnOnce(&Connection) -> Result<T, CatalogError> + Send + 'static,
    T: Send + 'static,
  {
    let conn = self.conn.clone();
    spawn_blocking(move || {
      let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      f(&guard)
    })
    .await
    .map_err(|e| CatalogError::Runtime(format!("spawn_blocking failed: {e}")))?
  }

  /// Run a closure inside a transaction; commits on `Ok`, rolls back on
  /// `Err` or panic.
  pub(crate) async fn transaction<F, T>(&self, f: F) -> Result<T, CatalogError>
  where
    F: FnOnce(&Connection) -> Result<T, CatalogError> + Send + 'static,
    T: Send + 'static,
  {
    let conn = self.conn.clone();
    spawn_blocking(move || {
      let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
      let tx = guard.transaction()?;
      let result = f(&tx)?;
      tx.commit()?;
      Ok(result)
    })
    .await
    .map_err(|e| CatalogError::Runtime(format!("spawn_blocking failed: {e}")))?
  }
}

#[cfg(test)]
mod tests {
  use loupe_core::{Chunk, ChunkArtifact, ChunkKind, Embedding, FileState, Language};

  use super::*;

  pub(crate) fn test_file_state(abs: &str, rel: &str, hash: &str) -> FileState {
    FileState {
      file_id: 0,
      rel_path: rel.to_string(),
      abs_path: abs.to_string(),
      content_hash: hash.to_string(),
      size_bytes: 64,
      mtime_ns: 1_700_000_000_000_000_000,
      language: Some(Language::Rust),
      kind: "code".to_string(),
      fingerprint: None,
      indexed_at: chrono::Utc::now(),
      is_deleted: false,
    }
  }

  pub(crate) fn test_artifact(ordinal: u32, content: &str, dim: usize) -> ChunkArtifact {
    let mut chunk = Chunk::new(ChunkKind::CodeFunction, 1, 4, content.to_string());
    chunk.ordinal = ordinal;
    ChunkArtifact {
      embedding: Some(Embedding::new("test-model", vec![ordinal as f32; dim])),
      chunk,
    }
  }

  #[tokio::test]
  async fn open_in_memory_initializes_schema() {
    let catalog = Catalog::open_in_memory().unwrap();
    let files = catalog.list_all_files().await.unwrap();
    assert!(files.is_empty());
  }

  #[tokio::test]
  async fn sync_then_find_round_trip() {
    let catalog = Catalog::open_in_memory().unwrap();
    let file = test_file_state("/r/a.rs", "a.rs", "abc123");
    let artifacts = vec![test_artifact(0, "fn main() {}", 4), test_artifact(1, "fn helper() {}", 4)];

    let file_id = catalog.sync_file_artifacts(file, artifacts, Vec::new()).await.unwrap();
    assert!(file_id > 0);

    let found = catalog.find_file("/r/a.rs").await.unwrap().unwrap();
    assert_eq!(found.content_hash, "abc123");
    assert!(found.is_active());

    let chunks = catalog.chunks_for_file(file_id).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].ordinal, 0);
    assert_eq!(chunks[1].ordinal, 1);
  }

  #[tokio::test]
  async fn resync_replaces_chunks_and_embeddings() {
    let catalog = Catalog::open_in_memory().unwrap();
    let file = test_file_state("/r/a.rs", "a.rs", "v1");
    let file_id = catalog
      .sync_file_artifacts(file.clone(), vec![test_artifact(0, "old", 4)], Vec::new())
      .await
      .unwrap();

    let mut updated = file;
    updated.content_hash = "v2".to_string();
    let file_id_2 = catalog
      .sync_file_artifacts(
        updated,
        vec![test_artifact(0, "new one", 4), test_artifact(1, "new two", 4)],
        Vec::new(),
      )
      .await
      .unwrap();

    // Same identity, replaced content.
    assert_eq!(file_id, file_id_2);
    let chunks = catalog.chunks_for_file(file_id).await.unwrap();
    assert_eq!(chunks.len(), 2);
    assert!(chunks.iter().all(|c| c.content.starts_with("new")));

    let rows = catalog.embedding_rows("test-model").await.unwrap();
    assert_eq!(rows.len(), 2);
  }

  #[tokio::test]
  async fn delete_file_removes_active_row_and_artifacts() {
    let catalog = Catalog::open_in_memory().unwrap();
    let file = test_file_state("/r/a.rs", "a.rs", "abc");
    let file_id = catalog
      .sync_file_artifacts(file, vec![test_artifact(0, "x y z", 4)], Vec::new())
      .await
      .unwrap();

    assert!(catalog.delete_file("/r/a.rs").await.unwrap());
    assert!(catalog.find_file("/r/a.rs").await.unwrap().is_none());
    assert!(catalog.chunks_for_file(file_id).await.unwrap().is_empty());
    // Second delete is a no-op.
    assert!(!catalog.delete_file("/r/a.rs").await.unwrap());
  }

  #[tokio::test]
  async fn same_rel_path_under_two_roots_stays_distinct() {
    let catalog = Catalog::open_in_memory().unwrap();
    for root in ["/r1", "/r2"] {
      let file = test_file_state(&format!("{root}/README.md"), "README.md", root);
      catalog
        .sync_file_artifacts(file, vec![test_artifact(0, "docs", 4)], Vec::new())
        .await
        .unwrap();
    }

    let files = catalog.list_active_files().await.unwrap();
    assert_eq!(files.len(), 2);

    // Deleting one absolute path leaves the other root's copy alone.
    assert!(catalog.delete_file("/r1/README.md").await.unwrap());
    let files = catalog.list_active_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].abs_path, "/r2/README.md");
  }

  #[tokio::test]
  async fn dimension_mismatch_is_rejected() {
    let catalog = Catalog::open_in_memory().unwrap();
    let file = test_file_state("/r/a.rs", "a.rs", "abc");
    let mut artifact = test_artifact(0, "content", 4);
    if let Some(ref mut e) = artifact.embedding {
      e.dimensions = 8; // declared 8, vector still has 4
    }

    let err = catalog.sync_file_artifacts(file, vec![artifact], Vec::new()).await.unwrap_err();
    assert!(matches!(err, CatalogError::DimensionMismatch { declared: 8, got: 4 }));
  }
}
