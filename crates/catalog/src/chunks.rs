use chrono::{DateTime, Utc};
use loupe_core::{Chunk, ChunkKind, Language};
use rusqlite::{Row, params};

use crate::{Catalog, CatalogError};

/// A chunk joined with its file's path and language, the shape the
/// full-text and symbol providers read.
#[derive(Debug, Clone)]
pub struct ChunkRow {
  pub chunk: Chunk,
  pub rel_path: String,
  pub abs_path: String,
  pub language: Option<Language>,
}

// Qualified so joins against file_state stay unambiguous.
pub(crate) const CHUNK_COLUMNS: &str =
  "c.chunk_id, c.file_id, c.ordinal, c.kind, c.start_line, c.end_line, c.token_count, c.content, c.summary, c.created_at";

pub(crate) fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<Chunk> {
  let kind: String = row.get(3)?;
  let created_at_ms: i64 = row.get(9)?;
  Ok(Chunk {
    chunk_id: row.get(0)?,
    file_id: row.get(1)?,
    ordinal: row.get(2)?,
    kind: ChunkKind::parse(&kind).unwrap_or(ChunkKind::Text),
    start_line: row.get(4)?,
    end_line: row.get(5)?,
    token_estimate: row.get(6)?,
    content: row.get(7)?,
    summary: row.get(8)?,
    created_at: DateTime::<Utc>::from_timestamp_millis(created_at_ms).unwrap_or_else(Utc::now),
  })
}

fn chunk_row_from_row(row: &Row<'_>) -> rusqlite::Result<ChunkRow> {
  let chunk = chunk_from_row(row)?;
  let language: Option<String> = row.get(12)?;
  Ok(ChunkRow {
    chunk,
    rel_path: row.get(10)?,
    abs_path: row.get(11)?,
    language: language.as_deref().and_then(Language::parse),
  })
}

impl Catalog {
  /// Chunks of one file in ordinal order.
  pub async fn chunks_for_file(&self, file_id: i64) -> Result<Vec<Chunk>, CatalogError> {
    self
      .query(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {CHUNK_COLUMNS} FROM chunks c WHERE c.file_id = ?1 ORDER BY c.ordinal"))?;
        let rows = stmt.query_map(params![file_id], chunk_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await
  }

  /// One chunk joined with its file, if the file is still active.
  pub async fn chunk_with_file(&self, chunk_id: i64) -> Result<Option<ChunkRow>, CatalogError> {
    self
      .query(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHUNK_COLUMNS}, f.rel_path, f.abs_path, f.language
           FROM chunks c JOIN file_state f ON f.file_id = c.file_id
           WHERE c.chunk_id = ?1 AND f.is_deleted = 0"
        ))?;
        let mut rows = stmt.query_map(params![chunk_id], chunk_row_from_row)?;
        Ok(rows.next().transpose()?)
      })
      .await
  }

  /// All chunks of active files. The full-text provider scores these in
  /// memory; at local-repository scale that beats maintaining a separate
  /// FTS index.
  pub async fn list_chunk_rows(&self) -> Result<Vec<ChunkRow>, CatalogError> {
    self
      .query(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHUNK_COLUMNS}, f.rel_path, f.abs_path, f.language
           FROM chunks c JOIN file_state f ON f.file_id = c.file_id
           WHERE f.is_deleted = 0
           ORDER BY f.abs_path, c.ordinal"
        ))?;
        let rows = stmt.query_map([], chunk_row_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await
  }

  /// First chunk of the file at an absolute path, used to anchor snippets
  /// that are not chunk-shaped (e.g. git history).
  pub async fn first_chunk_for_path(&self, abs_path: &str) -> Result<Option<ChunkRow>, CatalogError> {
    let abs_path = abs_path.to_string();
    self
      .query(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CHUNK_COLUMNS}, f.rel_path, f.abs_path, f.language
           FROM chunks c JOIN file_state f ON f.file_id = c.file_id
           WHERE f.is_deleted = 0 AND f.abs_path = ?1
           ORDER BY c.ordinal LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![abs_path], chunk_row_from_row)?;
        Ok(rows.next().transpose()?)
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use crate::tests::{test_artifact, test_file_state};

  use super::*;

  #[tokio::test]
  async fn chunk_rows_carry_file_paths() {
    let catalog = Catalog::open_in_memory().unwrap();
    let file = test_file_state("/r/lib.rs", "lib.rs", "h1");
    catalog
      .sync_file_artifacts(file, vec![test_artifact(0, "pub fn a() {}", 4)], Vec::new())
      .await
      .unwrap();

    let rows = catalog.list_chunk_rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].abs_path, "/r/lib.rs");
    assert_eq!(rows[0].language, Some(loupe_core::Language::Rust));

    let by_id = catalog.chunk_with_file(rows[0].chunk.chunk_id).await.unwrap().unwrap();
    assert_eq!(by_id.chunk.content, "pub fn a() {}");

    let first = catalog.first_chunk_for_path("/r/lib.rs").await.unwrap().unwrap();
    assert_eq!(first.chunk.ordinal, 0);
  }
}
