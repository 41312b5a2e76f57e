use loupe_core::{ChunkKind, Language};
use rusqlite::params;

use crate::{Catalog, CatalogError};

/// An embedding joined with its chunk and file, the shape the semantic
/// provider scans.
#[derive(Debug, Clone)]
pub struct EmbeddingRow {
  pub embedding_id: i64,
  pub chunk_id: i64,
  pub file_id: i64,
  pub rel_path: String,
  pub abs_path: String,
  pub language: Option<Language>,
  pub kind: ChunkKind,
  pub start_line: u32,
  pub end_line: u32,
  pub content: String,
  pub summary: Option<String>,
  pub vector: Vec<f32>,
}

/// Vectors are stored as little-endian f32 bytes.
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
  let mut blob = Vec::with_capacity(vector.len() * 4);
  for v in vector {
    blob.extend_from_slice(&v.to_le_bytes());
  }
  blob
}

pub(crate) fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
  blob
    .chunks_exact(4)
    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    .collect()
}

impl Catalog {
  /// All embeddings of one model across active files.
  pub async fn embedding_rows(&self, model: &str) -> Result<Vec<EmbeddingRow>, CatalogError> {
    let model = model.to_string();
    self
      .query(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.id, e.chunk_id, c.file_id, f.rel_path, f.abs_path, f.language,
                  c.kind, c.start_line, c.end_line, c.content, c.summary, e.vector
           FROM embeddings e
           JOIN chunks c ON c.chunk_id = e.chunk_id
           JOIN file_state f ON f.file_id = c.file_id
           WHERE f.is_deleted = 0 AND e.model = ?1",
        )?;
        let rows = stmt.query_map(params![model], |row| {
          let language: Option<String> = row.get(5)?;
          let kind: String = row.get(6)?;
          let blob: Vec<u8> = row.get(11)?;
          Ok(EmbeddingRow {
            embedding_id: row.get(0)?,
            chunk_id: row.get(1)?,
            file_id: row.get(2)?,
            rel_path: row.get(3)?,
            abs_path: row.get(4)?,
            language: language.as_deref().and_then(Language::parse),
            kind: ChunkKind::parse(&kind).unwrap_or(ChunkKind::Text),
            start_line: row.get(7)?,
            end_line: row.get(8)?,
            content: row.get(9)?,
            summary: row.get(10)?,
            vector: blob_to_vector(&blob),
          })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await
  }
}
