use chrono::Utc;
use loupe_core::{ChunkArtifact, FileState, Link, Symbol};
use rusqlite::{OptionalExtension, params};
use tracing::trace;

use crate::{Catalog, CatalogError, files::purge_file_artifacts, vectors::vector_to_blob};

impl Catalog {
  /// Atomically replace everything the catalog knows about one file.
  ///
  /// In a single transaction: upsert the file-state row (reviving a
  /// tombstone at the same absolute path), delete prior chunks,
  /// embeddings, and links, insert the new chunks in ordinal order, their
  /// embeddings, and the links. Link endpoints are addressed by chunk
  /// ordinal at call time and resolved to fresh chunk ids here.
  ///
  /// Returns the file id.
  pub async fn sync_file_artifacts(
    &self,
    file: FileState,
    artifacts: Vec<ChunkArtifact>,
    links: Vec<Link>,
  ) -> Result<i64, CatalogError> {
    // Validate embedding shapes before touching the database.
    for artifact in &artifacts {
      if let Some(ref embedding) = artifact.embedding
        && embedding.vector.len() != embedding.dimensions
      {
        return Err(CatalogError::DimensionMismatch {
          declared: embedding.dimensions,
          got: embedding.vector.len(),
        });
      }
    }

    self
      .transaction(move |conn| {
        let existing: Option<i64> = conn
          .query_row(
            "SELECT file_id FROM file_state WHERE abs_path = ?1 ORDER BY is_deleted ASC LIMIT 1",
            params![file.abs_path],
            |row| row.get(0),
          )
          .optional()?;

        let indexed_at_ms = file.indexed_at.timestamp_millis();
        let language = file.language.map(|l| l.as_str());

        let file_id = match existing {
          Some(file_id) => {
            conn.execute(
              "UPDATE file_state SET rel_path = ?2, content_hash = ?3, size_bytes = ?4, mtime_ns = ?5,
                 language = ?6, kind = ?7, fingerprint = ?8, indexed_at = ?9, is_deleted = 0
               WHERE file_id = ?1",
              params![
                file_id,
                file.rel_path,
                file.content_hash,
                file.size_bytes as i64,
                file.mtime_ns,
                language,
                file.kind,
                file.fingerprint,
                indexed_at_ms,
              ],
            )?;
            file_id
          }
          None => {
            conn.execute(
              "INSERT INTO file_state (rel_path, abs_path, content_hash, size_bytes, mtime_ns,
                 language, kind, fingerprint, indexed_at, is_deleted)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)",
              params![
                file.rel_path,
                file.abs_path,
                file.content_hash,
                file.size_bytes as i64,
                file.mtime_ns,
                language,
                file.kind,
                file.fingerprint,
                indexed_at_ms,
              ],
            )?;
            conn.last_insert_rowid()
          }
        };

        purge_file_artifacts(conn, file_id)?;

        // Insert in ordinal order so the dense-ordinal invariant is
        // checkable straight off the table.
        let mut ordered = artifacts;
        ordered.sort_by_key(|a| a.chunk.ordinal);

        let mut ids_by_ordinal = std::collections::HashMap::with_capacity(ordered.len());
        for artifact in &ordered {
          let chunk = &artifact.chunk;
          conn.execute(
            "INSERT INTO chunks (file_id, ordinal, kind, start_line, end_line, token_count, content, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
              file_id,
              chunk.ordinal,
              chunk.kind.as_str(),
              chunk.start_line,
              chunk.end_line,
              chunk.token_estimate,
              chunk.content,
              chunk.summary,
              chunk.created_at.timestamp_millis(),
            ],
          )?;
          let chunk_id = conn.last_insert_rowid();
          ids_by_ordinal.insert(chunk.ordinal as i64, chunk_id);

          if let Some(ref embedding) = artifact.embedding {
            conn.execute(
              "INSERT INTO embeddings (chunk_id, model, dimensions, vector, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)",
              params![
                chunk_id,
                embedding.model,
                embedding.dimensions as i64,
                vector_to_blob(&embedding.vector),
                Utc::now().timestamp_millis(),
              ],
            )?;
          }
        }

        for link in &links {
          let (Some(from), to) = (
            ids_by_ordinal.get(&link.from_chunk).copied(),
            link.to_chunk.and_then(|o| ids_by_ordinal.get(&o).copied()),
          ) else {
            continue;
          };
          if to.is_none() && link.to_file.is_none() {
            continue;
          }
          conn.execute(
            "INSERT INTO links (from_chunk, to_chunk, to_file, link_type, label, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![from, to, link.to_file, link.link_type, link.label, link.score],
          )?;
        }

        trace!(file_id, chunks = ordered.len(), "synced file artifacts");
        Ok(file_id)
      })
      .await
  }

  /// Replace the symbol rows for one file.
  pub async fn replace_symbols_for_file(&self, file_id: i64, symbols: Vec<Symbol>) -> Result<(), CatalogError> {
    self
      .transaction(move |conn| {
        conn.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        for symbol in &symbols {
          conn.execute(
            "INSERT INTO symbols (file_id, symbol_type, name, qualified_name, signature, language, start_line, end_line)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
              file_id,
              symbol.symbol_type.as_str(),
              symbol.name,
              symbol.qualified_name,
              symbol.signature,
              symbol.language.map(|l| l.as_str()),
              symbol.start_line,
              symbol.end_line,
            ],
          )?;
        }
        Ok(())
      })
      .await
  }
}
