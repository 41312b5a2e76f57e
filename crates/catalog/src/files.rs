use chrono::{DateTime, Utc};
use loupe_core::{FileState, Language};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::{Catalog, CatalogError};

pub(crate) const FILE_COLUMNS: &str =
  "file_id, rel_path, abs_path, content_hash, size_bytes, mtime_ns, language, kind, fingerprint, indexed_at, is_deleted";

pub(crate) fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileState> {
  let language: Option<String> = row.get(6)?;
  let indexed_at_ms: i64 = row.get(9)?;
  Ok(FileState {
    file_id: row.get(0)?,
    rel_path: row.get(1)?,
    abs_path: row.get(2)?,
    content_hash: row.get(3)?,
    size_bytes: row.get::<_, i64>(4)? as u64,
    mtime_ns: row.get(5)?,
    language: language.as_deref().and_then(Language::parse),
    kind: row.get(7)?,
    fingerprint: row.get(8)?,
    indexed_at: DateTime::<Utc>::from_timestamp_millis(indexed_at_ms).unwrap_or_else(Utc::now),
    is_deleted: row.get::<_, i64>(10)? != 0,
  })
}

pub(crate) fn purge_file_artifacts(conn: &Connection, file_id: i64) -> Result<(), CatalogError> {
  conn.execute(
    "DELETE FROM links WHERE from_chunk IN (SELECT chunk_id FROM chunks WHERE file_id = ?1)
       OR to_chunk IN (SELECT chunk_id FROM chunks WHERE file_id = ?1)
       OR to_file = ?1",
    params![file_id],
  )?;
  conn.execute(
    "DELETE FROM embeddings WHERE chunk_id IN (SELECT chunk_id FROM chunks WHERE file_id = ?1)",
    params![file_id],
  )?;
  conn.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])?;
  Ok(())
}

impl Catalog {
  /// Every row, tombstones included.
  pub async fn list_all_files(&self) -> Result<Vec<FileState>, CatalogError> {
    self
      .query(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM file_state ORDER BY abs_path"))?;
        let rows = stmt.query_map([], file_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await
  }

  /// Active (non-deleted) rows only.
  pub async fn list_active_files(&self) -> Result<Vec<FileState>, CatalogError> {
    self
      .query(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {FILE_COLUMNS} FROM file_state WHERE is_deleted = 0 ORDER BY abs_path"))?;
        let rows = stmt.query_map([], file_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await
  }

  /// Find the active row whose absolute or relative path matches.
  pub async fn find_file(&self, path: &str) -> Result<Option<FileState>, CatalogError> {
    let path = path.to_string();
    self
      .query(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {FILE_COLUMNS} FROM file_state
           WHERE is_deleted = 0 AND (abs_path = ?1 OR rel_path = ?1)
           ORDER BY abs_path = ?1 DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![path], file_from_row)?;
        Ok(rows.next().transpose()?)
      })
      .await
  }

  /// Mark the file deleted and purge its chunks, embeddings, and links in
  /// one transaction. Returns whether an active row was affected.
  ///
  /// Callers pass absolute paths; matching a bare relative path is only a
  /// fallback for catalogs populated before roots were configured.
  pub async fn delete_file(&self, path: &str) -> Result<bool, CatalogError> {
    let target = path.to_string();
    let deleted = self
      .transaction(move |conn| {
        let path = target;
        let file_id: Option<i64> = conn
          .query_row(
            "SELECT file_id FROM file_state
             WHERE is_deleted = 0 AND (abs_path = ?1 OR rel_path = ?1)
             ORDER BY abs_path = ?1 DESC LIMIT 1",
            params![path],
            |row| row.get(0),
          )
          .optional()?;

        let Some(file_id) = file_id else {
          return Ok(false);
        };

        purge_file_artifacts(conn, file_id)?;
        conn.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        conn.execute("UPDATE file_state SET is_deleted = 1 WHERE file_id = ?1", params![file_id])?;
        Ok(true)
      })
      .await?;

    if deleted {
      debug!(path, "marked file deleted");
    }
    Ok(deleted)
  }
}
