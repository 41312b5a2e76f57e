use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Catalog, CatalogError};

/// One retrieval's accounting row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetric {
  pub metric_id: Uuid,
  pub task_id: Option<String>,
  pub snippets_returned: usize,
  pub total_tokens: usize,
  pub retrieval_latency_ms: u64,
  pub created_at: DateTime<Utc>,
}

impl UsageMetric {
  pub fn new(task_id: Option<String>, snippets_returned: usize, total_tokens: usize, latency_ms: u64) -> Self {
    Self {
      metric_id: Uuid::new_v4(),
      task_id,
      snippets_returned,
      total_tokens,
      retrieval_latency_ms: latency_ms,
      created_at: Utc::now(),
    }
  }
}

/// Totals surfaced by `loupe status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogStats {
  pub active_files: usize,
  pub deleted_files: usize,
  /// Non-empty active files with no chunks: the metadata-only fallback
  /// committed their state after a failed artifact sync.
  pub failed_files: usize,
  pub chunks: usize,
  pub embeddings: usize,
  pub symbols: usize,
  pub last_indexed_at: Option<DateTime<Utc>>,
}

impl Catalog {
  pub async fn record_usage(&self, metric: UsageMetric) -> Result<(), CatalogError> {
    self
      .query(move |conn| {
        conn.execute(
          "INSERT INTO usage_metrics (metric_id, task_id, snippets_returned, total_tokens, retrieval_latency_ms, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            metric.metric_id.to_string(),
            metric.task_id,
            metric.snippets_returned as i64,
            metric.total_tokens as i64,
            metric.retrieval_latency_ms as i64,
            metric.created_at.timestamp_millis(),
          ],
        )?;
        Ok(())
      })
      .await
  }

  pub async fn stats(&self) -> Result<CatalogStats, CatalogError> {
    self
      .query(|conn| {
        let count = |sql: &str| -> Result<usize, CatalogError> {
          Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as usize)
        };
        let active_files = count("SELECT COUNT(*) FROM file_state WHERE is_deleted = 0")?;
        let deleted_files = count("SELECT COUNT(*) FROM file_state WHERE is_deleted = 1")?;
        let failed_files = count(
          "SELECT COUNT(*) FROM file_state f
           WHERE f.is_deleted = 0 AND f.size_bytes > 0
             AND NOT EXISTS (SELECT 1 FROM chunks c WHERE c.file_id = f.file_id)",
        )?;
        let chunks = count("SELECT COUNT(*) FROM chunks")?;
        let embeddings = count("SELECT COUNT(*) FROM embeddings")?;
        let symbols = count("SELECT COUNT(*) FROM symbols")?;
        let last_ms: Option<i64> =
          conn.query_row("SELECT MAX(indexed_at) FROM file_state WHERE is_deleted = 0", [], |row| row.get(0))?;
        Ok(CatalogStats {
          active_files,
          deleted_files,
          failed_files,
          chunks,
          embeddings,
          symbols,
          last_indexed_at: last_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
        })
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn usage_metrics_and_stats() {
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
      .record_usage(UsageMetric::new(Some("task-1".into()), 5, 1200, 34))
      .await
      .unwrap();

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.active_files, 0);
    assert_eq!(stats.chunks, 0);
    assert!(stats.last_indexed_at.is_none());
  }
}
