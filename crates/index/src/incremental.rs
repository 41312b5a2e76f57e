use std::{path::PathBuf, sync::Arc};

use catalog::Catalog;
use chrono::{DateTime, Utc};
use loupe_core::ChangeSet;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  BatchIndexer, BatchResult, ChangeDetector, FileIndexer, IndexError, ProgressListener,
  file_indexer::relative_to_roots,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionResult {
  pub relative_path: String,
  pub success: bool,
  pub error: Option<String>,
}

/// One incremental pass: the change set, the batch outcome for files that
/// needed indexing, and the deletions applied to the catalog.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResult {
  pub changes: ChangeSet,
  pub batch: Option<BatchResult>,
  pub deletions: Vec<DeletionResult>,
  pub started_at: DateTime<Utc>,
  pub duration_ms: u64,
}

impl UpdateResult {
  pub fn succeeded(&self) -> usize {
    self.batch.as_ref().map(|b| b.stats.succeeded).unwrap_or(0)
  }

  pub fn failed(&self) -> usize {
    self.batch.as_ref().map(|b| b.stats.failed).unwrap_or(0)
  }
}

/// Change detection, selective re-index, and deletion propagation.
///
/// Two modes share one entry point: a watcher passes the paths it saw
/// with `detect_implicit_deletions = false`; a full rescan passes
/// everything on disk with the flag on so vanished files get cleaned up.
pub struct IncrementalIndexer {
  detector: ChangeDetector,
  batch: BatchIndexer,
  catalog: Catalog,
  roots: Vec<PathBuf>,
}

impl IncrementalIndexer {
  pub fn new(file_indexer: Arc<FileIndexer>, batch: BatchIndexer) -> Self {
    let catalog = file_indexer.catalog().clone();
    let roots = file_indexer.roots().to_vec();
    Self {
      detector: ChangeDetector::new(catalog.clone(), roots.clone()),
      batch,
      catalog,
      roots,
    }
  }

  pub async fn update(
    &self,
    paths: &[PathBuf],
    detect_implicit_deletions: bool,
    listener: Option<ProgressListener>,
    cancel: &CancellationToken,
  ) -> Result<UpdateResult, IndexError> {
    let started_at = Utc::now();
    let started = std::time::Instant::now();

    let changes = self.detector.detect_changes(paths, detect_implicit_deletions).await?;

    let to_index = changes.files_to_index();
    let batch = if to_index.is_empty() {
      None
    } else {
      Some(self.batch.index_files(to_index, listener, cancel).await?)
    };

    // Deletions resolve by absolute path so a relative-path collision
    // across roots can never remove the wrong file.
    let mut deletions = Vec::with_capacity(changes.deleted.len());
    for abs in &changes.deleted {
      if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
      }
      let relative_path = relative_to_roots(&self.roots, abs);
      match self.catalog.delete_file(&abs.to_string_lossy()).await {
        Ok(removed) => {
          if !removed {
            debug!(path = %abs.display(), "deletion found no active row");
          }
          deletions.push(DeletionResult {
            relative_path,
            success: removed,
            error: None,
          });
        }
        Err(e) => {
          warn!(path = %abs.display(), error = %e, "deletion failed");
          deletions.push(DeletionResult {
            relative_path,
            success: false,
            error: Some(e.to_string()),
          });
        }
      }
    }

    let result = UpdateResult {
      changes,
      batch,
      deletions,
      started_at,
      duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
      new = result.changes.new.len(),
      modified = result.changes.modified.len(),
      deleted = result.deletions.len(),
      succeeded = result.succeeded(),
      failed = result.failed(),
      duration_ms = result.duration_ms,
      "incremental update complete"
    );
    Ok(result)
  }
}
