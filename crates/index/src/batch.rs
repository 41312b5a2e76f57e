use std::{
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Instant,
};

use chrono::{DateTime, Utc};
use loupe_core::config::IndexConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{FileIndexer, IndexError, IndexResult, file_indexer::relative_to_roots};

/// Embeddings-per-second floor below which the batch logs a warning.
const THROUGHPUT_WARN_EPS: f64 = 100.0;
/// Minimum interval between throughput reports.
const THROUGHPUT_REPORT_SECS: u64 = 10;

/// Thread-safe progress callback, invoked at least once per completed
/// file in completion order.
pub type ProgressListener = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
  pub total: usize,
  pub processed: usize,
  pub succeeded: usize,
  pub failed: usize,
  pub last_path: Option<String>,
  pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
  pub path: String,
  pub relative_path: String,
  pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
  pub total: usize,
  pub processed: usize,
  pub succeeded: usize,
  pub failed: usize,
  pub started_at: DateTime<Utc>,
  pub completed_at: DateTime<Utc>,
  pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
  pub successes: Vec<IndexResult>,
  pub failures: Vec<BatchFailure>,
  pub stats: BatchStats,
}

struct Accumulator {
  total: usize,
  processed: AtomicUsize,
  succeeded: AtomicUsize,
  failed: AtomicUsize,
  embeddings: AtomicUsize,
  results: Mutex<(Vec<IndexResult>, Vec<BatchFailure>)>,
  last_report: Mutex<Instant>,
  started: Instant,
}

impl Accumulator {
  fn new(total: usize) -> Self {
    Self {
      total,
      processed: AtomicUsize::new(0),
      succeeded: AtomicUsize::new(0),
      failed: AtomicUsize::new(0),
      embeddings: AtomicUsize::new(0),
      results: Mutex::new((Vec::new(), Vec::new())),
      last_report: Mutex::new(Instant::now()),
      started: Instant::now(),
    }
  }

  fn progress(&self, last_path: Option<String>, last_error: Option<String>) -> BatchProgress {
    BatchProgress {
      total: self.total,
      processed: self.processed.load(Ordering::SeqCst),
      succeeded: self.succeeded.load(Ordering::SeqCst),
      failed: self.failed.load(Ordering::SeqCst),
      last_path,
      last_error,
    }
  }

  fn eps(&self) -> f64 {
    let secs = self.started.elapsed().as_secs_f64();
    if secs <= 0.0 {
      return 0.0;
    }
    self.embeddings.load(Ordering::SeqCst) as f64 / secs
  }

  async fn maybe_report_throughput(&self) {
    let mut last = self.last_report.lock().await;
    if last.elapsed().as_secs() >= THROUGHPUT_REPORT_SECS {
      info!(
        embeddings = self.embeddings.load(Ordering::SeqCst),
        eps = format!("{:.1}", self.eps()),
        "embedding throughput"
      );
      *last = Instant::now();
    }
  }
}

/// Bounded worker pool over [`FileIndexer`].
///
/// A counting semaphore limits concurrency; workers acquire a permit, run
/// one file, report progress, and release. A worker failure never cancels
/// its peers; cancellation does, and propagates to the caller.
pub struct BatchIndexer {
  file_indexer: Arc<FileIndexer>,
  requested_workers: Option<usize>,
}

impl BatchIndexer {
  pub fn new(file_indexer: Arc<FileIndexer>) -> Self {
    Self {
      file_indexer,
      requested_workers: None,
    }
  }

  pub fn from_config(file_indexer: Arc<FileIndexer>, config: &IndexConfig) -> Self {
    Self {
      file_indexer,
      requested_workers: config.parallelism,
    }
  }

  pub fn with_parallelism(mut self, workers: usize) -> Self {
    self.requested_workers = Some(workers);
    self
  }

  fn worker_limit(&self, total_files: usize) -> usize {
    let requested = self.requested_workers.unwrap_or_else(|| num_cpus::get().saturating_sub(1).max(1));
    requested.min(total_files).max(1)
  }

  pub async fn index_files(
    &self,
    paths: Vec<PathBuf>,
    listener: Option<ProgressListener>,
    cancel: &CancellationToken,
  ) -> Result<BatchResult, IndexError> {
    let total = paths.len();
    let started_at = Utc::now();
    let acc = Arc::new(Accumulator::new(total));

    if total == 0 {
      return Ok(finish(acc, started_at));
    }

    let workers = self.worker_limit(total);
    debug!(total, workers, "starting batch index");
    let semaphore = Arc::new(Semaphore::new(workers));

    let mut handles = Vec::with_capacity(total);
    for path in paths {
      let semaphore = semaphore.clone();
      let indexer = self.file_indexer.clone();
      let acc = acc.clone();
      let listener = listener.clone();
      let cancel = cancel.clone();
      let task_path = path.clone();

      let handle = tokio::spawn(async move {
        let _permit = semaphore
          .acquire()
          .await
          .map_err(|_| IndexError::Cancelled)?;
        if cancel.is_cancelled() {
          return Err(IndexError::Cancelled);
        }

        let result = indexer.index_file(&task_path, &cancel).await?;

        acc.processed.fetch_add(1, Ordering::SeqCst);
        if result.success {
          acc.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
          acc.failed.fetch_add(1, Ordering::SeqCst);
        }
        acc.embeddings.fetch_add(result.embedding_count, Ordering::SeqCst);

        let progress = acc.progress(Some(result.relative_path.clone()), result.error.clone());
        if let Some(ref listener) = listener {
          listener(&progress);
        }
        acc.maybe_report_throughput().await;

        let mut results = acc.results.lock().await;
        if result.success {
          results.0.push(result);
        } else {
          results.1.push(BatchFailure {
            path: task_path.to_string_lossy().to_string(),
            relative_path: result.relative_path.clone(),
            error: result.error.clone().unwrap_or_else(|| "unknown error".to_string()),
          });
        }
        Ok::<(), IndexError>(())
      });
      handles.push((path, handle));
    }

    let mut cancelled = false;
    for (path, handle) in handles {
      match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(IndexError::Cancelled)) => cancelled = true,
        Ok(Err(e)) => {
          // index_file reserves Err for cancellation; anything else here
          // is a defect worth surfacing as a failure row.
          record_unexpected(&acc, &self.file_indexer, &path, e.to_string()).await;
        }
        Err(join_error) => {
          warn!(path = %path.display(), error = %join_error, "indexing worker panicked");
          record_unexpected(&acc, &self.file_indexer, &path, join_error.to_string()).await;
        }
      }
    }

    if cancelled || cancel.is_cancelled() {
      return Err(IndexError::Cancelled);
    }

    let result = finish(acc, started_at);
    Ok(result)
  }
}

async fn record_unexpected(acc: &Arc<Accumulator>, indexer: &Arc<FileIndexer>, path: &PathBuf, error: String) {
  acc.processed.fetch_add(1, Ordering::SeqCst);
  acc.failed.fetch_add(1, Ordering::SeqCst);
  let mut results = acc.results.lock().await;
  results.1.push(BatchFailure {
    path: path.to_string_lossy().to_string(),
    relative_path: relative_to_roots(indexer.roots(), path),
    error,
  });
}

fn finish(acc: Arc<Accumulator>, started_at: DateTime<Utc>) -> BatchResult {
  let embeddings = acc.embeddings.load(Ordering::SeqCst);
  let eps = acc.eps();
  if embeddings > 0 {
    info!(embeddings, eps = format!("{eps:.1}"), "batch embedding rate");
    if eps < THROUGHPUT_WARN_EPS {
      warn!(eps = format!("{eps:.1}"), "embedding throughput below {THROUGHPUT_WARN_EPS} eps");
    }
  }

  let (successes, failures) = match Arc::try_unwrap(acc) {
    Ok(acc) => acc.results.into_inner(),
    Err(acc) => {
      // All workers are joined, so the lock is free.
      let guard = acc.results.try_lock().map(|g| g.clone()).unwrap_or_default();
      guard
    }
  };

  let completed_at = Utc::now();
  let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
  let stats = BatchStats {
    total: successes.len() + failures.len(),
    processed: successes.len() + failures.len(),
    succeeded: successes.len(),
    failed: failures.len(),
    started_at,
    completed_at,
    duration_ms,
  };
  BatchResult {
    successes,
    failures,
    stats,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use crate::testing::{failing_indexer, test_indexer};

  use super::*;

  fn write_files(dir: &std::path::Path, count: usize) -> Vec<PathBuf> {
    (0..count)
      .map(|i| {
        let path = dir.join(format!("file_{i}.rs"));
        std::fs::write(&path, format!("fn func_{i}() {{ let v = {i}; }}")).unwrap();
        path
      })
      .collect()
  }

  #[tokio::test]
  async fn batch_indexes_all_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(dir.path(), 5);
    let batch = BatchIndexer::new(Arc::new(test_indexer(vec![dir.path().to_path_buf()])));

    let result = batch.index_files(paths, None, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.stats.succeeded, 5);
    assert_eq!(result.stats.failed, 0);
    assert_eq!(result.stats.processed, result.stats.succeeded + result.stats.failed);
    assert_eq!(result.successes.len() + result.failures.len(), result.stats.processed);
  }

  #[tokio::test]
  async fn progress_fires_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(dir.path(), 4);
    let batch = BatchIndexer::new(Arc::new(test_indexer(vec![dir.path().to_path_buf()]))).with_parallelism(2);

    let calls = Arc::new(AtomicUsize::new(0));
    let listener_calls = calls.clone();
    let listener: ProgressListener = Arc::new(move |progress: &BatchProgress| {
      listener_calls.fetch_add(1, Ordering::SeqCst);
      assert_eq!(progress.total, 4);
      assert!(progress.processed <= 4);
    });

    batch
      .index_files(paths, Some(listener), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
  }

  #[tokio::test]
  async fn failures_do_not_cancel_peers() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.rs");
    std::fs::write(&good, "fn ok() {}").unwrap();
    let missing = dir.path().join("missing.rs");

    let batch = BatchIndexer::new(Arc::new(test_indexer(vec![dir.path().to_path_buf()])));
    let result = batch
      .index_files(vec![good, missing], None, &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.stats.succeeded, 1);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(result.failures[0].relative_path, "missing.rs");
  }

  #[tokio::test]
  async fn one_poisoned_file_leaves_the_other_committed() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.rs");
    let bad = dir.path().join("bad.rs");
    std::fs::write(&good, "fn fine() {}").unwrap();
    std::fs::write(&bad, "fn poisoned_marker() {}").unwrap();

    let indexer = Arc::new(crate::testing::poison_indexer(
      vec![dir.path().to_path_buf()],
      "poisoned_marker",
    ));
    let batch = BatchIndexer::new(indexer.clone());
    let result = batch
      .index_files(vec![good.clone(), bad], None, &CancellationToken::new())
      .await
      .unwrap();

    assert_eq!(result.stats.succeeded, 1);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(result.successes[0].relative_path, "good.rs");
    assert_eq!(result.failures[0].relative_path, "bad.rs");

    // The good file's artifacts are committed.
    let state = indexer.catalog().find_file(&good.to_string_lossy()).await.unwrap().unwrap();
    assert!(!indexer.catalog().chunks_for_file(state.file_id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn embedder_failure_isolates_to_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(dir.path(), 2);

    let batch = BatchIndexer::new(Arc::new(failing_indexer(vec![dir.path().to_path_buf()])));
    let result = batch.index_files(paths, None, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.stats.failed, 2);
    assert!(result.failures.iter().all(|f| f.error.contains("mock failure")));
  }

  #[tokio::test]
  async fn cancellation_propagates_from_batch() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_files(dir.path(), 3);
    let batch = BatchIndexer::new(Arc::new(test_indexer(vec![dir.path().to_path_buf()])));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = batch.index_files(paths, None, &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
  }

  #[tokio::test]
  async fn empty_batch_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let batch = BatchIndexer::new(Arc::new(test_indexer(vec![dir.path().to_path_buf()])));
    let result = batch.index_files(Vec::new(), None, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.stats.total, 0);
  }
}
