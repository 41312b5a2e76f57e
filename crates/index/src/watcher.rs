//! Filesystem watch mode.
//!
//! A notify watcher feeds changed paths through a debounce window into
//! the incremental indexer with implicit deletion detection off: only the
//! paths the watcher reports are examined.

use std::{path::PathBuf, sync::Arc, time::Duration};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{IncrementalIndexer, IndexError};

/// Watch `roots` until cancelled, running an incremental update for each
/// debounced batch of change events.
pub async fn watch_roots(
  incremental: Arc<IncrementalIndexer>,
  roots: Vec<PathBuf>,
  debounce: Duration,
  cancel: CancellationToken,
) -> Result<(), IndexError> {
  let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(256);

  let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
    match result {
      Ok(event) => {
        if !event.paths.is_empty() {
          let _ = tx.blocking_send(event.paths);
        }
      }
      Err(e) => warn!(error = %e, "watch error"),
    }
  })
  .map_err(|e| IndexError::Io(std::io::Error::other(e)))?;

  for root in &roots {
    watcher
      .watch(root, RecursiveMode::Recursive)
      .map_err(|e| IndexError::Io(std::io::Error::other(e)))?;
    info!(root = %root.display(), "watching");
  }

  let mut pending: Vec<PathBuf> = Vec::new();
  loop {
    tokio::select! {
      biased;

      _ = cancel.cancelled() => {
        debug!("watch cancelled");
        return Ok(());
      }

      paths = rx.recv() => {
        match paths {
          Some(paths) => pending.extend(paths),
          None => return Ok(()),
        }
        // Collect everything that arrives within the debounce window.
        loop {
          tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            more = rx.recv() => match more {
              Some(paths) => pending.extend(paths),
              None => break,
            },
            _ = tokio::time::sleep(debounce) => break,
          }
        }

        pending.sort();
        pending.dedup();
        let batch = std::mem::take(&mut pending);
        debug!(paths = batch.len(), "debounced change batch");
        match incremental.update(&batch, false, None, &cancel).await {
          Ok(result) => {
            if result.changes.has_changes() {
              info!(
                new = result.changes.new.len(),
                modified = result.changes.modified.len(),
                deleted = result.deletions.len(),
                "watch update applied"
              );
            }
          }
          Err(IndexError::Cancelled) => return Ok(()),
          Err(e) => warn!(error = %e, "watch update failed"),
        }
      }
    }
  }
}
