use std::path::PathBuf;

use ::index::scan_roots;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Outcome, build_engine};

/// `loupe index`: scan the roots and reconcile the catalog.
///
/// Default runs are incremental full rescans (implicit deletions on);
/// `--rebuild` pushes every scanned file through the batch indexer
/// regardless of stored state.
pub async fn cmd_index(
  roots: Vec<PathBuf>,
  watch_roots: Vec<PathBuf>,
  rebuild: bool,
  parallelism: Option<usize>,
  json: bool,
) -> Result<Outcome> {
  let mut all_roots = roots;
  all_roots.extend(watch_roots);
  let engine = build_engine(all_roots)?;

  let cancel = CancellationToken::new();
  let ctrl_c_cancel = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      ctrl_c_cancel.cancel();
    }
  });

  let files = scan_roots(&engine.roots);
  info!(files = files.len(), roots = engine.roots.len(), rebuild, "starting index run");

  if rebuild {
    // Bypass change detection: every scanned file goes through the batch.
    let batch = engine.batch(parallelism);
    let result = batch.index_files(files, None, &cancel).await?;
    // Rows whose files vanished since the last run still need cleanup.
    let cleanup = engine.incremental(parallelism).update(&[], true, None, &cancel).await?;

    if json {
      println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
      println!(
        "rebuilt: {} succeeded, {} failed, {} deleted",
        result.stats.succeeded,
        result.stats.failed,
        cleanup.deletions.len()
      );
    }
    return Ok(if result.stats.failed > 0 { Outcome::IndexingFailures } else { Outcome::Ok });
  }

  let incremental = engine.incremental(parallelism);
  let result = incremental.update(&files, true, None, &cancel).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&result)?);
  } else {
    println!(
      "indexed: {} new, {} modified, {} unchanged, {} deleted ({} succeeded, {} failed)",
      result.changes.new.len(),
      result.changes.modified.len(),
      result.changes.unchanged.len(),
      result.deletions.len(),
      result.succeeded(),
      result.failed(),
    );
  }
  Ok(if result.failed() > 0 { Outcome::IndexingFailures } else { Outcome::Ok })
}
