use ::index::{ChangeDetector, scan_roots};
use anyhow::Result;

use super::{Outcome, build_engine};

/// `loupe status`: totals, pending and failed counts, last refresh, and
/// per-file entries.
pub async fn cmd_status(json: bool) -> Result<Outcome> {
  let engine = build_engine(Vec::new())?;

  let stats = engine.catalog.stats().await?;
  let files = engine.catalog.list_active_files().await?;

  // Pending = files the next incremental run would touch.
  let detector = ChangeDetector::new(engine.catalog.clone(), engine.roots.clone());
  let on_disk = scan_roots(&engine.roots);
  let changes = detector.detect_changes(&on_disk, true).await?;
  let pending = changes.new.len() + changes.modified.len() + changes.deleted.len();

  if json {
    let payload = serde_json::json!({
      "stats": stats,
      "pending": pending,
      "files": files,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    return Ok(Outcome::Ok);
  }

  println!("files:      {}", stats.active_files);
  println!("chunks:     {}", stats.chunks);
  println!("embeddings: {}", stats.embeddings);
  println!("symbols:    {}", stats.symbols);
  println!("pending:    {pending}");
  println!("failed:     {}", stats.failed_files);
  println!("deleted:    {}", stats.deleted_files);
  match stats.last_indexed_at {
    Some(at) => println!("refreshed:  {}", at.to_rfc3339()),
    None => println!("refreshed:  never"),
  }

  if !files.is_empty() {
    println!();
    for file in files {
      let language = file.language.map(|l| l.as_str()).unwrap_or("-");
      println!(
        "  {:<50} {:<10} {:>10} bytes  {}",
        file.rel_path,
        language,
        file.size_bytes,
        file.indexed_at.format("%Y-%m-%d %H:%M:%S")
      );
    }
  }

  Ok(Outcome::Ok)
}
